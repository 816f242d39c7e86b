//! Business operations. Each service owns a handle to the database it was
//! constructed with; handlers pass the caller's identity in explicitly.

pub mod auth;
pub mod authorization;
pub mod cart;
pub mod images;
pub mod order;
pub mod product;
pub mod users;
