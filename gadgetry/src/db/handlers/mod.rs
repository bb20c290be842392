//! Repository implementations for database access.
//!
//! Repositories wrap a SQLx connection or transaction and implement the [`Repository`]
//! trait. They own query construction and parameter binding and return models from
//! [`crate::db::models`].
//!
//! # Available Repositories
//!
//! - [`Devices`]: Device inventory with soft deletes and optimistic locking

pub mod devices;
pub mod repository;

pub use devices::Devices;
pub use repository::Repository;
