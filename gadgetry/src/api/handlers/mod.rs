//! HTTP request handlers.
//!
//! - [`devices`]: Device CRUD, search and paging
//! - [`health`]: Liveness and readiness probes
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which renders as an RFC 7807
//! `application/problem+json` response with the matching status code.

pub mod devices;
pub mod health;
