//! Request and response models for the repositories.
//!
//! These are distinct from the API models in [`crate::api::models`] so storage and wire
//! representations can evolve independently. API models convert into database requests
//! with `From` implementations, and database responses convert into API responses the same way.
//!
//! - [`devices`]: Device create/update requests and the full device record

pub mod devices;
