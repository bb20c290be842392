//! API request and response data models.
//!
//! - [`devices`]: Device create/update bodies, responses and list query parameters
//! - [`pagination`]: Paging parameters and the page envelope returned by list endpoints

pub mod devices;
pub mod pagination;
