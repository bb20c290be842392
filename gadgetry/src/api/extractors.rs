//! Request extractors that report failures as problem details.
//!
//! axum's stock `Json`, `Query` and `Path` extractors answer bad input with plain-text
//! bodies. These wrappers convert the rejections into [`Error`], so malformed input gets
//! the same `application/problem+json` response as every other failure.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Request},
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::errors::Error;

/// Path parameters; a malformed value (e.g. an invalid UUID) is a 400 problem.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(Error))]
pub struct ApiPath<T>(pub T);

/// Query string parameters; values that fail to parse are a 400 problem.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(Error))]
pub struct ApiQuery<T>(pub T);

/// JSON body that is deserialized and then validated.
///
/// Malformed JSON becomes `Error::BadRequest`; field rule violations become
/// `Error::Validation` with one message per offending field.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}
