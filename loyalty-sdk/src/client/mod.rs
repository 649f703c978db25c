//! HTTP client for the accrual service.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.

mod accrual;

pub use accrual::AccrualClient;

use reqwest::StatusCode;

use crate::objects::RateLimitParseError;

/// Errors produced by the accrual service client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a status code outside its contract.
    #[error("unexpected status {status}, body: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A `429` arrived without a directive we can understand.
    #[error(transparent)]
    MalformedRateLimit(#[from] RateLimitParseError),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}
