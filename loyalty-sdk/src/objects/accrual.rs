//! Accrual service wire types.
//!
//! The accrual service answers `GET /api/orders/{number}` with one of:
//!
//! - `200` and an [`AccrualResponse`] body
//! - `204` when the order is not registered there
//! - `429` with a textual directive, see [`RateLimitDirective`]

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Calculation status reported by the accrual service.
///
/// Statuses this crate does not know about are preserved in `Unknown`
/// instead of failing the whole response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
    Unknown(String),
}

impl AccrualStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AccrualStatus::Registered => "REGISTERED",
            AccrualStatus::Processing => "PROCESSING",
            AccrualStatus::Invalid => "INVALID",
            AccrualStatus::Processed => "PROCESSED",
            AccrualStatus::Unknown(raw) => raw,
        }
    }
}

impl std::fmt::Display for AccrualStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AccrualStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AccrualStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "REGISTERED" => AccrualStatus::Registered,
            "PROCESSING" => AccrualStatus::Processing,
            "INVALID" => AccrualStatus::Invalid,
            "PROCESSED" => AccrualStatus::Processed,
            _ => AccrualStatus::Unknown(s),
        })
    }
}

/// Body of a successful accrual lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualResponse {
    pub order: String,
    pub status: AccrualStatus,
    /// Only present once the calculation is finished.
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub accrual: Option<Decimal>,
}

/// Outcome of a single lookup against the accrual service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccrualReply {
    /// The service knows the order.
    Found(AccrualResponse),
    /// The order is not registered with the service (yet).
    NotRegistered,
    /// The service refused the request and told us how to slow down.
    RateLimited(RateLimitDirective),
}

/// Rate-limit instruction sent by the accrual service with a `429`.
///
/// The textual form is fixed by the service:
///
/// ```text
/// No more than {N} requests per minute allowed, Retry-After: {S}
/// ```
///
/// where the first half is the response body and `S` comes from the
/// `Retry-After` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDirective {
    /// New maximum number of requests per window.
    pub request_limit: u32,
    /// New window length.
    pub retry_after: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed rate-limit directive: {0:?}")]
pub struct RateLimitParseError(pub String);

impl RateLimitDirective {
    const PREFIX: &str = "No more than ";
    const SEPARATOR: &str = " requests per minute allowed, Retry-After: ";

    /// Rebuild the directive from a `429` body and its `Retry-After` header.
    pub fn from_response(body: &str, retry_after: &str) -> Result<Self, RateLimitParseError> {
        format!("{}, Retry-After: {}", body.trim_end(), retry_after.trim()).parse()
    }
}

impl FromStr for RateLimitDirective {
    type Err = RateLimitParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RateLimitParseError(s.to_owned());

        let rest = s.strip_prefix(Self::PREFIX).ok_or_else(malformed)?;
        let (limit, retry_after) = rest.split_once(Self::SEPARATOR).ok_or_else(malformed)?;

        let request_limit: u32 = parse_digits(limit).ok_or_else(malformed)?;
        let retry_after: u64 = parse_digits(retry_after).ok_or_else(malformed)?;

        Ok(Self {
            request_limit,
            retry_after: Duration::from_secs(retry_after),
        })
    }
}

impl std::fmt::Display for RateLimitDirective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            Self::PREFIX,
            self.request_limit,
            Self::SEPARATOR,
            self.retry_after.as_secs()
        )
    }
}

/// Parse a non-empty run of ASCII digits, nothing else.
fn parse_digits<T: FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
