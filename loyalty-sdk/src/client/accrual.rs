use std::time::Duration;

use reqwest::{Client, StatusCode, header::RETRY_AFTER};
use url::Url;

use super::ClientError;
use crate::objects::{AccrualReply, AccrualResponse, RateLimitDirective};

/// Typed HTTP client for the accrual service.
///
/// Every request carries a bounded timeout so a single slow lookup cannot
/// stall the caller indefinitely.
#[derive(Debug, Clone)]
pub struct AccrualClient {
    http: Client,
    base_url: Url,
}

impl AccrualClient {
    /// Create a new `AccrualClient`.
    ///
    /// * `base_url` – root URL of the accrual service (e.g. `http://localhost:8080`).
    ///   A path prefix such as `http://gateway/accrual` is kept.
    /// * `timeout` – deadline applied to every request.
    pub fn new(mut base_url: Url, timeout: Duration) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET /api/orders/{number}` – look up the accrual for one order.
    pub async fn get_order(&self, number: i64) -> Result<AccrualReply, ClientError> {
        let url = self.base_url.join(&format!("api/orders/{number}"))?;

        let resp = self.http.get(url).send().await?;

        match resp.status() {
            StatusCode::OK => {
                let bytes = resp.bytes().await?;
                let body: AccrualResponse = serde_json::from_slice(&bytes)?;
                Ok(AccrualReply::Found(body))
            }
            StatusCode::NO_CONTENT => Ok(AccrualReply::NotRegistered),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_owned();
                let body = resp.text().await?;
                let directive = RateLimitDirective::from_response(&body, &retry_after)?;
                Ok(AccrualReply::RateLimited(directive))
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(ClientError::UnexpectedStatus { status, body })
            }
        }
    }
}
