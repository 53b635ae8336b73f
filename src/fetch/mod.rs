//! Upstream listing fetchers
//!
//! Three strategies produce raw candidate filenames/identifiers:
//! - static directory index scrape (`index`)
//! - source-control tag API pagination (`tags`)
//! - authenticated paginated package API with worker fan-out (`packages`)
//!
//! All network access goes through narrow traits (`HttpFetch`,
//! `TagApi`, `PackageApi`) so the resolution engine can be driven by
//! in-memory stubs in tests. Retry policy belongs to the transport.

pub mod index;
pub mod packages;
pub mod tags;

use crate::errors::{KresError, Result};
use std::time::Duration;

/// Minimal GET-for-text transport used by the index scrape and the
/// minikube defconfig fetch.
#[allow(async_fn_in_trait)]
pub trait HttpFetch {
    async fn get_text(&self, url: &str) -> Result<String>;
}

/// reqwest-backed transport with bounded retry on transport errors and
/// 5xx responses.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    http: reqwest::Client,
    max_retries: u32,
}

impl RetryingClient {
    pub fn new(max_retries: u32) -> Self {
        Self {
            http: reqwest::Client::new(),
            max_retries,
        }
    }
}

impl HttpFetch for RetryingClient {
    async fn get_text(&self, url: &str) -> Result<String> {
        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                tracing::debug!(url = %url, attempt, "retrying request");
            }
            match self.http.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() {
                        last_error = format!("server returned {}", status);
                        continue;
                    }
                    if !status.is_success() {
                        return Err(KresError::UpstreamFetch(format!(
                            "GET {} returned {}",
                            url, status
                        )));
                    }
                    return Ok(response.text().await?);
                }
                Err(err) => last_error = err.to_string(),
            }
        }
        Err(KresError::UpstreamFetch(format!(
            "GET {} failed after {} attempts: {}",
            url,
            self.max_retries + 1,
            last_error
        )))
    }
}
