use crate::config::RemoteConfig;
use crate::error::{SyncError, SyncResult};
use crate::internals::retry::RetryExecutor;
use crate::logging::log_error;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

/// Shared HTTP transport: a `reqwest::Client` plus a per-remote
/// `RetryExecutor`, generalized from the way each provider in the teacher
/// crate wraps a client with its own retry executor. Every adapter
/// (ChartHop, Teamtailor, Runn, the warehouse) embeds one of these rather
/// than reimplementing retry/timeout/circuit-breaking per remote.
pub struct Transport<C: RemoteConfig> {
    client: reqwest::Client,
    retry_executor: Mutex<RetryExecutor>,
    config: C,
}

impl<C: RemoteConfig> Transport<C> {
    pub fn new(config: C) -> Self {
        let retry_executor = Mutex::new(RetryExecutor::new(config.retry_policy().clone()));
        Self {
            client: reqwest::Client::new(),
            retry_executor,
            config,
        }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    /// Sends a JSON request, retrying transient failures through the
    /// shared [`RetryExecutor`]. `build` is called once per attempt so it
    /// can clone bodies/headers freshly each time.
    pub async fn send_json<T, F>(&self, build: F) -> SyncResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut retry_executor = self.retry_executor.lock().await;
        retry_executor
            .execute(|| self.execute_once(build()))
            .await
    }

    async fn execute_once<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> SyncResult<T> {
        let remote = self.config.remote_name();
        let response = request.send().await.map_err(|e| {
            SyncError::request_failed(remote, format!("request failed: {e}"), Some(Box::new(e)))
        })?;

        if !response.status().is_success() {
            return Err(self.handle_error_response(response).await);
        }

        let raw_body = response.text().await.map_err(|e| {
            SyncError::request_failed(remote, format!("failed to read body: {e}"), Some(Box::new(e)))
        })?;

        serde_json::from_str(&raw_body).map_err(|e| {
            log_error!(remote = %remote, error = %e, body = %truncate(&raw_body, 300), "response parsing failed");
            SyncError::response_parsing(remote, format!("failed to parse response: {e}"))
        })
    }

    async fn handle_error_response(&self, response: reqwest::Response) -> SyncError {
        let remote = self.config.remote_name();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();

        log_error!(remote = %remote, status = %status, body = %truncate(&body, 300), "remote returned an error status");

        match status.as_u16() {
            401 | 403 => SyncError::authentication_failed(format!("{remote} rejected credentials: {status}")),
            429 => {
                let retry_after = headers
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);
                SyncError::rate_limited(remote, retry_after)
            }
            _ => SyncError::request_failed(remote, format!("{remote} returned {status}: {body}"), None),
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }
}

/// Sends a POST with a JSON body and auth header, returning the decoded
/// response. Thin convenience used by adapters that don't need anything
/// fancier than bearer auth.
pub fn bearer_headers(token: &str) -> SyncResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| SyncError::configuration(format!("invalid bearer token: {e}")))?;
    headers.insert(reqwest::header::AUTHORIZATION, value);
    Ok(headers)
}

pub fn method_builder(
    client: &reqwest::Client,
    method: Method,
    url: &str,
    headers: &HeaderMap,
) -> reqwest::RequestBuilder {
    client.request(method, url).headers(headers.clone())
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_headers_format_correctly() {
        let headers = bearer_headers("tok123").unwrap();
        assert_eq!(headers.get(reqwest::header::AUTHORIZATION).unwrap(), "Bearer tok123");
    }

    #[test]
    fn truncate_preserves_short_strings() {
        assert_eq!(truncate("hi", 10), "hi");
        assert_eq!(truncate("hello world", 5), "hello...");
    }
}
