//! Shared JSON-over-HTTP plumbing for the embedding, chat, and Chroma clients.
//!
//! # Retry Strategy
//!
//! Callers pass `max_retries` (default `0` everywhere, so a failed call
//! surfaces immediately). When retries are enabled:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Build a client with the given request timeout.
pub(crate) fn client(timeout_secs: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Join a base URL and a path without doubling or dropping the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// A single JSON request to an external service.
pub(crate) struct JsonRequest<'a> {
    pub service: &'a str,
    pub method: Method,
    pub url: String,
    pub bearer: Option<&'a str>,
    pub body: Option<&'a Value>,
    pub max_retries: u32,
}

/// Send a JSON request and parse the JSON response.
///
/// An empty response body parses as [`Value::Null`].
pub(crate) async fn send_json(client: &Client, req: JsonRequest<'_>) -> Result<Value> {
    let mut last_err = None;

    for attempt in 0..=req.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            warn!(service = req.service, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }

        debug!(service = req.service, method = %req.method, url = %req.url, "sending request");

        let mut builder = client
            .request(req.method.clone(), &req.url)
            .header("Content-Type", "application/json");
        if let Some(token) = req.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = req.body {
            builder = builder.json(body);
        }

        match builder.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let text = response.text().await?;
                    if text.trim().is_empty() {
                        return Ok(Value::Null);
                    }
                    return serde_json::from_str(&text).map_err(|e| {
                        anyhow!("Invalid {} response: {}", req.service, e)
                    });
                }

                let body_text = response.text().await.unwrap_or_default();

                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!(
                        "{} API error {}: {}",
                        req.service,
                        status,
                        body_text
                    ));
                    continue;
                }

                bail!("{} API error {}: {}", req.service, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow!(
                    "{} connection error ({}): {}",
                    req.service,
                    req.url,
                    e
                ));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} request failed after retries", req.service)))
}
