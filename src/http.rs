//! Retried HTTP GET with an optional on-disk response cache.
//!
//! Retry strategy (per call, up to `http.max_retries` extra attempts):
//! - HTTP 429 or 5xx → retry with exponential backoff (250 ms doubling, capped at 3 s)
//! - HTTP 404 → empty body, no retry
//! - Other 4xx → fail immediately
//! - Network error → retry
//!
//! Cached responses are keyed by a SHA-256 of the URL and its sorted query
//! parameters. Only successful, non-empty bodies are written to the cache.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::HttpConfig;

const BASE_DELAY_MS: u64 = 250;
const MAX_DELAY_MS: u64 = 3_000;

/// Shared transport for all source adapters.
pub struct HttpClient {
    client: reqwest::Client,
    max_retries: u32,
    cache: Option<ResponseCache>,
}

impl HttpClient {
    /// Build a client from `[http]` settings. `use_cache` is the effective
    /// cache switch (config combined with `--no-cache`).
    pub fn new(config: &HttpConfig, use_cache: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        let cache = if use_cache {
            Some(ResponseCache::new(config.cache_dir.clone()))
        } else {
            None
        };

        Ok(Self {
            client,
            max_retries: config.max_retries,
            cache,
        })
    }

    /// GET `url` and decode the body as JSON. Cached. A 404 yields an empty object.
    pub async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<serde_json::Value> {
        let body = self.get_text_cached(url, params).await?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Object(Default::default()));
        }
        serde_json::from_str(&body).with_context(|| format!("Invalid JSON from {}", url))
    }

    /// GET `url` and return the raw body, bypassing the cache.
    pub async fn get_text(&self, url: &str, params: &[(&str, String)]) -> Result<String> {
        self.fetch(url, params).await
    }

    /// GET `url` and return the raw body, served from the cache when present.
    pub async fn get_text_cached(&self, url: &str, params: &[(&str, String)]) -> Result<String> {
        let Some(cache) = &self.cache else {
            return self.fetch(url, params).await;
        };

        let key = cache_key(url, params);
        if let Some(hit) = cache.get(&key).await {
            tracing::trace!(url, "http cache hit");
            return Ok(hit);
        }

        let body = self.fetch(url, params).await?;
        if !body.is_empty() {
            if let Err(e) = cache.put(&key, &body).await {
                tracing::warn!(url, error = %e, "failed to write http cache entry");
            }
        }
        Ok(body)
    }

    async fn fetch(&self, url: &str, params: &[(&str, String)]) -> Result<String> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                tracing::debug!(url, attempt, delay_ms = delay.as_millis() as u64, "retrying request");
                tokio::time::sleep(delay).await;
            }

            let resp = self.client.get(url).query(params).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.text().await?);
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Ok(String::new());
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow::anyhow!("GET {} returned {}", url, status));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("GET {} returned {}: {}", url, status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow::Error::new(e).context(format!("GET {} failed", url)));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("GET {} failed after retries", url)))
    }
}

/// Delay before retry `attempt` (1-based).
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64 << (attempt.saturating_sub(1)).min(10);
    Duration::from_millis((BASE_DELAY_MS * factor).min(MAX_DELAY_MS))
}

/// Cache key for a request: hex SHA-256 over the URL and its sorted params.
pub fn cache_key(url: &str, params: &[(&str, String)]) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort();

    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    for (k, v) in sorted {
        hasher.update(b"\x00");
        hasher.update(k.as_bytes());
        hasher.update(b"=");
        hasher.update(v.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Directory of response bodies, one file per cache key.
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", key))
    }

    /// Unreadable entries count as misses.
    pub async fn get(&self, key: &str) -> Option<String> {
        tokio::fs::read_to_string(self.path_for(key)).await.ok()
    }

    pub async fn put(&self, key: &str, body: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create cache directory: {}", self.dir.display()))?;
        tokio::fs::write(self.path_for(key), body).await?;
        Ok(())
    }
}
