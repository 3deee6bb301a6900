//! Blocking HTTP GET over libcurl.
//!
//! Used for both the release API lookup and archive downloads. Follows
//! redirects (GitHub release assets redirect to a CDN) and buffers the body
//! in memory.

use anyhow::{Context, Result};
use std::time::Duration;

use crate::config::HttpConfig;

/// Longest slice of an error response body kept in error messages.
const MAX_ERROR_BODY: usize = 2048;

/// Non-2xx response.
#[derive(Debug, thiserror::Error)]
#[error("HTTP {status} for {url}{}", format_body(.body))]
pub struct HttpError {
    pub status: u32,
    pub url: String,
    pub body: String,
}

fn format_body(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!("\n{}", body)
    }
}

fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.len() <= MAX_ERROR_BODY {
        return text.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Connection settings for one client; cheap to copy around.
#[derive(Debug, Clone)]
pub struct HttpClient {
    connect_timeout: Duration,
    timeout: Duration,
    user_agent: String,
}

impl HttpClient {
    pub fn new(cfg: &HttpConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            timeout: Duration::from_secs(cfg.timeout_secs),
            user_agent: cfg.user_agent.clone(),
        }
    }

    /// GET `url` with extra `headers` ("Name: value" pairs) and return the body.
    pub fn get_bytes(&self, url: &str, headers: &[(&str, &str)]) -> Result<Vec<u8>> {
        let mut body: Vec<u8> = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(url).context("invalid URL")?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.useragent(&self.user_agent)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.timeout)?;

        let mut list = curl::easy::List::new();
        for (k, v) in headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        if !headers.is_empty() {
            easy.http_headers(list)?;
        }

        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer
                .perform()
                .with_context(|| format!("GET {} failed", url))?;
        }

        let code = easy.response_code().context("no response code")?;
        if !(200..300).contains(&code) {
            return Err(HttpError {
                status: code,
                url: url.to_string(),
                body: truncate_body(&body),
            }
            .into());
        }

        tracing::debug!(url, bytes = body.len(), "GET complete");
        Ok(body)
    }

    pub fn get_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String> {
        let bytes = self.get_bytes(url, headers)?;
        String::from_utf8(bytes).with_context(|| format!("response from {} is not UTF-8", url))
    }

    pub fn get_json(&self, url: &str, headers: &[(&str, &str)]) -> Result<serde_json::Value> {
        let text = self.get_text(url, headers)?;
        serde_json::from_str(&text).with_context(|| format!("invalid JSON from {}", url))
    }
}
