//! Source asset fetching.
//!
//! Bodies are streamed to disk chunk by chunk; a transfer that fails part
//! way removes the partial file instead of leaving a truncated source behind.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use metrics::counter;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};

/// Retrieves a remote resource into a local file.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch `url` into `dest`, creating parent directories as needed.
    ///
    /// Returns the number of bytes written.
    async fn fetch(&self, url: &str, dest: &Path) -> MediaResult<u64>;
}

/// HTTP client settings for source downloads.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
    /// Whole-transfer timeout (none by default, sources can be large)
    pub timeout: Option<Duration>,
    /// User-Agent header
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: None,
            user_agent: format!("vcut/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Fetcher backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher with its own connection pool.
    pub fn new(config: FetchConfig) -> MediaResult<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> MediaResult<u64> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        debug!(url = %url, dest = %dest.display(), "Fetching source");

        let response = self.client.get(url).send().await.map_err(|e| {
            counter!("vcut_fetch_failures_total", "reason" => "request").increment(1);
            MediaError::fetch_failed(format!("request to {} failed: {}", url, e), None)
        })?;

        let status = response.status();
        if !status.is_success() {
            counter!("vcut_fetch_failures_total", "reason" => "status").increment(1);
            return Err(MediaError::fetch_failed(
                format!("HTTP {} from {}", status, url),
                Some(status.as_u16()),
            ));
        }

        let expected_len = response.content_length();
        let mut file = fs::File::create(dest).await?;

        match stream_body(response, &mut file, expected_len).await {
            Ok(written) => {
                counter!("vcut_fetch_bytes_total").increment(written);
                info!(
                    url = %url,
                    size_mb = written as f64 / 1_048_576.0,
                    "Source fetched"
                );
                Ok(written)
            }
            Err(e) => {
                counter!("vcut_fetch_failures_total", "reason" => "transfer").increment(1);
                drop(file);
                if let Err(rm) = fs::remove_file(dest).await {
                    warn!("Failed to remove partial download {}: {}", dest.display(), rm);
                }
                Err(e)
            }
        }
    }
}

async fn stream_body(
    response: reqwest::Response,
    file: &mut fs::File,
    expected_len: Option<u64>,
) -> MediaResult<u64> {
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            MediaError::fetch_failed(
                format!("transfer interrupted after {} bytes: {}", written, e),
                None,
            )
        })?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    if let Some(expected) = expected_len {
        if written != expected {
            return Err(MediaError::fetch_failed(
                format!("transfer truncated: got {} of {} bytes", written, expected),
                None,
            ));
        }
    }

    Ok(written)
}
