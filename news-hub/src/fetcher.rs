use crate::types::{FetchConfig, HubError, SourceFetchError};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

/// Shared HTTP client. Each request is a single bounded attempt; the
/// scheduler that invokes the binary is the retry mechanism.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self, HubError> {
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(config.max_redirects)
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(redirect)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub async fn get_text(&self, url: &str) -> Result<String, SourceFetchError> {
        let url = Url::parse(url)?;
        let body = self.send(self.client.get(url.clone()), &url).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, SourceFetchError> {
        let body = self.send(self.client.get(url.clone()), &url).await?;
        serde_json::from_slice(&body).map_err(|e| SourceFetchError::Decode(e.to_string()))
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> Result<Vec<u8>, SourceFetchError> {
        let start_time = Instant::now();
        // Query strings may carry credentials; never log or report them
        let endpoint = redacted(url);
        debug!("Fetching {}", endpoint);

        let response = request.send().await.map_err(|e| e.without_url())?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceFetchError::Status {
                status: status.as_u16(),
                endpoint,
            });
        }

        let limit = (self.config.max_feed_size_mb as u64) * 1024 * 1024;
        if let Some(content_length) = response.content_length() {
            if content_length > limit {
                return Err(SourceFetchError::TooLarge {
                    size_bytes: content_length,
                });
            }
        }

        let body = response.bytes().await.map_err(|e| e.without_url())?;
        if body.len() as u64 > limit {
            return Err(SourceFetchError::TooLarge {
                size_bytes: body.len() as u64,
            });
        }

        info!(
            "Fetched {} ({} bytes in {}ms)",
            endpoint,
            body.len(),
            start_time.elapsed().as_millis()
        );
        Ok(body.to_vec())
    }
}

/// Scheme, host and path only.
pub fn redacted(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.set_fragment(None);
    let _ = clean.set_password(None);
    let _ = clean.set_username("");
    clean.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_drops_query_and_credentials() {
        let url = Url::parse("https://user:pw@api.example.com/v2/documents.json?date=2024-06-14&Subscription-Key=secret").unwrap();
        assert_eq!(redacted(&url), "https://api.example.com/v2/documents.json");
    }
}
