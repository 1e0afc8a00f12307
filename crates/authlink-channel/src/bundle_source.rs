use async_trait::async_trait;
use authlink_crypto::AuthBundle;

use crate::error::FetchError;

/// Where the published [`AuthBundle`] is read from.
///
/// Fetching must be idempotent. The channel caches the result until a credential rotation
/// invalidates it.
#[async_trait]
pub trait AuthBundleSource: Send + Sync {
    /// Retrieve the currently published bundle.
    async fn fetch(&self) -> Result<AuthBundle, FetchError>;
}

#[cfg(feature = "http")]
pub use http::HttpAuthBundleSource;

#[cfg(feature = "http")]
mod http {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use async_trait::async_trait;
    use authlink_crypto::AuthBundle;
    use reqwest::StatusCode;
    use tracing::{debug, warn};

    use super::AuthBundleSource;
    use crate::error::FetchError;

    const DEFAULT_ATTEMPTS: u32 = 5;
    const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(300);

    /// Fetches the bundle file over HTTP.
    ///
    /// Every request carries a `t=<unix millis>` query parameter so intermediate caches never
    /// serve a bundle that has since been rotated. Transient failures are retried; a 404 is
    /// not, since it means no identity has been published yet.
    #[derive(Debug, Clone)]
    pub struct HttpAuthBundleSource {
        client: reqwest::Client,
        url: String,
        attempts: u32,
        retry_delay: Duration,
    }

    impl HttpAuthBundleSource {
        /// Fetch from `url` with the default retry policy: 5 attempts, 300 ms apart.
        pub fn new(url: impl Into<String>) -> Self {
            Self {
                client: reqwest::Client::new(),
                url: url.into(),
                attempts: DEFAULT_ATTEMPTS,
                retry_delay: DEFAULT_RETRY_DELAY,
            }
        }

        /// Override the retry policy. `attempts` is clamped to at least one.
        pub fn with_retry(mut self, attempts: u32, retry_delay: Duration) -> Self {
            self.attempts = attempts.max(1);
            self.retry_delay = retry_delay;
            self
        }

        async fn fetch_once(&self) -> Result<AuthBundle, FetchError> {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default();

            let response = self
                .client
                .get(&self.url)
                .query(&[("t", now.to_string())])
                .send()
                .await?;

            if response.status() == StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound);
            }
            let body = response.error_for_status()?.text().await?;

            AuthBundle::from_json(&body).map_err(|e| FetchError::InvalidBundle(e.to_string()))
        }
    }

    #[async_trait]
    impl AuthBundleSource for HttpAuthBundleSource {
        async fn fetch(&self) -> Result<AuthBundle, FetchError> {
            let mut remaining = self.attempts;
            loop {
                match self.fetch_once().await {
                    Ok(bundle) => {
                        debug!(url = %self.url, "Fetched auth bundle");
                        return Ok(bundle);
                    }
                    Err(FetchError::NotFound) => return Err(FetchError::NotFound),
                    Err(e) => {
                        remaining -= 1;
                        if remaining == 0 {
                            return Err(e);
                        }
                        warn!(url = %self.url, error = %e, "Fetching auth bundle failed, retrying");
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
    }
}
