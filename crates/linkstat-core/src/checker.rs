//! Reachability probing.
//!
//! A [`Probe`] classifies one URL. [`HttpProbe`] issues a HEAD request, follows
//! up to [`MAX_REDIRECTS`] redirects and classifies the final response: 2xx or
//! 3xx is available, anything else is unavailable. Transport failures,
//! timeouts and redirect loops count as unavailable too. Probe failures never
//! surface as errors.

use crate::config::ProbeConfig;
use crate::{Error, LinkStatus, Result, StatusMap};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::redirect::Policy;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Redirect hops followed before a probe gives up
pub const MAX_REDIRECTS: usize = 10;

/// Classifies a single URL as available or unavailable
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &str) -> LinkStatus;
}

/// Probe backed by a shared HTTP client
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    /// Build a probe from configuration
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        Self::with_timeout(config.timeout(), &config.user_agent)
    }

    /// Build a probe with an explicit per-request timeout (primarily for tests)
    pub fn with_timeout(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, url: &str) -> LinkStatus {
        let target = normalize_url(url);
        match self.client.head(target.as_str()).send().await {
            Ok(response) => {
                let status = LinkStatus::from_http_status(response.status().as_u16());
                debug!(url, code = response.status().as_u16(), %status, "probed");
                status
            },
            Err(e) => {
                debug!(url, error = %e, "probe failed");
                LinkStatus::Unavailable
            },
        }
    }
}

/// Prepend `https://` unless the URL already names an http(s) scheme
#[must_use]
pub fn normalize_url(url: &str) -> String {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// Probes a whole batch, one URL after another, preserving submission order
pub struct ReachabilityChecker {
    probe: Arc<dyn Probe>,
}

impl ReachabilityChecker {
    pub fn new(probe: Arc<dyn Probe>) -> Self {
        Self { probe }
    }

    /// Probe every URL in `links`.
    ///
    /// The result has one entry per distinct URL; a repeated URL keeps its first
    /// position and the status from its last probe.
    pub async fn check(&self, links: &[String]) -> StatusMap {
        let mut statuses = StatusMap::with_capacity(links.len());
        for link in links {
            let status = self.probe.probe(link).await;
            statuses.insert(link.clone(), status);
        }
        statuses
    }
}

impl std::fmt::Debug for ReachabilityChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReachabilityChecker").finish_non_exhaustive()
    }
}
