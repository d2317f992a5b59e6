//! HTTP client for hosting-provider IP classification.

use std::time::{Duration, Instant};

use serde::Deserialize;
use url::Url;

use crate::config::ReputationConfig;
use crate::observability::metrics;
use crate::reputation::{ReputationCache, ReputationError};

#[derive(Debug, Deserialize)]
struct LookupResponse {
    status: String,
    #[serde(rename = "host-ip")]
    host_ip: Option<bool>,
}

/// Cached reputation lookups.
#[derive(Debug, Clone)]
pub struct ReputationClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    cache: ReputationCache,
}

impl ReputationClient {
    pub fn new(config: &ReputationConfig) -> Result<Self, ReputationError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| ReputationError::InvalidEndpoint(format!("{}: {}", config.endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(ReputationError::InvalidEndpoint(config.endpoint.clone()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key.clone(),
            cache: ReputationCache::new(Duration::from_secs(config.cache_ttl_secs)),
        })
    }

    pub fn cache(&self) -> &ReputationCache {
        &self.cache
    }

    /// True if `ip` belongs to a hosting provider.
    ///
    /// Served from cache while the entry is live; otherwise fetched and cached.
    /// Failures are returned uncached.
    pub async fn check_ip(&self, ip: &str) -> Result<bool, ReputationError> {
        if let Some(is_host_ip) = self.cache.get(ip, Instant::now()) {
            metrics::record_reputation_lookup("cached");
            return Ok(is_host_ip);
        }

        match self.fetch(ip).await {
            Ok(is_host_ip) => {
                self.cache.insert(ip, is_host_ip, Instant::now());
                metrics::record_reputation_lookup("fetched");
                tracing::debug!(ip, is_host_ip, "Reputation lookup complete");
                Ok(is_host_ip)
            }
            Err(e) => {
                metrics::record_reputation_lookup("error");
                Err(e)
            }
        }
    }

    fn lookup_url(&self, ip: &str) -> Result<Url, ReputationError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| ReputationError::InvalidEndpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .push(ip)
            .push(&self.api_key);
        Ok(url)
    }

    async fn fetch(&self, ip: &str) -> Result<bool, ReputationError> {
        let url = self.lookup_url(ip)?;
        let body = self.http.get(url).send().await?.text().await?;
        let response: LookupResponse = serde_json::from_str(&body)?;

        if response.status != "success" {
            return Err(ReputationError::Unsuccessful(response.status));
        }
        response.host_ip.ok_or(ReputationError::MissingClassification)
    }
}
