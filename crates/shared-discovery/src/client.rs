//! The discovery client.

use crate::jrd::{Jrd, LEDGER_TYPE_PROPERTY};
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use shared_types::Iri;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Errors from discovery lookups.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The transport failed.
    #[error("discovery transport error: {0}")]
    Transport(String),

    /// The resource was not found.
    #[error("discovery resource not found: {0}")]
    NotFound(String),

    /// The response was not the expected document shape.
    #[error("malformed discovery document: {0}")]
    Malformed(String),
}

/// Fetches JSON documents over the wire.
#[async_trait]
pub trait DiscoveryFetcher: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value, DiscoveryError>;
}

/// reqwest-backed fetcher.
#[derive(Default)]
pub struct HttpDiscoveryFetcher {
    http: reqwest::Client,
}

impl HttpDiscoveryFetcher {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl DiscoveryFetcher for HttpDiscoveryFetcher {
    async fn get_json(&self, url: &str) -> Result<Value, DiscoveryError> {
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json, application/activity+json")
            .send()
            .await
            .map_err(|e| DiscoveryError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DiscoveryError::NotFound(url.to_string()));
        }
        if !response.status().is_success() {
            return Err(DiscoveryError::Transport(format!(
                "{url}: status {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| DiscoveryError::Malformed(e.to_string()))
    }
}

/// Cache tuning.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// How long a cached document stays fresh.
    pub cache_lifetime: Duration,
    /// Maximum cached documents.
    pub cache_size: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            cache_lifetime: Duration::from_secs(300),
            cache_size: 100,
        }
    }
}

/// An ActivityPub actor document, reduced to the endpoints the sync task
/// walks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActorDocument {
    pub id: Iri,
    pub inbox: Iri,
    pub outbox: Iri,
}

struct CacheEntry {
    value: Value,
    fetched: Instant,
}

/// Caching discovery client.
pub struct DiscoveryClient {
    fetcher: Arc<dyn DiscoveryFetcher>,
    config: DiscoveryConfig,
    cache: Mutex<LruCache<String, CacheEntry>>,
}

impl DiscoveryClient {
    /// A new client over the given fetcher.
    #[must_use]
    pub fn new(fetcher: Arc<dyn DiscoveryFetcher>, config: DiscoveryConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            fetcher,
            config,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    async fn get_cached(&self, url: &str) -> Result<Value, DiscoveryError> {
        {
            let mut cache = self.cache.lock();
            if let Some(entry) = cache.get(url) {
                if entry.fetched.elapsed() < self.config.cache_lifetime {
                    debug!(url, "Discovery cache hit");
                    return Ok(entry.value.clone());
                }
                cache.pop(url);
            }
        }

        let value = self.fetcher.get_json(url).await?;
        self.cache.lock().put(
            url.to_string(),
            CacheEntry {
                value: value.clone(),
                fetched: Instant::now(),
            },
        );
        Ok(value)
    }

    /// WebFinger lookup of `resource` at `domain`.
    pub async fn webfinger(&self, domain: &str, resource: &str) -> Result<Jrd, DiscoveryError> {
        let url = format!(
            "{}/.well-known/webfinger?resource={resource}",
            domain.trim_end_matches('/')
        );
        let value = self.get_cached(&url).await?;
        serde_json::from_value(value).map_err(|e| DiscoveryError::Malformed(e.to_string()))
    }

    /// host-meta template document for `domain`.
    pub async fn host_meta(&self, domain: &str) -> Result<Jrd, DiscoveryError> {
        let url = format!("{}/.well-known/host-meta.json", domain.trim_end_matches('/'));
        let value = self.get_cached(&url).await?;
        serde_json::from_value(value).map_err(|e| DiscoveryError::Malformed(e.to_string()))
    }

    /// Resolve `resource` through its domain's host-meta template to the
    /// link with the given media type.
    ///
    /// This is the WebFinger discovery hop: host-meta yields the webfinger
    /// template, the template yields a JRD for the resource, and the JRD's
    /// typed link is the answer (e.g. a witness inbox for
    /// `application/activity+json`).
    pub async fn resolve_host_meta_link(
        &self,
        resource: &Iri,
        media_type: &str,
    ) -> Result<Iri, DiscoveryError> {
        let domain = resource
            .origin()
            .ok_or_else(|| DiscoveryError::Malformed(format!("no origin in {resource}")))?
            .to_string();

        let host_meta = self.host_meta(&domain).await?;
        let template = host_meta
            .links
            .iter()
            .find_map(|l| l.template.as_deref())
            .ok_or_else(|| DiscoveryError::Malformed(format!("{domain}: host-meta has no template")))?
            .to_string();

        let url = template.replace("{uri}", resource.as_str());
        let value = self.get_cached(&url).await?;
        let jrd: Jrd =
            serde_json::from_value(value).map_err(|e| DiscoveryError::Malformed(e.to_string()))?;

        let href = jrd
            .links
            .iter()
            .find(|l| l.media_type.as_deref() == Some(media_type))
            .and_then(|l| l.href.as_deref())
            .ok_or_else(|| {
                DiscoveryError::NotFound(format!("{resource}: no {media_type} link"))
            })?;
        Iri::parse(href).map_err(|e| DiscoveryError::Malformed(e.to_string()))
    }

    /// The declared ledger type of a domain, if any.
    pub async fn ledger_type(&self, domain: &str) -> Result<Option<String>, DiscoveryError> {
        let jrd = self.webfinger(domain, domain).await?;
        Ok(jrd.property_str(LEDGER_TYPE_PROPERTY).map(str::to_string))
    }

    /// Whether a domain advertises a transparency log.
    pub async fn has_log(&self, domain: &str) -> Result<bool, DiscoveryError> {
        match self.ledger_type(domain).await {
            Ok(kind) => Ok(kind.is_some()),
            Err(DiscoveryError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fetch and reduce an actor document.
    pub async fn resolve_actor(&self, actor: &Iri) -> Result<ActorDocument, DiscoveryError> {
        let value = self.get_cached(actor.as_str()).await?;
        serde_json::from_value(value).map_err(|e| DiscoveryError::Malformed(e.to_string()))
    }

    /// Fetch an arbitrary federation document, bypassing the cache.
    ///
    /// Collection pages grow over time; caching them would hide new items
    /// from the sync walker.
    pub async fn fetch_document(&self, url: &Iri) -> Result<Value, DiscoveryError> {
        self.fetcher.get_json(url.as_str()).await
    }
}
