//! Sync ports: the remote feed pager and the anchor event handler.

use crate::cursor::Source;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_discovery::{ActorDocument, DiscoveryClient, DiscoveryError};
use shared_types::{Activity, Iri, ProcessingError, StoreError};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from a sync tick.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// Actor resolution failed.
    #[error("cannot resolve peer: {0}")]
    Resolve(String),

    /// A feed page could not be fetched.
    #[error("cannot fetch page: {0}")]
    Fetch(String),

    /// The handler failed on an activity.
    #[error("handler failed: {0}")]
    Handler(#[source] ProcessingError),

    /// Storage failed.
    #[error("store failed: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// One page of a remote activity collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionPage {
    /// The page's own IRI.
    pub id: Iri,
    /// Activities on the page, oldest first.
    pub items: Vec<Activity>,
    /// The next page, if any.
    pub next: Option<Iri>,
}

/// Pages through a remote collection.
#[async_trait]
pub trait CollectionPager: Send + Sync {
    /// The feed URL (inbox or outbox) advertised by a peer actor.
    async fn feed_url(&self, actor: &Iri, source: Source) -> Result<Iri, SyncError>;

    /// The first page of a feed.
    async fn first_page(&self, feed: &Iri) -> Result<CollectionPage, SyncError>;

    /// A specific page by IRI.
    async fn page(&self, page: &Iri) -> Result<CollectionPage, SyncError>;
}

/// Handler for anchor activities discovered by the walker.
///
/// A [`ProcessingError::DuplicateAnchorEvent`] return means the activity was
/// already processed; the walker treats it as success.
#[async_trait]
pub trait AnchorEventHandler: Send + Sync {
    async fn handle_create(&self, activity: &Activity) -> Result<(), ProcessingError>;
    async fn handle_announce(&self, activity: &Activity) -> Result<(), ProcessingError>;
}

/// [`CollectionPager`] backed by the discovery client: the actor document
/// names the feeds; feed and page IRIs serve ActivityStreams collection
/// pages as JSON.
pub struct DiscoveryPager {
    discovery: std::sync::Arc<DiscoveryClient>,
}

impl DiscoveryPager {
    #[must_use]
    pub fn new(discovery: std::sync::Arc<DiscoveryClient>) -> Self {
        Self { discovery }
    }

    async fn fetch(&self, url: &Iri) -> Result<CollectionPage, SyncError> {
        let value = self
            .discovery
            .fetch_document(url)
            .await
            .map_err(|e: DiscoveryError| SyncError::Fetch(e.to_string()))?;

        let id = value
            .get("id")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| Iri::parse(s).ok())
            .unwrap_or_else(|| url.clone());
        let items = value
            .get("orderedItems")
            .or_else(|| value.get("items"))
            .and_then(serde_json::Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        let next = value
            .get("next")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| Iri::parse(s).ok());

        Ok(CollectionPage { id, items, next })
    }
}

#[async_trait]
impl CollectionPager for DiscoveryPager {
    async fn feed_url(&self, actor: &Iri, source: Source) -> Result<Iri, SyncError> {
        let ActorDocument { inbox, outbox, .. } = self
            .discovery
            .resolve_actor(actor)
            .await
            .map_err(|e| SyncError::Resolve(e.to_string()))?;
        Ok(match source {
            Source::Inbox => inbox,
            Source::Outbox => outbox,
        })
    }

    async fn first_page(&self, feed: &Iri) -> Result<CollectionPage, SyncError> {
        self.fetch(feed).await
    }

    async fn page(&self, page: &Iri) -> Result<CollectionPage, SyncError> {
        self.fetch(page).await
    }
}

/// Scripted pager for tests: a map of feed and page IRIs to pages.
#[derive(Default)]
pub struct MockPager {
    feeds: Mutex<HashMap<(Iri, Source), Iri>>,
    pages: Mutex<HashMap<Iri, CollectionPage>>,
}

impl MockPager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise a feed for an actor.
    pub fn set_feed(&self, actor: Iri, source: Source, feed: Iri) {
        self.feeds.lock().insert((actor, source), feed);
    }

    /// Register a page under its IRI.
    pub fn set_page(&self, page: CollectionPage) {
        self.set_page_at(page.id.clone(), page);
    }

    /// Register a page under an arbitrary key (e.g. the feed IRI that
    /// serves its first page).
    pub fn set_page_at(&self, key: Iri, page: CollectionPage) {
        self.pages.lock().insert(key, page);
    }
}

#[async_trait]
impl CollectionPager for MockPager {
    async fn feed_url(&self, actor: &Iri, source: Source) -> Result<Iri, SyncError> {
        self.feeds
            .lock()
            .get(&(actor.clone(), source))
            .cloned()
            .ok_or_else(|| SyncError::Resolve(actor.to_string()))
    }

    async fn first_page(&self, feed: &Iri) -> Result<CollectionPage, SyncError> {
        self.page(feed).await
    }

    async fn page(&self, page: &Iri) -> Result<CollectionPage, SyncError> {
        self.pages
            .lock()
            .get(page)
            .cloned()
            .ok_or_else(|| SyncError::Fetch(page.to_string()))
    }
}

/// Recording handler for tests.
#[derive(Default)]
pub struct MockEventHandler {
    handled: Mutex<Vec<Iri>>,
    failures: Mutex<HashMap<Iri, ProcessingError>>,
}

impl MockEventHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make handling of one activity fail.
    pub fn fail_on(&self, id: Iri, error: ProcessingError) {
        self.failures.lock().insert(id, error);
    }

    /// IDs handled so far.
    pub fn handled(&self) -> Vec<Iri> {
        self.handled.lock().clone()
    }

    async fn record(&self, activity: &Activity) -> Result<(), ProcessingError> {
        if let Some(e) = self.failures.lock().get(&activity.id) {
            return Err(e.clone());
        }
        self.handled.lock().push(activity.id.clone());
        Ok(())
    }
}

#[async_trait]
impl AnchorEventHandler for MockEventHandler {
    async fn handle_create(&self, activity: &Activity) -> Result<(), ProcessingError> {
        self.record(activity).await
    }

    async fn handle_announce(&self, activity: &Activity) -> Result<(), ProcessingError> {
        self.record(activity).await
    }
}
