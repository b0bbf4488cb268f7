//! The periodic catch-up task.

use crate::cursor::{Cursor, CursorStore, Source};
use crate::ports::{AnchorEventHandler, CollectionPager, SyncError};
use chrono::{Duration as ChronoDuration, Utc};
use om_03_activity_store::{collect_all, ActivityStore, Criteria};
use shared_types::{Activity, ActivityKind, Iri, ProcessingError, ReferenceType};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sync tuning.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Scheduler interval for the task.
    pub interval: Duration,
    /// Activities younger than this are left for the next tick; very fresh
    /// items may still be in flight through the normal delivery path.
    pub min_activity_age: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            min_activity_age: Duration::from_secs(60),
        }
    }
}

/// The catch-up walker.
pub struct AnchorSyncTask {
    service_iri: Iri,
    config: SyncConfig,
    store: Arc<dyn ActivityStore>,
    cursors: Arc<dyn CursorStore>,
    pager: Arc<dyn CollectionPager>,
    handler: Arc<dyn AnchorEventHandler>,
}

impl AnchorSyncTask {
    /// A new task for this service.
    #[must_use]
    pub fn new(
        service_iri: Iri,
        config: SyncConfig,
        store: Arc<dyn ActivityStore>,
        cursors: Arc<dyn CursorStore>,
        pager: Arc<dyn CollectionPager>,
        handler: Arc<dyn AnchorEventHandler>,
    ) -> Self {
        Self {
            service_iri,
            config,
            store,
            cursors,
            pager,
            handler,
        }
    }

    /// The configured scheduler interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// One tick: walk every follower's inbox and every following's outbox.
    ///
    /// Per-peer failures are logged and do not stop the remaining peers;
    /// the failing peer's cursor keeps its last successful position.
    pub async fn run(&self) {
        let followers = self.collection(ReferenceType::Follower).await;
        for peer in followers {
            if let Err(e) = self.sync(&peer, Source::Inbox).await {
                warn!(peer = %peer, error = %e, "Follower inbox sync failed");
            }
        }

        let followings = self.collection(ReferenceType::Following).await;
        for peer in followings {
            if let Err(e) = self.sync(&peer, Source::Outbox).await {
                warn!(peer = %peer, error = %e, "Following outbox sync failed");
            }
        }
    }

    async fn collection(&self, collection: ReferenceType) -> Vec<Iri> {
        let criteria = Criteria::for_object(self.service_iri.clone());
        match self.store.query_references(collection, &criteria).await {
            Ok(iterator) => collect_all(iterator).unwrap_or_else(|e| {
                warn!(collection = %collection, error = %e, "Reference query failed");
                Vec::new()
            }),
            Err(e) => {
                warn!(collection = %collection, error = %e, "Reference query failed");
                Vec::new()
            }
        }
    }

    /// Does this activity need reconciling from `source`?
    fn wanted(&self, source: Source, activity: &Activity) -> bool {
        match source {
            // A follower's inbox: repair deliveries of our own Creates.
            Source::Inbox => {
                activity.kind == ActivityKind::Create
                    && activity.actor.as_ref() == Some(&self.service_iri)
            }
            // A following's outbox: anything anchor-bearing.
            Source::Outbox => {
                matches!(activity.kind, ActivityKind::Create | ActivityKind::Announce)
            }
        }
    }

    /// Walk one peer's feed from its persisted cursor.
    pub async fn sync(&self, peer: &Iri, source: Source) -> Result<(), SyncError> {
        let stored = self.cursors.get(peer, source).await?;

        let (mut page, mut start_index) = match &stored {
            Some(cursor) => (self.pager.page(&cursor.page).await?, cursor.index + 1),
            None => {
                let feed = self.pager.feed_url(peer, source).await?;
                (self.pager.first_page(&feed).await?, 0)
            }
        };

        let min_age = ChronoDuration::from_std(self.config.min_activity_age)
            .unwrap_or_else(|_| ChronoDuration::seconds(60));
        let freshness_limit = Utc::now() - min_age;

        let mut position = stored.clone();
        let mut outcome = Ok(());

        'walk: loop {
            for (index, activity) in page.items.iter().enumerate().skip(start_index) {
                if !self.wanted(source, activity) {
                    position = Some(Cursor {
                        page: page.id.clone(),
                        index,
                    });
                    continue;
                }

                // Too young to reliably sync; reconsider next tick.
                if let Some(published) = activity.published {
                    if published > freshness_limit {
                        debug!(id = %activity.id, "Activity too recent; stopping walk");
                        break 'walk;
                    }
                }

                if self.store.get_activity(&activity.id).await.is_ok() {
                    position = Some(Cursor {
                        page: page.id.clone(),
                        index,
                    });
                    continue;
                }

                let handled = match activity.kind {
                    ActivityKind::Create => self.handler.handle_create(activity).await,
                    ActivityKind::Announce => self.handler.handle_announce(activity).await,
                    _ => Ok(()),
                };
                match handled {
                    Ok(()) | Err(ProcessingError::DuplicateAnchorEvent) => {}
                    Err(e) => {
                        outcome = Err(SyncError::Handler(e));
                        break 'walk;
                    }
                }

                if let Err(e) = self.store.put_activity(activity).await {
                    outcome = Err(SyncError::Store(e));
                    break 'walk;
                }
                info!(peer = %peer, source = %source, id = %activity.id, "Synced missed activity");
                position = Some(Cursor {
                    page: page.id.clone(),
                    index,
                });
            }

            match page.next.clone() {
                Some(next) => {
                    page = self.pager.page(&next).await?;
                    start_index = 0;
                }
                None => break,
            }
        }

        // Persist the last successfully processed position when it moved.
        if let Some(cursor) = position {
            if stored.as_ref() != Some(&cursor) {
                self.cursors.put(peer, source, &cursor).await?;
            }
        }
        outcome
    }
}
