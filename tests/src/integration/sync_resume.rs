//! Anchor-sync resume across a restart.

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};
    use om_03_activity_store::{ActivityStore, MemoryActivityStore};
    use om_04_anchor_sync::{
        AnchorEventHandler, AnchorSyncTask, CollectionPage, CollectionPager, Cursor, CursorStore,
        MemoryCursorStore, MockEventHandler, MockPager, Source, SyncConfig,
    };
    use shared_types::{Activity, ActivityKind, Iri, ProcessingError};
    use std::sync::Arc;
    use std::time::Duration;

    fn iri(s: &str) -> Iri {
        Iri::parse(s).unwrap()
    }

    fn service() -> Iri {
        iri("https://this.example.com/services/anchor")
    }

    fn peer() -> Iri {
        iri("https://peer1.example.com/services/anchor")
    }

    fn activity(n: usize) -> Activity {
        Activity::new(
            iri(&format!("https://peer1.example.com/activities/a{n}")),
            ActivityKind::Create,
            peer(),
        )
        .published(Utc::now() - ChronoDuration::minutes(10))
    }

    fn pager_with_outbox(n: usize) -> Arc<MockPager> {
        let pager = Arc::new(MockPager::new());
        let feed = iri("https://peer1.example.com/outbox");
        let page_iri = iri("https://peer1.example.com/outbox?page=1");
        let page = CollectionPage {
            id: page_iri,
            items: (1..=n).map(activity).collect(),
            next: None,
        };
        pager.set_feed(peer(), Source::Outbox, feed.clone());
        pager.set_page(page.clone());
        pager.set_page_at(feed, page);
        pager
    }

    fn task(
        store: Arc<MemoryActivityStore>,
        cursors: Arc<MemoryCursorStore>,
        pager: Arc<MockPager>,
        handler: Arc<MockEventHandler>,
    ) -> AnchorSyncTask {
        AnchorSyncTask::new(
            service(),
            SyncConfig {
                interval: Duration::from_secs(60),
                min_activity_age: Duration::from_secs(0),
            },
            store as Arc<dyn ActivityStore>,
            cursors as Arc<dyn CursorStore>,
            pager as Arc<dyn CollectionPager>,
            handler as Arc<dyn AnchorEventHandler>,
        )
    }

    #[tokio::test]
    async fn test_resume_after_restart_processes_only_the_tail() {
        let pager = pager_with_outbox(10);
        let cursors = Arc::new(MemoryCursorStore::new());

        // First run: a transient failure at a8 stops the walk with the
        // cursor at a7.
        let handler = Arc::new(MockEventHandler::new());
        handler.fail_on(
            iri("https://peer1.example.com/activities/a8"),
            ProcessingError::Transient("peer hiccup".to_string()),
        );
        let first = task(
            Arc::new(MemoryActivityStore::new()),
            Arc::clone(&cursors),
            Arc::clone(&pager),
            Arc::clone(&handler),
        );
        first.sync(&peer(), Source::Outbox).await.unwrap_err();
        assert_eq!(handler.handled().len(), 7);

        let cursor = cursors.get(&peer(), Source::Outbox).await.unwrap().unwrap();
        assert_eq!(cursor.index, 6, "cursor holds a7's position");

        // Restart: fresh stores and handler, only the cursor survives.
        let handler = Arc::new(MockEventHandler::new());
        let second = task(
            Arc::new(MemoryActivityStore::new()),
            Arc::clone(&cursors),
            pager,
            Arc::clone(&handler),
        );
        second.sync(&peer(), Source::Outbox).await.unwrap();

        assert_eq!(
            handler.handled(),
            vec![
                iri("https://peer1.example.com/activities/a8"),
                iri("https://peer1.example.com/activities/a9"),
                iri("https://peer1.example.com/activities/a10"),
            ],
            "a1..a7 are not reprocessed"
        );

        let cursor = cursors.get(&peer(), Source::Outbox).await.unwrap().unwrap();
        assert_eq!(cursor.index, 9);
    }

    #[tokio::test]
    async fn test_cursor_monotonic_across_ticks() {
        let pager = pager_with_outbox(6);
        let cursors = Arc::new(MemoryCursorStore::new());
        let store = Arc::new(MemoryActivityStore::new());
        let handler = Arc::new(MockEventHandler::new());
        let sync_task = task(
            Arc::clone(&store),
            Arc::clone(&cursors),
            pager,
            Arc::clone(&handler),
        );

        sync_task.sync(&peer(), Source::Outbox).await.unwrap();
        let after_first = cursors.get(&peer(), Source::Outbox).await.unwrap().unwrap();

        // A second tick over the same feed must not move the cursor
        // backwards (and has nothing new to process).
        sync_task.sync(&peer(), Source::Outbox).await.unwrap();
        let after_second = cursors.get(&peer(), Source::Outbox).await.unwrap().unwrap();

        assert!(after_second.index >= after_first.index);
        assert_eq!(handler.handled().len(), 6);
    }

    #[tokio::test]
    async fn test_explicit_cursor_resume_position() {
        let pager = pager_with_outbox(10);
        let cursors = Arc::new(MemoryCursorStore::new());
        cursors
            .put(
                &peer(),
                Source::Outbox,
                &Cursor {
                    page: iri("https://peer1.example.com/outbox?page=1"),
                    index: 6,
                },
            )
            .await
            .unwrap();

        let handler = Arc::new(MockEventHandler::new());
        let sync_task = task(
            Arc::new(MemoryActivityStore::new()),
            cursors,
            pager,
            Arc::clone(&handler),
        );
        sync_task.sync(&peer(), Source::Outbox).await.unwrap();

        assert_eq!(handler.handled().len(), 3);
    }
}
