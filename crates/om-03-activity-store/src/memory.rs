//! In-memory tagged store.

use crate::store::{ActivityStore, Criteria, ReferenceIterator};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{Activity, Iri, ReferenceType, StoreError};
use std::collections::HashMap;

/// Iterator over a snapshot of one collection.
///
/// The snapshot is taken at query time, so concurrent inserts are invisible
/// to an open iterator: it observes a prefix of the insertion order.
struct SnapshotIterator {
    items: Vec<Iri>,
    position: usize,
    closed: bool,
}

impl ReferenceIterator for SnapshotIterator {
    fn next(&mut self) -> Result<Option<Iri>, StoreError> {
        if self.closed {
            return Err(StoreError::IteratorClosed);
        }
        let item = self.items.get(self.position).cloned();
        if item.is_some() {
            self.position += 1;
        }
        Ok(item)
    }

    fn total_items(&self) -> usize {
        self.items.len()
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// In-memory [`ActivityStore`].
#[derive(Default)]
pub struct MemoryActivityStore {
    activities: RwLock<HashMap<Iri, Activity>>,
    references: RwLock<HashMap<(ReferenceType, Iri), Vec<Iri>>>,
}

impl MemoryActivityStore {
    /// A new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityStore for MemoryActivityStore {
    async fn put_activity(&self, activity: &Activity) -> Result<(), StoreError> {
        self.activities
            .write()
            .insert(activity.id.clone(), activity.clone());
        Ok(())
    }

    async fn get_activity(&self, iri: &Iri) -> Result<Activity, StoreError> {
        self.activities
            .read()
            .get(iri)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(iri.to_string()))
    }

    async fn add_reference(
        &self,
        collection: ReferenceType,
        object: &Iri,
        activity: &Iri,
    ) -> Result<(), StoreError> {
        let mut references = self.references.write();
        let members = references
            .entry((collection, object.clone()))
            .or_default();
        if !members.contains(activity) {
            members.push(activity.clone());
        }
        Ok(())
    }

    async fn delete_reference(
        &self,
        collection: ReferenceType,
        object: &Iri,
        activity: &Iri,
    ) -> Result<(), StoreError> {
        let mut references = self.references.write();
        if let Some(members) = references.get_mut(&(collection, object.clone())) {
            members.retain(|m| m != activity);
        }
        Ok(())
    }

    async fn query_references(
        &self,
        collection: ReferenceType,
        criteria: &Criteria,
    ) -> Result<Box<dyn ReferenceIterator>, StoreError> {
        let items = self
            .references
            .read()
            .get(&(collection, criteria.object.clone()))
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(SnapshotIterator {
            items,
            position: 0,
            closed: false,
        }))
    }
}

/// Collect every member of an iterator, closing it on all paths.
pub fn collect_all(mut iterator: Box<dyn ReferenceIterator>) -> Result<Vec<Iri>, StoreError> {
    let mut members = Vec::with_capacity(iterator.total_items());
    let result = loop {
        match iterator.next() {
            Ok(Some(iri)) => members.push(iri),
            Ok(None) => break Ok(members),
            Err(e) => break Err(e),
        }
    };
    iterator.close();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ActivityKind;

    fn iri(s: &str) -> Iri {
        Iri::parse(s).unwrap()
    }

    fn activity(id: &str) -> Activity {
        Activity::new(iri(id), ActivityKind::Create, iri("https://peer1.example.com"))
    }

    fn service() -> Iri {
        iri("https://this.example.com/services/anchor")
    }

    #[tokio::test]
    async fn test_get_absent_is_not_found() {
        let store = MemoryActivityStore::new();
        let err = store.get_activity(&iri("https://peer1/a1")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_put_get_round_trip_and_idempotence() {
        let store = MemoryActivityStore::new();
        let a = activity("https://peer1/a1");
        store.put_activity(&a).await.unwrap();
        store.put_activity(&a).await.unwrap();
        assert_eq!(store.get_activity(&a.id).await.unwrap(), a);
    }

    #[tokio::test]
    async fn test_reference_uniqueness() {
        let store = MemoryActivityStore::new();
        let member = iri("https://peer1/a1");
        for _ in 0..3 {
            store
                .add_reference(ReferenceType::Inbox, &service(), &member)
                .await
                .unwrap();
        }
        let it = store
            .query_references(ReferenceType::Inbox, &Criteria::for_object(service()))
            .await
            .unwrap();
        assert_eq!(collect_all(it).unwrap(), vec![member]);
    }

    #[tokio::test]
    async fn test_insertion_order_preserved() {
        let store = MemoryActivityStore::new();
        let members: Vec<Iri> = (0..5)
            .map(|i| iri(&format!("https://peer1/a{i}")))
            .collect();
        for m in &members {
            store
                .add_reference(ReferenceType::Outbox, &service(), m)
                .await
                .unwrap();
        }
        let it = store
            .query_references(ReferenceType::Outbox, &Criteria::for_object(service()))
            .await
            .unwrap();
        assert_eq!(collect_all(it).unwrap(), members);
    }

    #[tokio::test]
    async fn test_iterator_snapshot_ignores_later_inserts() {
        let store = MemoryActivityStore::new();
        store
            .add_reference(ReferenceType::Inbox, &service(), &iri("https://peer1/a1"))
            .await
            .unwrap();

        let mut it = store
            .query_references(ReferenceType::Inbox, &Criteria::for_object(service()))
            .await
            .unwrap();

        store
            .add_reference(ReferenceType::Inbox, &service(), &iri("https://peer1/a2"))
            .await
            .unwrap();

        assert_eq!(it.total_items(), 1);
        assert_eq!(it.next().unwrap(), Some(iri("https://peer1/a1")));
        assert_eq!(it.next().unwrap(), None);
        it.close();
    }

    #[tokio::test]
    async fn test_closed_iterator_fails() {
        let store = MemoryActivityStore::new();
        let mut it = store
            .query_references(ReferenceType::Inbox, &Criteria::for_object(service()))
            .await
            .unwrap();
        it.close();
        assert_eq!(it.next(), Err(StoreError::IteratorClosed));
    }

    #[tokio::test]
    async fn test_delete_reference() {
        let store = MemoryActivityStore::new();
        let member = iri("https://peer1/follower");
        store
            .add_reference(ReferenceType::Follower, &service(), &member)
            .await
            .unwrap();
        store
            .delete_reference(ReferenceType::Follower, &service(), &member)
            .await
            .unwrap();
        let it = store
            .query_references(ReferenceType::Follower, &Criteria::for_object(service()))
            .await
            .unwrap();
        assert!(collect_all(it).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_collections_are_independent() {
        let store = MemoryActivityStore::new();
        let member = iri("https://peer1/a1");
        store
            .add_reference(ReferenceType::Inbox, &service(), &member)
            .await
            .unwrap();
        let it = store
            .query_references(ReferenceType::Outbox, &Criteria::for_object(service()))
            .await
            .unwrap();
        assert!(collect_all(it).unwrap().is_empty());
    }
}
