//! Storage contract.

use async_trait::async_trait;
use shared_types::{Activity, Iri, ReferenceType, StoreError};

/// Reference query criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criteria {
    /// The object (usually a service IRI) whose collection is queried.
    pub object: Iri,
}

impl Criteria {
    /// Criteria for one object's collection.
    #[must_use]
    pub fn for_object(object: Iri) -> Self {
        Self { object }
    }
}

/// Forward-only iterator over reference members.
///
/// [`ReferenceIterator::close`] must be guaranteed on every exit path; a
/// closed iterator fails further reads instead of returning stale data.
pub trait ReferenceIterator: Send {
    /// The next member, or `None` at the end.
    fn next(&mut self) -> Result<Option<Iri>, StoreError>;

    /// Total members at query time.
    fn total_items(&self) -> usize;

    /// Release the iterator.
    fn close(&mut self);
}

/// Activity and reference storage.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Store an activity by its IRI. Repeat puts with the same content are
    /// no-ops.
    async fn put_activity(&self, activity: &Activity) -> Result<(), StoreError>;

    /// Fetch an activity; absent activities are the distinguished
    /// [`StoreError::NotFound`].
    async fn get_activity(&self, iri: &Iri) -> Result<Activity, StoreError>;

    /// Append an activity IRI to `(collection, object)`. Duplicate members
    /// are absorbed.
    async fn add_reference(
        &self,
        collection: ReferenceType,
        object: &Iri,
        activity: &Iri,
    ) -> Result<(), StoreError>;

    /// Remove a member (Undo handling).
    async fn delete_reference(
        &self,
        collection: ReferenceType,
        object: &Iri,
        activity: &Iri,
    ) -> Result<(), StoreError>;

    /// Query the members of `collection` for the criteria's object.
    async fn query_references(
        &self,
        collection: ReferenceType,
        criteria: &Criteria,
    ) -> Result<Box<dyn ReferenceIterator>, StoreError>;
}
