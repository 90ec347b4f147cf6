use crate::errors::StrataResult;
use crate::schema::CollectionDefinition;
use std::ops::Deref;
use std::sync::Arc;

/// One change in a batch submitted to a schema store.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChange {
    /// Insert or replace a collection, subject to the revision check of `save`.
    Save(CollectionDefinition),
    /// Delete the collection with this id.
    Delete(String),
}

impl SchemaChange {
    /// The id of the collection the change touches.
    pub fn collection_id(&self) -> &str {
        match self {
            SchemaChange::Save(collection) => &collection.id,
            SchemaChange::Delete(id) => id,
        }
    }
}

/// Interface to the persistent schema of a backend.
///
/// # Purpose
/// The migration engine never touches a backend directly; every step reads and
/// writes collection definitions through this trait. Implementations decide
/// where the schema lives (memory, a snapshot file, a remote admin API).
///
/// # Concurrency
/// `save` uses optimistic concurrency. A definition carries the `revision` it
/// was read at; a store must reject the save with [`ErrorKind::Conflict`] when
/// the stored revision has moved on, and bump the revision when it accepts it.
///
/// # Thread Safety
/// Implementers must be `Send + Sync`.
///
/// [`ErrorKind::Conflict`]: crate::errors::ErrorKind::Conflict
pub trait SchemaStoreProvider: Send + Sync {
    /// Looks up a collection by id, falling back to its name.
    ///
    /// # Returns
    /// * `Ok(CollectionDefinition)` with the stored definition and revision
    /// * `Err(StrataError)` of kind `NotFound` if nothing matches
    fn find_collection(&self, id_or_name: &str) -> StrataResult<CollectionDefinition>;

    /// Persists a collection definition atomically.
    ///
    /// # Returns
    /// * `Ok(CollectionDefinition)` with the stored definition and its new revision
    /// * `Err(StrataError)` of kind `Conflict` on a stale revision, or
    ///   `Validation` when the definition is malformed
    fn save(&self, collection: &CollectionDefinition) -> StrataResult<CollectionDefinition>;

    /// Deletes the collection with the given id.
    ///
    /// # Returns
    /// * `Ok(())` if the collection was deleted
    /// * `Err(StrataError)` of kind `NotFound` if it does not exist
    fn delete(&self, id: &str) -> StrataResult<()>;

    /// Returns every collection in store order.
    fn collections(&self) -> StrataResult<Vec<CollectionDefinition>>;

    /// Applies a group of changes.
    ///
    /// The default implementation applies the changes one after the other and
    /// stops at the first failure. Providers that can do better override it to
    /// apply all changes or none.
    fn apply_batch(&self, changes: &[SchemaChange]) -> StrataResult<()> {
        for change in changes {
            match change {
                SchemaChange::Save(collection) => {
                    self.save(collection)?;
                }
                SchemaChange::Delete(id) => self.delete(id)?,
            }
        }
        Ok(())
    }
}

/// Shared handle to a [`SchemaStoreProvider`].
///
/// Cloning is cheap and every clone talks to the same provider.
#[derive(Clone)]
pub struct SchemaStore {
    inner: Arc<dyn SchemaStoreProvider>,
}

impl SchemaStore {
    pub fn new<T: SchemaStoreProvider + 'static>(inner: T) -> Self {
        SchemaStore {
            inner: Arc::new(inner),
        }
    }

    /// Like `find_collection`, but an absent collection is `Ok(None)`.
    pub fn find_optional(&self, id_or_name: &str) -> StrataResult<Option<CollectionDefinition>> {
        match self.inner.find_collection(id_or_name) {
            Ok(collection) => Ok(Some(collection)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl Deref for SchemaStore {
    type Target = Arc<dyn SchemaStoreProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
