use super::{SchemaChange, SchemaSnapshot, SchemaStoreProvider};
use crate::errors::StrataResult;
use crate::schema::CollectionDefinition;
use parking_lot::RwLock;

/// A schema store that lives in memory. Batches are applied all or nothing.
#[derive(Default)]
pub struct InMemorySchemaStore {
    state: RwLock<SchemaSnapshot>,
}

impl InMemorySchemaStore {
    pub fn new() -> Self {
        InMemorySchemaStore::default()
    }

    /// Creates a store holding `collections`, each saved once (revision 1).
    pub fn with_collections(collections: Vec<CollectionDefinition>) -> StrataResult<Self> {
        let mut state = SchemaSnapshot::default();
        for collection in &collections {
            state.save(collection)?;
        }
        Ok(InMemorySchemaStore {
            state: RwLock::new(state),
        })
    }

    /// A copy of the whole schema.
    pub fn snapshot(&self) -> SchemaSnapshot {
        self.state.read().clone()
    }
}

impl SchemaStoreProvider for InMemorySchemaStore {
    fn find_collection(&self, id_or_name: &str) -> StrataResult<CollectionDefinition> {
        self.state.read().find(id_or_name)
    }

    fn save(&self, collection: &CollectionDefinition) -> StrataResult<CollectionDefinition> {
        self.state.write().save(collection)
    }

    fn delete(&self, id: &str) -> StrataResult<()> {
        self.state.write().delete(id)
    }

    fn collections(&self) -> StrataResult<Vec<CollectionDefinition>> {
        Ok(self.state.read().collections.clone())
    }

    fn apply_batch(&self, changes: &[SchemaChange]) -> StrataResult<()> {
        let mut state = self.state.write();
        let next = state.apply_all(changes)?;
        *state = next;
        Ok(())
    }
}
