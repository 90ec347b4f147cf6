use super::{SchemaChange, SchemaSnapshot, SchemaStoreProvider};
use crate::common::{read_json, write_json_atomic};
use crate::errors::StrataResult;
use crate::schema::CollectionDefinition;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

/// A schema store persisted as a single JSON snapshot file.
///
/// Every mutation is applied to a copy of the snapshot, written through a
/// temporary file and renamed into place, and only then made visible. A failed
/// write leaves both the file and the in-memory view unchanged.
pub struct JsonFileSchemaStore {
    path: PathBuf,
    state: RwLock<SchemaSnapshot>,
}

impl JsonFileSchemaStore {
    /// Opens the snapshot at `path`. A missing file is an empty schema; it is
    /// created on the first write.
    pub fn open(path: impl AsRef<Path>) -> StrataResult<Self> {
        let path = path.as_ref().to_path_buf();
        let state = read_json::<SchemaSnapshot>(&path)?.unwrap_or_default();
        log::debug!(
            "Opened schema snapshot {} with {} collections",
            path.display(),
            state.collections.len()
        );
        Ok(JsonFileSchemaStore {
            path,
            state: RwLock::new(state),
        })
    }

    /// Opens the snapshot at `path`, writing `seed` to it first if the file does
    /// not exist yet.
    pub fn open_or_seed(
        path: impl AsRef<Path>,
        seed: Vec<CollectionDefinition>,
    ) -> StrataResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!(
                "Seeding schema snapshot {} with {} collections",
                path.display(),
                seed.len()
            );
            let mut state = SchemaSnapshot::default();
            for collection in &seed {
                state.save(collection)?;
            }
            write_json_atomic(path, &state)?;
        }
        JsonFileSchemaStore::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn commit<R>(
        &self,
        mutate: impl FnOnce(&mut SchemaSnapshot) -> StrataResult<R>,
    ) -> StrataResult<R> {
        let mut state = self.state.write();
        let mut next = state.clone();
        let result = mutate(&mut next)?;
        write_json_atomic(&self.path, &next)?;
        *state = next;
        Ok(result)
    }
}

impl SchemaStoreProvider for JsonFileSchemaStore {
    fn find_collection(&self, id_or_name: &str) -> StrataResult<CollectionDefinition> {
        self.state.read().find(id_or_name)
    }

    fn save(&self, collection: &CollectionDefinition) -> StrataResult<CollectionDefinition> {
        self.commit(|state| state.save(collection))
    }

    fn delete(&self, id: &str) -> StrataResult<()> {
        self.commit(|state| state.delete(id))
    }

    fn collections(&self) -> StrataResult<Vec<CollectionDefinition>> {
        Ok(self.state.read().collections.clone())
    }

    fn apply_batch(&self, changes: &[SchemaChange]) -> StrataResult<()> {
        self.commit(|state| {
            *state = state.apply_all(changes)?;
            Ok(())
        })
    }
}
