use super::SchemaChange;
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::schema::CollectionDefinition;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// The full schema held by the bundled providers, in collection order.
///
/// This is also the on-disk shape of a schema snapshot file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    #[serde(default)]
    pub collections: Vec<CollectionDefinition>,
}

impl SchemaSnapshot {
    pub(crate) fn position(&self, id_or_name: &str) -> Option<usize> {
        // ids take precedence over names
        self.collections
            .iter()
            .position(|collection| collection.id == id_or_name)
            .or_else(|| {
                self.collections
                    .iter()
                    .position(|collection| collection.name == id_or_name)
            })
    }

    pub(crate) fn find(&self, id_or_name: &str) -> StrataResult<CollectionDefinition> {
        match self.position(id_or_name) {
            Some(index) => Ok(self.collections[index].clone()),
            None => Err(StrataError::new(
                &format!("Collection {} not found", id_or_name),
                ErrorKind::NotFound,
            )),
        }
    }

    pub(crate) fn save(&mut self, collection: &CollectionDefinition) -> StrataResult<CollectionDefinition> {
        collection.validate()?;
        self.check_name_free(collection)?;
        self.write(collection)
    }

    fn check_name_free(&self, collection: &CollectionDefinition) -> StrataResult<()> {
        let name_taken = self
            .collections
            .iter()
            .any(|other| other.id != collection.id && other.name == collection.name);
        if name_taken {
            log::error!("Collection name {} is already in use", collection.name);
            return Err(StrataError::new(
                &format!("Collection name {} is already in use", collection.name),
                ErrorKind::Validation,
            ));
        }
        Ok(())
    }

    /// Names must be unique across the whole snapshot.
    fn check_names_unique(&self) -> StrataResult<()> {
        let duplicates: Vec<&str> = self
            .collections
            .iter()
            .map(|collection| collection.name.as_str())
            .duplicates()
            .collect();
        if !duplicates.is_empty() {
            log::error!("Collection names {} are used more than once", duplicates.join(", "));
            return Err(StrataError::new(
                &format!("Collection name {} is already in use", duplicates.join(", ")),
                ErrorKind::Validation,
            ));
        }
        Ok(())
    }

    /// Stores `collection` after the revision check, without looking at names.
    fn write(&mut self, collection: &CollectionDefinition) -> StrataResult<CollectionDefinition> {
        let existing = self
            .collections
            .iter()
            .position(|other| other.id == collection.id);

        let mut stored = collection.clone();
        match existing {
            Some(index) => {
                let current = self.collections[index].revision;
                if current != collection.revision {
                    log::error!(
                        "Collection {} was modified concurrently (revision {} != {})",
                        collection.id,
                        collection.revision,
                        current
                    );
                    return Err(StrataError::new(
                        &format!(
                            "Collection {} was modified concurrently: saving revision {} over revision {}",
                            collection.name, collection.revision, current
                        ),
                        ErrorKind::Conflict,
                    ));
                }
                stored.revision = current + 1;
                self.collections[index] = stored.clone();
            }
            None => {
                if collection.revision != 0 {
                    log::error!("Collection {} was deleted concurrently", collection.id);
                    return Err(StrataError::new(
                        &format!("Collection {} no longer exists", collection.name),
                        ErrorKind::Conflict,
                    ));
                }
                stored.revision = 1;
                self.collections.push(stored.clone());
            }
        }
        Ok(stored)
    }

    pub(crate) fn delete(&mut self, id: &str) -> StrataResult<()> {
        match self.collections.iter().position(|collection| collection.id == id) {
            Some(index) => {
                self.collections.remove(index);
                Ok(())
            }
            None => Err(StrataError::new(
                &format!("Collection {} not found", id),
                ErrorKind::NotFound,
            )),
        }
    }

    /// Applies every change to a copy and returns it; `self` is left untouched.
    ///
    /// Name uniqueness is checked once on the result, so a batch may move a
    /// name from one collection to another in any order.
    pub(crate) fn apply_all(&self, changes: &[SchemaChange]) -> StrataResult<SchemaSnapshot> {
        let mut next = self.clone();
        for change in changes {
            match change {
                SchemaChange::Save(collection) => {
                    collection.validate()?;
                    next.write(collection)?;
                }
                SchemaChange::Delete(id) => next.delete(id)?,
            }
        }
        next.check_names_unique()?;
        Ok(next)
    }
}
