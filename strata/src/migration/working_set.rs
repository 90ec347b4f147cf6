use super::{CollectionRef, Operation, StepOutcome};
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::schema::CollectionDefinition;
use crate::store::{SchemaChange, SchemaStore};
use indexmap::IndexMap;

struct WorkingCopy {
    collection: CollectionDefinition,
    created: bool,
    deleted: bool,
    dirty: bool,
}

impl WorkingCopy {
    fn loaded(collection: CollectionDefinition) -> Self {
        WorkingCopy {
            collection,
            created: false,
            deleted: false,
            dirty: false,
        }
    }
}

/// Working copies of the collections touched by one step.
///
/// Operations mutate the copies; nothing reaches the store until `commit`, which
/// submits every change as one batch.
pub(crate) struct WorkingSet<'a> {
    store: &'a SchemaStore,
    copies: IndexMap<String, WorkingCopy>,
    skipped: Vec<String>,
}

impl<'a> WorkingSet<'a> {
    pub(crate) fn new(store: &'a SchemaStore) -> Self {
        WorkingSet {
            store,
            copies: IndexMap::new(),
            skipped: Vec::new(),
        }
    }

    /// Finds the id of the collection known as `candidate` in this step's view
    /// of the schema, loading it from the store on first use.
    fn lookup(&mut self, candidate: &str) -> StrataResult<Option<String>> {
        let known = self
            .copies
            .values()
            .find(|copy| copy.collection.id == candidate)
            .or_else(|| {
                self.copies
                    .values()
                    .find(|copy| copy.collection.name == candidate)
            });
        if let Some(copy) = known {
            return Ok((!copy.deleted).then(|| copy.collection.id.clone()));
        }

        match self.store.find_optional(candidate)? {
            // already loaded, but renamed away from `candidate` in this step
            Some(collection) if self.copies.contains_key(&collection.id) => Ok(None),
            Some(collection) => {
                let id = collection.id.clone();
                self.copies.insert(id.clone(), WorkingCopy::loaded(collection));
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    fn resolve(&mut self, reference: &CollectionRef) -> StrataResult<Option<String>> {
        for candidate in reference.candidates() {
            if let Some(id) = self.lookup(candidate)? {
                return Ok(Some(id));
            }
        }

        if reference.is_optional() {
            log::warn!("Collection {} not found, skipping", reference);
            self.skipped
                .push(format!("collection {} not found", reference));
            Ok(None)
        } else {
            log::error!("Collection {} not found", reference);
            Err(StrataError::new(
                &format!("Collection {} not found", reference),
                ErrorKind::NotFound,
            ))
        }
    }

    /// Runs `change` on the referenced collection; it returns whether it changed anything.
    fn modify<F>(&mut self, reference: &CollectionRef, change: F) -> StrataResult<()>
    where
        F: FnOnce(&mut CollectionDefinition) -> bool,
    {
        let Some(id) = self.resolve(reference)? else {
            return Ok(());
        };
        if let Some(copy) = self.copies.get_mut(&id) {
            if change(&mut copy.collection) {
                copy.dirty = true;
            }
        }
        Ok(())
    }

    pub(crate) fn apply(&mut self, operation: &Operation) -> StrataResult<()> {
        log::debug!("Applying operation: {}", operation);
        match operation {
            Operation::CreateCollection { collection } => {
                let exists = self.lookup(&collection.id)?.is_some()
                    || self.lookup(&collection.name)?.is_some();
                if exists {
                    log::debug!("Collection {} already exists", collection.name);
                    return Ok(());
                }

                let mut created = WorkingCopy {
                    collection: collection.clone(),
                    created: true,
                    deleted: false,
                    dirty: true,
                };
                created.collection.revision = 0;
                // deleted earlier in this step: the store still holds it
                if let Some(previous) = self.copies.get(&collection.id) {
                    created.collection.revision = previous.collection.revision;
                    created.created = previous.created;
                }
                self.copies.insert(collection.id.clone(), created);
                Ok(())
            }
            Operation::DeleteCollection { collection } => {
                if let Some(id) = self.resolve(collection)? {
                    if let Some(copy) = self.copies.get_mut(&id) {
                        copy.deleted = true;
                        copy.dirty = true;
                    }
                }
                Ok(())
            }
            Operation::RenameCollection { collection, name } => self.modify(collection, |c| {
                if c.name == *name {
                    return false;
                }
                c.name = name.clone();
                true
            }),
            Operation::AddField {
                collection,
                position,
                field,
                if_missing,
            } => self.modify(collection, |c| {
                if *if_missing && c.get_field_by_name(&field.name).is_some() {
                    log::debug!("Field {} already exists in {}", field.name, c.name);
                    return false;
                }
                let before = c.fields.clone();
                c.add_field_at(position.unwrap_or(c.fields.len()), field.clone());
                c.fields != before
            }),
            Operation::RemoveField {
                collection,
                field_id,
            } => self.modify(collection, |c| c.remove_field_by_id(field_id).is_some()),
            Operation::SetRules { collection, rules } => self.modify(collection, |c| {
                let before = c.rules.clone();
                c.set_rules(rules);
                c.rules != before
            }),
        }
    }

    /// Submits the accumulated changes to the store as one batch.
    pub(crate) fn commit(self) -> StrataResult<StepOutcome> {
        let changes: Vec<SchemaChange> = self
            .copies
            .into_values()
            .filter_map(|copy| match (copy.deleted, copy.created, copy.dirty) {
                (true, true, _) => None,
                (true, false, _) => Some(SchemaChange::Delete(copy.collection.id)),
                (false, _, true) => Some(SchemaChange::Save(copy.collection)),
                (false, _, false) => None,
            })
            .collect();

        if changes.is_empty() {
            return Ok(if self.skipped.is_empty() {
                StepOutcome::Unchanged
            } else {
                StepOutcome::Skipped {
                    reason: self.skipped.join("; "),
                }
            });
        }

        self.store.apply_batch(&changes)?;
        Ok(StepOutcome::Applied)
    }
}
