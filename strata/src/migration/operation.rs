use super::CollectionRef;
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::schema::{CollectionDefinition, FieldSpec, RulePatch};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A declarative schema change, the building block of a step body.
///
/// Every operation is idempotent: applying it to a schema that already reflects
/// it changes nothing. In step files operations are tagged by `op`:
///
/// ```json
/// {"op": "addField", "collection": "pbc_1234567890", "position": 9,
///  "field": {"id": "json1111111111", "name": "exif", "type": "json"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Operation {
    /// Creates a collection unless one with the same id or name exists.
    CreateCollection { collection: CollectionDefinition },

    /// Deletes a collection.
    DeleteCollection { collection: CollectionRef },

    /// Renames a collection; its id is unchanged.
    RenameCollection { collection: CollectionRef, name: String },

    /// Inserts `field` at `position` (the end when absent), replacing a field
    /// with the same id. With `if_missing`, a field of the same name makes this
    /// a no-op.
    #[serde(rename_all = "camelCase")]
    AddField {
        collection: CollectionRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
        field: FieldSpec,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        if_missing: bool,
    },

    /// Removes a field by id; an absent field is a no-op.
    #[serde(rename_all = "camelCase")]
    RemoveField {
        collection: CollectionRef,
        field_id: String,
    },

    /// Sets the rules named in the patch; the others are left alone.
    SetRules {
        collection: CollectionRef,
        rules: RulePatch,
    },
}

impl Operation {
    pub fn create_collection(collection: CollectionDefinition) -> Self {
        Operation::CreateCollection { collection }
    }

    pub fn delete_collection(collection: CollectionRef) -> Self {
        Operation::DeleteCollection { collection }
    }

    pub fn rename_collection(collection: CollectionRef, name: &str) -> Self {
        Operation::RenameCollection {
            collection,
            name: name.to_string(),
        }
    }

    pub fn add_field(collection: CollectionRef, position: usize, field: FieldSpec) -> Self {
        Operation::AddField {
            collection,
            position: Some(position),
            field,
            if_missing: false,
        }
    }

    /// Like [`Operation::add_field`], skipped when a field with the same name exists.
    pub fn add_field_if_missing(collection: CollectionRef, position: usize, field: FieldSpec) -> Self {
        Operation::AddField {
            collection,
            position: Some(position),
            field,
            if_missing: true,
        }
    }

    pub fn remove_field(collection: CollectionRef, field_id: &str) -> Self {
        Operation::RemoveField {
            collection,
            field_id: field_id.to_string(),
        }
    }

    pub fn set_rules(collection: CollectionRef, rules: RulePatch) -> Self {
        Operation::SetRules { collection, rules }
    }

    /// Static checks run when a catalog is built, before any step executes.
    pub fn validate(&self) -> StrataResult<()> {
        match self {
            Operation::CreateCollection { collection } => collection.validate().map_err(|e| {
                StrataError::new_with_cause(
                    &format!("Invalid definition for new collection {}", collection.name),
                    ErrorKind::Configuration,
                    e,
                )
            }),
            Operation::RenameCollection { collection, name } if name.trim().is_empty() => {
                Err(StrataError::new(
                    &format!("Collection {} cannot be renamed to an empty name", collection),
                    ErrorKind::Configuration,
                ))
            }
            Operation::AddField { field, .. } => field.validate(),
            Operation::RemoveField { field_id, .. } if field_id.trim().is_empty() => Err(
                StrataError::new("removeField needs a field id", ErrorKind::Configuration),
            ),
            _ => Ok(()),
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::CreateCollection { collection } => {
                write!(f, "create collection {}", collection.name)
            }
            Operation::DeleteCollection { collection } => write!(f, "delete collection {}", collection),
            Operation::RenameCollection { collection, name } => {
                write!(f, "rename collection {} to {}", collection, name)
            }
            Operation::AddField {
                collection, field, ..
            } => write!(f, "add field {} to {}", field.name, collection),
            Operation::RemoveField {
                collection,
                field_id,
            } => write!(f, "remove field {} from {}", field_id, collection),
            Operation::SetRules { collection, rules } => {
                write!(f, "set {} rules on {}", rules.len(), collection)
            }
        }
    }
}
