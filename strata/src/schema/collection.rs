use super::{FieldSpec, RulePatch, RuleSet};
use crate::errors::{ErrorKind, StrataError, StrataResult};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// The kind of a collection as the backend models it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    #[default]
    Base,
    Auth,
    View,
}

/// A named collection: a stable id, a mutable name, ordered fields and access rules.
///
/// Field order is significant (it is the position used by `add_field_at`) and is
/// preserved through persistence. `revision` is owned by the schema store: it is
/// bumped on every save and checked against the stored value to detect
/// concurrent modification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDefinition {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub collection_type: CollectionType,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(flatten)]
    pub rules: RuleSet,
    #[serde(default)]
    pub revision: u64,
}

impl CollectionDefinition {
    pub fn new(id: &str, name: &str) -> Self {
        CollectionDefinition {
            id: id.to_string(),
            name: name.to_string(),
            collection_type: CollectionType::Base,
            fields: Vec::new(),
            rules: RuleSet::default(),
            revision: 0,
        }
    }

    pub fn with_type(mut self, collection_type: CollectionType) -> Self {
        self.collection_type = collection_type;
        self
    }

    /// Appends a field at the end of the field list.
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        let position = self.fields.len();
        self.add_field_at(position, field);
        self
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// True when `id_or_name` is this collection's id or its current name.
    pub fn matches(&self, id_or_name: &str) -> bool {
        self.id == id_or_name || self.name == id_or_name
    }

    pub fn get_field_by_name(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn get_field_by_id(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.id == id)
    }

    pub fn field_position(&self, id: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.id == id)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }

    /// Inserts `field` at `position` and returns the position it landed on.
    ///
    /// A field with the same id is taken out first, so adding a field that
    /// already exists replaces it (this is how a field's constraints are
    /// updated) instead of duplicating it. Positions past the end append.
    pub fn add_field_at(&mut self, position: usize, field: FieldSpec) -> usize {
        if let Some(existing) = self.field_position(&field.id) {
            self.fields.remove(existing);
        }
        let position = position.min(self.fields.len());
        self.fields.insert(position, field);
        position
    }

    /// Removes the field with `id`; an absent field is not an error.
    pub fn remove_field_by_id(&mut self, id: &str) -> Option<FieldSpec> {
        self.field_position(id).map(|position| self.fields.remove(position))
    }

    pub fn set_rules(&mut self, patch: &RulePatch) {
        self.rules.apply(patch);
    }

    /// Compares everything a client can observe, ignoring the store revision.
    pub fn observably_eq(&self, other: &CollectionDefinition) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.collection_type == other.collection_type
            && self.fields == other.fields
            && self.rules == other.rules
    }

    /// Checks the definition as a whole before a store accepts it.
    pub fn validate(&self) -> StrataResult<()> {
        if self.id.trim().is_empty() || self.name.trim().is_empty() {
            return Err(StrataError::new(
                "Collection id and name must not be empty",
                ErrorKind::Validation,
            ));
        }

        for field in &self.fields {
            field.validate().map_err(|e| {
                StrataError::new_with_cause(
                    &format!("Collection {} has an invalid field", self.name),
                    ErrorKind::Validation,
                    e,
                )
            })?;
        }

        let duplicate_ids: Vec<&str> = self
            .fields
            .iter()
            .map(|field| field.id.as_str())
            .duplicates()
            .collect();
        if !duplicate_ids.is_empty() {
            return Err(StrataError::new(
                &format!(
                    "Collection {} has duplicate field ids: {}",
                    self.name,
                    duplicate_ids.join(", ")
                ),
                ErrorKind::Validation,
            ));
        }

        let duplicate_names: Vec<&str> = self
            .fields
            .iter()
            .map(|field| field.name.as_str())
            .duplicates()
            .collect();
        if !duplicate_names.is_empty() {
            return Err(StrataError::new(
                &format!(
                    "Collection {} has duplicate field names: {}",
                    self.name,
                    duplicate_names.join(", ")
                ),
                ErrorKind::Validation,
            ));
        }

        Ok(())
    }
}
