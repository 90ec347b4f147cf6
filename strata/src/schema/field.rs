use crate::errors::{ErrorKind, StrataError, StrataResult};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

static FIELD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid field name pattern"));

/// The value type of a collection field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Bool,
    Date,
    Json,
    File,
    Relation,
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Bool => "bool",
            FieldType::Date => "date",
            FieldType::Json => "json",
            FieldType::File => "file",
            FieldType::Relation => "relation",
        };
        write!(f, "{}", name)
    }
}

/// Definition of one field in a collection.
///
/// The common flags are typed; every type-specific constraint (`max`, `min`,
/// `onlyInt`, `maxSelect`, `collectionId`, `mimeTypes`, `thumbs`, ...) lives in
/// `options` and is flattened into the same JSON object when persisted.
///
/// ```rust
/// use strata::schema::{FieldSpec, FieldType};
///
/// let iso = FieldSpec::number("number5555555555", "iso").option("onlyInt", true);
/// assert_eq!(iso.field_type, FieldType::Number);
/// assert!(iso.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub presentable: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub system: bool,
    #[serde(flatten)]
    pub options: IndexMap<String, Value>,
}

impl FieldSpec {
    pub fn new(id: &str, name: &str, field_type: FieldType) -> Self {
        FieldSpec {
            id: id.to_string(),
            name: name.to_string(),
            field_type,
            hidden: false,
            presentable: false,
            required: false,
            system: false,
            options: IndexMap::new(),
        }
    }

    pub fn text(id: &str, name: &str) -> Self {
        FieldSpec::new(id, name, FieldType::Text)
    }

    pub fn number(id: &str, name: &str) -> Self {
        FieldSpec::new(id, name, FieldType::Number)
    }

    pub fn bool(id: &str, name: &str) -> Self {
        FieldSpec::new(id, name, FieldType::Bool)
    }

    pub fn date(id: &str, name: &str) -> Self {
        FieldSpec::new(id, name, FieldType::Date)
    }

    pub fn json(id: &str, name: &str) -> Self {
        FieldSpec::new(id, name, FieldType::Json)
    }

    pub fn file(id: &str, name: &str) -> Self {
        FieldSpec::new(id, name, FieldType::File)
    }

    /// A relation field pointing at the collection with id `collection_id`.
    pub fn relation(id: &str, name: &str, collection_id: &str) -> Self {
        FieldSpec::new(id, name, FieldType::Relation).option("collectionId", collection_id)
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn presentable(mut self, presentable: bool) -> Self {
        self.presentable = presentable;
        self
    }

    pub fn system(mut self, system: bool) -> Self {
        self.system = system;
        self
    }

    /// Sets a type-specific option, replacing an existing value.
    pub fn option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    pub fn get_option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Checks the field on its own; collection-level rules (unique names and
    /// ids) are checked by [`CollectionDefinition::validate`](super::CollectionDefinition::validate).
    pub fn validate(&self) -> StrataResult<()> {
        if self.id.trim().is_empty() || self.id.chars().any(char::is_whitespace) {
            return Err(invalid(&format!(
                "Field '{}' has an invalid id '{}'",
                self.name, self.id
            )));
        }

        if !FIELD_NAME.is_match(&self.name) {
            return Err(invalid(&format!(
                "Field {} has an invalid name '{}'",
                self.id, self.name
            )));
        }

        if self.field_type == FieldType::Relation {
            let target = self.get_option("collectionId").and_then(Value::as_str);
            if target.map_or(true, str::is_empty) {
                return Err(invalid(&format!(
                    "Relation field '{}' requires a collectionId option",
                    self.name
                )));
            }
        }

        let min = self.get_option("min").and_then(Value::as_f64);
        let max = self.get_option("max").and_then(Value::as_f64);
        if let (Some(min), Some(max)) = (min, max) {
            // a zero max means "no limit" for text and json fields
            if max != 0.0 && min > max {
                return Err(invalid(&format!(
                    "Field '{}' has min {} greater than max {}",
                    self.name, min, max
                )));
            }
        }

        Ok(())
    }
}

fn invalid(message: &str) -> StrataError {
    log::error!("{}", message);
    StrataError::new(message, ErrorKind::Configuration)
}
