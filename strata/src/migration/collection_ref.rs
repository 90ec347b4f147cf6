use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// How an operation names the collection it works on.
///
/// A reference holds one or more candidate ids or names, tried in order. The
/// same logical collection may exist under different ids in different
/// environments, so a step can list every identifier it is known by.
///
/// When no candidate resolves, a *guarded* reference turns the operation into a
/// silent no-op; an unguarded one fails the step with `NotFound`.
///
/// In step files a reference is written as a string (`"photos"`), an array of
/// candidates (`["pbc_1234567890", "photos"]`) or an object
/// (`{"anyOf": ["favorites"], "optional": true}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CollectionRefRepr", into = "CollectionRefRepr")]
pub struct CollectionRef {
    candidates: Vec<String>,
    optional: bool,
}

impl CollectionRef {
    /// A required reference to a single id or name.
    pub fn named(id_or_name: &str) -> Self {
        CollectionRef {
            candidates: vec![id_or_name.to_string()],
            optional: false,
        }
    }

    /// A required reference with several candidate identifiers.
    pub fn any_of<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CollectionRef {
            candidates: candidates.into_iter().map(Into::into).collect(),
            optional: false,
        }
    }

    /// Marks the reference as guarded: an unresolved lookup skips the operation.
    pub fn guarded(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

impl Display for CollectionRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.candidates.join("|"))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum CollectionRefRepr {
    Single(String),
    Many(Vec<String>),
    Guarded {
        #[serde(rename = "anyOf")]
        any_of: Vec<String>,
        #[serde(default)]
        optional: bool,
    },
}

impl TryFrom<CollectionRefRepr> for CollectionRef {
    type Error = String;

    fn try_from(repr: CollectionRefRepr) -> Result<Self, Self::Error> {
        let (candidates, optional) = match repr {
            CollectionRefRepr::Single(candidate) => (vec![candidate], false),
            CollectionRefRepr::Many(candidates) => (candidates, false),
            CollectionRefRepr::Guarded { any_of, optional } => (any_of, optional),
        };

        if candidates.is_empty() || candidates.iter().any(|c| c.trim().is_empty()) {
            return Err("collection reference needs at least one non-empty id or name".to_string());
        }
        Ok(CollectionRef {
            candidates,
            optional,
        })
    }
}

impl From<CollectionRef> for CollectionRefRepr {
    fn from(reference: CollectionRef) -> Self {
        if reference.optional {
            CollectionRefRepr::Guarded {
                any_of: reference.candidates,
                optional: true,
            }
        } else if reference.candidates.len() == 1 {
            let mut candidates = reference.candidates;
            CollectionRefRepr::Single(candidates.remove(0))
        } else {
            CollectionRefRepr::Many(reference.candidates)
        }
    }
}
