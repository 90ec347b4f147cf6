use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// An access rule on a collection.
///
/// The backend distinguishes three states and so does this type:
///
/// - `Unset` is stored as JSON `null` and means the operation is unrestricted.
/// - `Nobody` is stored as the empty string `""` and restricts it to nobody.
/// - `Expression` holds a filter expression such as `@request.auth.id = user`.
///
/// `Unset` and `Nobody` are different states. Migrations that revert a rule must
/// restore the exact prior form, so the two are never folded into one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Rule {
    #[default]
    Unset,
    Nobody,
    Expression(String),
}

impl Rule {
    /// Builds an expression rule. An empty expression is `Nobody`.
    pub fn expr(expression: &str) -> Rule {
        if expression.is_empty() {
            Rule::Nobody
        } else {
            Rule::Expression(expression.to_string())
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Rule::Unset)
    }

    /// The literal the rule is persisted as (`None` for `null`).
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Rule::Unset => None,
            Rule::Nobody => Some(""),
            Rule::Expression(expression) => Some(expression.as_str()),
        }
    }
}

impl From<Option<String>> for Rule {
    fn from(value: Option<String>) -> Self {
        match value {
            None => Rule::Unset,
            Some(expression) if expression.is_empty() => Rule::Nobody,
            Some(expression) => Rule::Expression(expression),
        }
    }
}

impl From<Rule> for Option<String> {
    fn from(rule: Rule) -> Self {
        match rule {
            Rule::Unset => None,
            Rule::Nobody => Some(String::new()),
            Rule::Expression(expression) => Some(expression),
        }
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Rule::Unset => write!(f, "null"),
            Rule::Nobody => write!(f, "\"\""),
            Rule::Expression(expression) => write!(f, "{:?}", expression),
        }
    }
}

/// The operations a collection guards with a rule. `View` is the single-record read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuleKind {
    #[serde(rename = "listRule")]
    List,
    #[serde(rename = "viewRule")]
    View,
    #[serde(rename = "createRule")]
    Create,
    #[serde(rename = "updateRule")]
    Update,
    #[serde(rename = "deleteRule")]
    Delete,
}

impl RuleKind {
    pub const ALL: [RuleKind; 5] = [
        RuleKind::List,
        RuleKind::View,
        RuleKind::Create,
        RuleKind::Update,
        RuleKind::Delete,
    ];
}

/// The full set of rules attached to a collection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(rename = "listRule", default)]
    pub list: Rule,
    #[serde(rename = "viewRule", default)]
    pub view: Rule,
    #[serde(rename = "createRule", default)]
    pub create: Rule,
    #[serde(rename = "updateRule", default)]
    pub update: Rule,
    #[serde(rename = "deleteRule", default)]
    pub delete: Rule,
}

impl RuleSet {
    pub fn get(&self, kind: RuleKind) -> &Rule {
        match kind {
            RuleKind::List => &self.list,
            RuleKind::View => &self.view,
            RuleKind::Create => &self.create,
            RuleKind::Update => &self.update,
            RuleKind::Delete => &self.delete,
        }
    }

    pub fn set(&mut self, kind: RuleKind, rule: Rule) {
        let slot = match kind {
            RuleKind::List => &mut self.list,
            RuleKind::View => &mut self.view,
            RuleKind::Create => &mut self.create,
            RuleKind::Update => &mut self.update,
            RuleKind::Delete => &mut self.delete,
        };
        *slot = rule;
    }

    /// Applies every rule named in the patch; the others keep their value.
    pub fn apply(&mut self, patch: &RulePatch) {
        for (kind, rule) in patch.iter() {
            self.set(*kind, rule.clone());
        }
    }
}

/// A partial rule map, as written in a migration: only the named rules change.
///
/// A key mapped to `null` sets the rule to [`Rule::Unset`]; a missing key leaves
/// the rule alone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RulePatch(IndexMap<RuleKind, Rule>);

impl RulePatch {
    pub fn new() -> Self {
        RulePatch(IndexMap::new())
    }

    /// Sets one rule in the patch, replacing an earlier value for the same kind.
    pub fn with(mut self, kind: RuleKind, rule: Rule) -> Self {
        self.0.insert(kind, rule);
        self
    }

    /// Sets all five rules to the same value.
    pub fn all(rule: Rule) -> Self {
        RuleKind::ALL
            .iter()
            .fold(RulePatch::new(), |patch, kind| patch.with(*kind, rule.clone()))
    }

    pub fn get(&self, kind: RuleKind) -> Option<&Rule> {
        self.0.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RuleKind, &Rule)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
