use super::working_set::WorkingSet;
use super::Operation;
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::store::SchemaStore;
use crate::version::Version;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// What a transform did to the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Changes were saved to the store.
    Applied,
    /// The schema already reflected the transform.
    Unchanged,
    /// A guarded lookup found nothing, so the transform was a no-op.
    Skipped { reason: String },
    /// The step has no backward transform; the schema was left as is.
    Irreversible,
}

impl Display for StepOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StepOutcome::Applied => write!(f, "applied"),
            StepOutcome::Unchanged => write!(f, "unchanged"),
            StepOutcome::Skipped { reason } => write!(f, "skipped ({})", reason),
            StepOutcome::Irreversible => write!(f, "irreversible"),
        }
    }
}

/// A custom transform written in Rust.
pub type TransformFn = Arc<dyn Fn(&SchemaStore) -> StrataResult<StepOutcome> + Send + Sync>;

/// One direction of a migration step.
#[derive(Clone)]
pub enum Transform {
    /// Declarative operations, committed together as one batch.
    Operations(Vec<Operation>),
    /// Arbitrary code against the store; it commits its own changes.
    Custom(TransformFn),
}

impl Transform {
    pub fn custom<F>(transform: F) -> Self
    where
        F: Fn(&SchemaStore) -> StrataResult<StepOutcome> + Send + Sync + 'static,
    {
        Transform::Custom(Arc::new(transform))
    }

    /// True for an empty operation list.
    pub fn is_noop(&self) -> bool {
        matches!(self, Transform::Operations(operations) if operations.is_empty())
    }

    pub fn apply(&self, store: &SchemaStore) -> StrataResult<StepOutcome> {
        match self {
            Transform::Operations(operations) => {
                let mut working = WorkingSet::new(store);
                for operation in operations {
                    working.apply(operation)?;
                }
                working.commit()
            }
            Transform::Custom(transform) => transform(store),
        }
    }

    fn validate(&self) -> StrataResult<()> {
        if let Transform::Operations(operations) = self {
            for operation in operations {
                operation.validate()?;
            }
        }
        Ok(())
    }
}

impl Debug for Transform {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Transform::Operations(operations) => f.debug_tuple("Operations").field(operations).finish(),
            Transform::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

impl From<Vec<Operation>> for Transform {
    fn from(operations: Vec<Operation>) -> Self {
        Transform::Operations(operations)
    }
}

/// A single versioned schema change.
///
/// `down` restores the pre-`up` state of everything `up` touched. A step
/// without a `down`, or with an empty one, is irreversible: reverting it only
/// removes its ledger entry.
///
/// ```rust
/// use strata::migration::{CollectionRef, MigrationStep, Operation};
/// use strata::schema::FieldSpec;
///
/// let photos = CollectionRef::named("pbc_1234567890");
/// let step = MigrationStep::new(
///     1770000003,
///     "added_sort_order",
///     vec![Operation::add_field(photos.clone(), 7, FieldSpec::number("number5043921187", "sortOrder"))],
/// )
/// .with_down(vec![Operation::remove_field(photos, "number5043921187")]);
///
/// assert!(step.is_reversible());
/// ```
#[derive(Clone, Debug)]
pub struct MigrationStep {
    version: Version,
    name: String,
    up: Transform,
    down: Option<Transform>,
}

impl MigrationStep {
    pub fn new(version: u64, name: &str, up: impl Into<Transform>) -> Self {
        MigrationStep {
            version: Version::new(version),
            name: name.to_string(),
            up: up.into(),
            down: None,
        }
    }

    pub fn with_down(mut self, down: impl Into<Transform>) -> Self {
        self.down = Some(down.into());
        self
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_reversible(&self) -> bool {
        self.down.as_ref().is_some_and(|down| !down.is_noop())
    }

    pub fn apply_up(&self, store: &SchemaStore) -> StrataResult<StepOutcome> {
        self.up.apply(store)
    }

    /// Runs the backward transform; an irreversible step reports
    /// [`StepOutcome::Irreversible`] without touching the store.
    pub fn apply_down(&self, store: &SchemaStore) -> StrataResult<StepOutcome> {
        match &self.down {
            Some(down) if !down.is_noop() => down.apply(store),
            _ => Ok(StepOutcome::Irreversible),
        }
    }

    pub fn validate(&self) -> StrataResult<()> {
        if self.version.is_initial() {
            return Err(StrataError::new(
                &format!("Migration {} uses the reserved version 0", self.name),
                ErrorKind::Configuration,
            ));
        }

        let result = self
            .up
            .validate()
            .and_then(|_| self.down.as_ref().map_or(Ok(()), Transform::validate));
        result.map_err(|e| {
            StrataError::new_with_cause(
                &format!("Migration {} ({}) is malformed", self.version, self.name),
                ErrorKind::Configuration,
                e,
            )
        })
    }
}

impl Display for MigrationStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.version, self.name)
    }
}
