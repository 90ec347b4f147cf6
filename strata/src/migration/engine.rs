use super::{
    Catalog, Direction, MigrationConfig, MigrationReport, MigrationStatus, MigrationStep,
    StepFailure, StepOutcome, StepRecord, StepRef, StepStatus,
};
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::ledger::{Ledger, LedgerEntry};
use crate::store::SchemaStore;
use crate::version::Version;
use std::collections::BTreeMap;
use std::path::Path;

/// How far an upgrade goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Latest,
    Version(Version),
}

impl From<Version> for Target {
    fn from(version: Version) -> Self {
        Target::Version(version)
    }
}

/// Brings a schema store to a target version by applying or reverting catalog
/// steps, and keeps the ledger in step with what was done.
///
/// Runs are sequential and stop at the first failing step. A step is recorded
/// in (or removed from) the ledger right after its transform succeeds, so a
/// failed run keeps everything it committed and the next run resumes after it.
///
/// ```rust
/// use strata::ledger::{InMemoryLedger, Ledger};
/// use strata::migration::{CollectionRef, MigrationEngine, MigrationStep, Operation, Target};
/// use strata::schema::{CollectionDefinition, FieldSpec};
/// use strata::store::{InMemorySchemaStore, SchemaStore};
///
/// let store = SchemaStore::new(InMemorySchemaStore::with_collections(vec![
///     CollectionDefinition::new("pbc_1234567890", "photos"),
/// ])?);
/// let photos = CollectionRef::named("pbc_1234567890");
///
/// let engine = MigrationEngine::builder()
///     .schema_store(store.clone())
///     .ledger(Ledger::new(InMemoryLedger::new()))
///     .add_step(
///         MigrationStep::new(1, "add_exif", vec![
///             Operation::add_field(photos.clone(), 0, FieldSpec::json("json1111111111", "exif")),
///         ])
///         .with_down(vec![Operation::remove_field(photos, "json1111111111")]),
///     )
///     .build()?;
///
/// let report = engine.upgrade(Target::Latest)?;
/// assert!(report.is_success());
/// assert!(store.find_collection("photos")?.get_field_by_name("exif").is_some());
/// # Ok::<(), strata::errors::StrataError>(())
/// ```
pub struct MigrationEngine {
    store: SchemaStore,
    ledger: Ledger,
    catalog: Catalog,
    config: MigrationConfig,
}

impl MigrationEngine {
    pub fn new(store: SchemaStore, ledger: Ledger, catalog: Catalog, config: MigrationConfig) -> Self {
        MigrationEngine {
            store,
            ledger,
            catalog,
            config,
        }
    }

    pub fn builder() -> MigrationEngineBuilder {
        MigrationEngineBuilder::new()
    }

    pub fn store(&self) -> &SchemaStore {
        &self.store
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// The steps `upgrade(target)` would apply, in application order.
    pub fn plan_upgrade(&self, target: Target) -> StrataResult<Vec<&MigrationStep>> {
        let applied = self.ledger.applied_versions()?;
        let last_applied = applied.last().copied().unwrap_or(Version::INITIAL);
        let target = match target {
            Target::Latest => self.catalog.latest(),
            Target::Version(version) => version,
        };

        let mut plan = Vec::new();
        for step in self.catalog.steps() {
            let version = step.version();
            if version > target || applied.contains(&version) {
                continue;
            }
            if version < last_applied && !self.config.out_of_order {
                log::warn!(
                    "Migration {} is older than the last applied version {} and was never applied; skipping it",
                    step,
                    last_applied
                );
                continue;
            }
            plan.push(step);
        }
        Ok(plan)
    }

    /// The steps `downgrade(target)` would revert, in reverse version order.
    ///
    /// Fails with a configuration error when the ledger holds a version above
    /// `target` that the catalog does not know, since it cannot be reverted.
    pub fn plan_downgrade(&self, target: Version) -> StrataResult<Vec<&MigrationStep>> {
        let applied = self.ledger.applied_versions()?;

        let unknown: Vec<String> = applied
            .iter()
            .filter(|version| **version > target && self.catalog.get(**version).is_none())
            .map(Version::to_string)
            .collect();
        if !unknown.is_empty() {
            log::error!(
                "Cannot downgrade to {}: applied versions {} are not in the catalog",
                target,
                unknown.join(", ")
            );
            return Err(StrataError::new(
                &format!(
                    "Cannot downgrade to {}: applied versions {} are not in the catalog",
                    target,
                    unknown.join(", ")
                ),
                ErrorKind::Configuration,
            ));
        }

        Ok(self
            .catalog
            .steps()
            .iter()
            .rev()
            .filter(|step| step.version() > target && applied.contains(&step.version()))
            .collect())
    }

    /// Applies pending steps up to `target`, in ascending version order.
    ///
    /// Setup problems (unreadable ledger) are returned as errors. A failing
    /// step is reported in [`MigrationReport::failure`] together with the steps
    /// committed before it.
    pub fn upgrade(&self, target: Target) -> StrataResult<MigrationReport> {
        let plan = self.plan_upgrade(target)?;
        self.run(Direction::Up, plan)
    }

    /// Reverts applied steps above `target`, in descending version order.
    pub fn downgrade(&self, target: Version) -> StrataResult<MigrationReport> {
        let plan = self.plan_downgrade(target)?;
        self.run(Direction::Down, plan)
    }

    /// Every catalog step with its applied timestamp, plus ledger entries the
    /// catalog does not know.
    pub fn status(&self) -> StrataResult<MigrationStatus> {
        let mut entries: BTreeMap<Version, LedgerEntry> = self
            .ledger
            .entries()?
            .into_iter()
            .map(|entry| (entry.version, entry))
            .collect();
        let current = entries.keys().last().copied().unwrap_or(Version::INITIAL);

        let steps = self
            .catalog
            .steps()
            .iter()
            .map(|step| StepStatus {
                step: StepRef::from(step),
                applied_at: entries.remove(&step.version()).map(|entry| entry.applied_at),
                reversible: step.is_reversible(),
            })
            .collect();

        Ok(MigrationStatus {
            current,
            steps,
            unknown: entries.into_values().collect(),
        })
    }

    fn run(&self, direction: Direction, plan: Vec<&MigrationStep>) -> StrataResult<MigrationReport> {
        let planned = plan.iter().map(|step| StepRef::from(*step)).collect();
        let mut report = MigrationReport::new(direction, self.config.dry_run, planned);

        if plan.is_empty() {
            log::info!("No migrations to run ({})", direction);
            return Ok(report);
        }
        if self.config.dry_run {
            for step in &plan {
                log::info!("Dry run: would migrate {} {}", direction, step);
            }
            return Ok(report);
        }

        for step in plan {
            let result = match direction {
                Direction::Up => self.apply_step(step),
                Direction::Down => self.revert_step(step),
            };

            match result {
                Ok(outcome) => {
                    log::info!("Migrated {} {}: {}", direction, step, outcome);
                    report.committed.push(StepRecord {
                        step: StepRef::from(step),
                        outcome,
                    });
                }
                Err(error) => {
                    log::error!("Migration {} {} failed: {}", direction, step, error);
                    report.failure = Some(StepFailure {
                        step: StepRef::from(step),
                        error,
                    });
                    break;
                }
            }
        }
        Ok(report)
    }

    fn apply_step(&self, step: &MigrationStep) -> StrataResult<StepOutcome> {
        log::info!("Applying migration {}", step);
        let outcome = step.apply_up(&self.store)?;
        if let StepOutcome::Skipped { reason } = &outcome {
            log::warn!("Migration {} skipped: {}", step, reason);
        }
        self.ledger
            .record(LedgerEntry::now(step.version(), step.name()))?;
        Ok(outcome)
    }

    fn revert_step(&self, step: &MigrationStep) -> StrataResult<StepOutcome> {
        log::info!("Reverting migration {}", step);
        if !step.is_reversible() {
            log::warn!(
                "Migration {} is irreversible; removing it from the ledger without restoring the schema",
                step
            );
        }
        let outcome = step.apply_down(&self.store)?;
        if let StepOutcome::Skipped { reason } = &outcome {
            log::warn!("Revert of {} skipped: {}", step, reason);
        }
        self.ledger.remove(step.version())?;
        Ok(outcome)
    }
}

/// Builder for [`MigrationEngine`].
///
/// The first error raised by a builder method is kept and returned by
/// [`build`](MigrationEngineBuilder::build); later calls are ignored.
#[derive(Default)]
pub struct MigrationEngineBuilder {
    error: Option<StrataError>,
    store: Option<SchemaStore>,
    ledger: Option<Ledger>,
    steps: Vec<MigrationStep>,
    config: MigrationConfig,
}

impl MigrationEngineBuilder {
    pub fn new() -> Self {
        MigrationEngineBuilder::default()
    }

    pub fn schema_store(mut self, store: SchemaStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn ledger(mut self, ledger: Ledger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn add_step(mut self, step: MigrationStep) -> Self {
        if self.error.is_none() {
            match step.validate() {
                Ok(_) => self.steps.push(step),
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    pub fn add_steps(self, steps: impl IntoIterator<Item = MigrationStep>) -> Self {
        steps.into_iter().fold(self, |builder, step| builder.add_step(step))
    }

    /// Adds every step of an existing catalog.
    pub fn catalog(self, catalog: Catalog) -> Self {
        self.add_steps(catalog.steps().to_vec())
    }

    /// Adds every step file found in `dir`.
    pub fn migrations_dir(mut self, dir: impl AsRef<Path>) -> Self {
        if self.error.is_none() {
            match Catalog::load_dir(dir) {
                Ok(catalog) => return self.catalog(catalog),
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    pub fn config(mut self, config: MigrationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn out_of_order(mut self, out_of_order: bool) -> Self {
        self.config.out_of_order = out_of_order;
        self
    }

    pub fn build(self) -> StrataResult<MigrationEngine> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let store = self.store.ok_or_else(|| {
            StrataError::new("Migration engine needs a schema store", ErrorKind::Configuration)
        })?;
        let ledger = self.ledger.ok_or_else(|| {
            StrataError::new("Migration engine needs a ledger", ErrorKind::Configuration)
        })?;
        let catalog = Catalog::new(self.steps)?;
        Ok(MigrationEngine::new(store, ledger, catalog, self.config))
    }
}
