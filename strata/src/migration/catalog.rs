use super::{MigrationStep, Operation, Transform};
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::version::Version;
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static STEP_FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)_([A-Za-z0-9_]+)\.json$").expect("valid step file pattern")
});

/// Contents of a `<version>_<name>.json` step file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFile {
    pub up: Vec<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down: Option<Vec<Operation>>,
}

impl StepFile {
    pub fn into_step(self, version: u64, name: &str) -> MigrationStep {
        let step = MigrationStep::new(version, name, Transform::Operations(self.up));
        match self.down {
            Some(down) => step.with_down(Transform::Operations(down)),
            None => step,
        }
    }
}

/// The validated, version-ordered set of migration steps.
///
/// A catalog never contains two steps with the same version, and every step in
/// it passed [`MigrationStep::validate`].
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    steps: Vec<MigrationStep>,
}

impl Catalog {
    pub fn new(steps: Vec<MigrationStep>) -> StrataResult<Self> {
        let duplicates: Vec<Version> = steps.iter().map(|step| step.version()).duplicates().collect();
        if !duplicates.is_empty() {
            let versions = duplicates.iter().map(Version::to_string).join(", ");
            log::error!("Duplicate migration versions in catalog: {}", versions);
            return Err(StrataError::new(
                &format!("Duplicate migration versions in catalog: {}", versions),
                ErrorKind::Configuration,
            ));
        }

        for step in &steps {
            step.validate()?;
        }

        let steps = steps
            .into_iter()
            .sorted_by_key(|step| step.version())
            .collect();
        Ok(Catalog { steps })
    }

    /// Loads every `<version>_<name>.json` file in `dir`. Other files are ignored.
    pub fn load_dir(dir: impl AsRef<Path>) -> StrataResult<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|e| {
            log::error!("Cannot read migrations directory {}: {}", dir.display(), e);
            StrataError::new_with_cause(
                &format!("Cannot read migrations directory {}", dir.display()),
                ErrorKind::Configuration,
                e.into(),
            )
        })?;

        let mut steps = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let Some((version, name)) = parse_step_file_name(file_name)? else {
                log::debug!("Ignoring {} in migrations directory", file_name);
                continue;
            };

            let content = fs::read_to_string(&path)?;
            let step_file: StepFile = serde_json::from_str(&content).map_err(|e| {
                log::error!("Cannot parse migration file {}: {}", file_name, e);
                StrataError::new_with_cause(
                    &format!("Cannot parse migration file {}", file_name),
                    ErrorKind::Configuration,
                    e.into(),
                )
            })?;
            steps.push(step_file.into_step(version, &name));
        }

        log::debug!("Loaded {} migrations from {}", steps.len(), dir.display());
        Catalog::new(steps)
    }

    /// Steps in ascending version order.
    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    pub fn get(&self, version: Version) -> Option<&MigrationStep> {
        self.steps
            .binary_search_by_key(&version, |step| step.version())
            .ok()
            .map(|index| &self.steps[index])
    }

    /// The highest version, or [`Version::INITIAL`] for an empty catalog.
    pub fn latest(&self) -> Version {
        self.steps
            .last()
            .map(|step| step.version())
            .unwrap_or(Version::INITIAL)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Splits `1768425595_updated_photos.json` into its version and name.
/// Returns `Ok(None)` for names that are not step files.
pub fn parse_step_file_name(file_name: &str) -> StrataResult<Option<(u64, String)>> {
    let Some(captures) = STEP_FILE_NAME.captures(file_name) else {
        return Ok(None);
    };
    let version: Version = captures[1].parse()?;
    Ok(Some((version.value(), captures[2].to_string())))
}
