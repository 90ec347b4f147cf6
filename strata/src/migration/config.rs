/// Run options for a [`MigrationEngine`](super::MigrationEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MigrationConfig {
    /// Plan only: report the steps a run would execute without touching the
    /// schema store or the ledger.
    pub dry_run: bool,
    /// Apply catalog steps older than the last applied version that were never
    /// applied. Without it such steps are skipped with a warning.
    pub out_of_order: bool,
}

impl MigrationConfig {
    pub fn new() -> Self {
        MigrationConfig::default()
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn out_of_order(mut self, out_of_order: bool) -> Self {
        self.out_of_order = out_of_order;
        self
    }
}
