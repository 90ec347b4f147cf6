use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;
use std::process::ExitCode;
use strata::gallery;
use strata::ledger::{JsonFileLedger, Ledger};
use strata::migration::{Catalog, MigrationEngine, MigrationReport, Target};
use strata::store::{JsonFileSchemaStore, SchemaStore};
use strata::Version;
use strata_fjall_adapter::FjallLedger;

#[derive(Parser)]
#[command(
    name = "strata",
    version,
    about = "Applies and reverts versioned schema migrations"
)]
struct Cli {
    /// Schema snapshot file; seeded with the gallery baseline when missing.
    #[arg(long, global = true, env = "STRATA_SCHEMA", default_value = "pb_schema.json")]
    schema: PathBuf,

    /// Ledger location: a JSON file, or a directory for the fjall backend.
    #[arg(long, global = true, env = "STRATA_LEDGER", default_value = "pb_ledger.json")]
    ledger: PathBuf,

    #[arg(long, global = true, env = "STRATA_LEDGER_BACKEND", value_enum, default_value_t = LedgerBackend::Json)]
    ledger_backend: LedgerBackend,

    /// Directory of `<version>_<name>.json` step files; the built-in gallery
    /// catalog is used when absent.
    #[arg(long, global = true, env = "STRATA_MIGRATIONS")]
    migrations: Option<PathBuf>,

    /// Print the plan without changing the schema or the ledger.
    #[arg(long, global = true)]
    dry_run: bool,

    /// Also apply never-applied steps older than the last applied version.
    #[arg(long, global = true)]
    out_of_order: bool,

    /// More output (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LedgerBackend {
    Json,
    Fjall,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations up to TARGET (default: latest).
    Up { target: Option<u64> },
    /// Revert applied migrations above TARGET (0 reverts everything).
    Down { target: u64 },
    /// Show applied and pending migrations.
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);
    if let Err(err) = &result {
        eprintln!("error: {:#}", err);
    }
    ExitCode::from(exit_status(&result))
}

/// 0 when every step ran, 1 when a step failed, 2 when the run could not start.
fn exit_status(result: &Result<bool>) -> u8 {
    match result {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(_) => 2,
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    colog::default_builder().filter_level(level).init();
}

fn run(cli: Cli) -> Result<bool> {
    let engine = build_engine(&cli)?;

    match cli.command {
        Commands::Up { target } => {
            let target = target.map_or(Target::Latest, |v| Target::Version(Version::new(v)));
            let report = engine.upgrade(target)?;
            Ok(print_report(&report))
        }
        Commands::Down { target } => {
            let report = engine.downgrade(Version::new(target))?;
            Ok(print_report(&report))
        }
        Commands::Status => {
            print_status(&engine)?;
            Ok(true)
        }
    }
}

fn build_engine(cli: &Cli) -> Result<MigrationEngine> {
    let mut seed = gallery::baseline_schema();
    seed.insert(0, gallery::users_collection());
    let store = JsonFileSchemaStore::open_or_seed(&cli.schema, seed)
        .with_context(|| format!("cannot open schema {}", cli.schema.display()))?;

    let ledger = match cli.ledger_backend {
        LedgerBackend::Json => Ledger::new(
            JsonFileLedger::open(&cli.ledger)
                .with_context(|| format!("cannot open ledger {}", cli.ledger.display()))?,
        ),
        LedgerBackend::Fjall => {
            let path = cli
                .ledger
                .to_str()
                .ok_or_else(|| anyhow!("ledger path {} is not valid UTF-8", cli.ledger.display()))?;
            Ledger::new(
                FjallLedger::with_config()
                    .db_path(path)
                    .build()
                    .with_context(|| format!("cannot open fjall ledger {}", path))?,
            )
        }
    };

    let catalog = match &cli.migrations {
        Some(dir) => Catalog::load_dir(dir)?,
        None => gallery::catalog()?,
    };

    let engine = MigrationEngine::builder()
        .schema_store(SchemaStore::new(store))
        .ledger(ledger)
        .catalog(catalog)
        .dry_run(cli.dry_run)
        .out_of_order(cli.out_of_order)
        .build()?;
    Ok(engine)
}

fn print_report(report: &MigrationReport) -> bool {
    if report.dry_run {
        if report.planned.is_empty() {
            println!("Nothing to migrate ({}).", report.direction);
        }
        for step in &report.planned {
            println!("would migrate {} {}", report.direction, step);
        }
        return true;
    }

    if report.planned.is_empty() {
        println!("Nothing to migrate ({}).", report.direction);
    }
    for record in &report.committed {
        println!("{} {}: {}", report.direction, record.step, record.outcome);
    }

    match &report.failure {
        None => true,
        Some(failure) => {
            eprintln!("FAILED {} {}", report.direction, failure.step);
            for error in failure.error.chain() {
                eprintln!("  {}: {}", error.kind(), error.message());
            }
            false
        }
    }
}

fn print_status(engine: &MigrationEngine) -> Result<()> {
    let status = engine.status()?;
    println!("current version: {}", status.current);
    for step in &status.steps {
        let applied = match step.applied_at {
            Some(at) => at.to_rfc3339(),
            None => "pending".to_string(),
        };
        let reversible = if step.reversible { "" } else { " (irreversible)" };
        println!("  {:<12} {:<40} {}{}", step.step.version.value(), step.step.name, applied, reversible);
    }
    for entry in &status.unknown {
        println!(
            "  {:<12} {:<40} {} (not in catalog)",
            entry.version.value(),
            entry.name,
            entry.applied_at.to_rfc3339()
        );
    }
    Ok(())
}
