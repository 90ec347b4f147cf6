use parking_lot::Mutex;
use std::backtrace::Backtrace;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{env, fs, thread};
use strata::errors::{ErrorKind, StrataError, StrataResult};
use strata::gallery;
use strata::ledger::{JsonFileLedger, Ledger};
use strata::migration::{MigrationEngine, MigrationEngineBuilder, MigrationStep};
use strata::schema::CollectionDefinition;
use strata::store::{JsonFileSchemaStore, SchemaChange, SchemaStore, SchemaStoreProvider};

/// Runs a test with retry logic and error handling.
///
/// `after` runs whether the test passed or failed; a failed attempt is retried
/// with a fresh context from `before`.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> StrataResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> StrataResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> StrataResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            let ctx = before().map_err(|e| (format!("Before run failed: {:?}", e), backtrace.to_string()))?;
            let test_result =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| test(ctx.clone())));
            let after_result = after(ctx.clone());
            match test_result {
                Ok(Ok(_)) => after_result
                    .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                Ok(Err(e)) => Err((format!("Test failed: {:?}", e), backtrace.to_string())),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        });

        let elapsed = start_time.elapsed();
        let error = match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                if !bt.is_empty() && !bt.contains("disabled") {
                    format!("{}\nBacktrace:\n{}", e, bt)
                } else {
                    e
                }
            }
            Err(panic_err) => {
                let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    format!("Unknown panic: {:?}", panic_err.type_id())
                };
                format!("Panic: {}", err_msg)
            }
        };

        if attempt < MAX_RETRIES {
            eprintln!(
                "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                attempt, MAX_RETRIES, elapsed
            );
            eprintln!("{}", error);
            eprintln!("Retrying in {}ms...\n", 100 * attempt);
            thread::sleep(Duration::from_millis(100 * attempt as u64));
        }
        last_error = Some(error);
    }

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

/// A schema store and ledger living in their own temporary directory.
#[derive(Clone)]
pub struct TestContext {
    path: PathBuf,
    store: SchemaStore,
    ledger: Ledger,
}

impl TestContext {
    pub fn new(path: PathBuf, store: SchemaStore, ledger: Ledger) -> Self {
        Self {
            path,
            store,
            ledger,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema_path(&self) -> PathBuf {
        self.path.join("pb_schema.json")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.path.join(ledger_name())
    }

    pub fn store(&self) -> SchemaStore {
        self.store.clone()
    }

    pub fn ledger(&self) -> Ledger {
        self.ledger.clone()
    }

    /// An engine builder already wired to this context's store and ledger.
    pub fn engine_builder(&self) -> MigrationEngineBuilder {
        MigrationEngine::builder()
            .schema_store(self.store())
            .ledger(self.ledger())
    }

    pub fn engine(&self, steps: Vec<MigrationStep>) -> StrataResult<MigrationEngine> {
        self.engine_builder().add_steps(steps).build()
    }

    /// Opens the store and ledger files again, as a new process would.
    ///
    /// Every other clone of this context, and every engine built from it, must
    /// be dropped first: a fjall keyspace cannot be opened twice.
    pub fn reopen(self) -> StrataResult<TestContext> {
        let TestContext { path, store, ledger } = self;
        drop(store);
        drop(ledger);
        open_context(path, Vec::new())
    }
}

pub fn random_path() -> PathBuf {
    let id = uuid::Uuid::new_v4();
    env::temp_dir().join(format!("strata-{}", id))
}

#[cfg(feature = "fjall")]
fn ledger_name() -> &'static str {
    "ledger"
}

#[cfg(not(feature = "fjall"))]
fn ledger_name() -> &'static str {
    "pb_ledger.json"
}

#[cfg(feature = "fjall")]
fn open_ledger(path: &Path) -> StrataResult<Ledger> {
    use strata_fjall_adapter::FjallLedger;

    let path = path.to_str().ok_or_else(|| {
        StrataError::new("Test path is not valid UTF-8", ErrorKind::InternalError)
    })?;
    Ok(Ledger::new(FjallLedger::with_config().db_path(path).build()?))
}

#[cfg(not(feature = "fjall"))]
fn open_ledger(path: &Path) -> StrataResult<Ledger> {
    Ok(Ledger::new(JsonFileLedger::open(path)?))
}

fn open_context(path: PathBuf, seed: Vec<CollectionDefinition>) -> StrataResult<TestContext> {
    let store = JsonFileSchemaStore::open_or_seed(path.join("pb_schema.json"), seed)?;
    let ledger = open_ledger(&path.join(ledger_name()))?;
    Ok(TestContext::new(path, SchemaStore::new(store), ledger))
}

/// A context whose schema is seeded with `collections`.
pub fn create_test_context_with(collections: Vec<CollectionDefinition>) -> StrataResult<TestContext> {
    const MAX_ATTEMPTS: u32 = 3;
    let mut last_error: Option<StrataError> = None;

    for attempt in 1..=MAX_ATTEMPTS {
        let path = random_path();
        if path.exists() {
            let _ = fs::remove_dir_all(&path);
        }
        fs::create_dir_all(&path)?;

        match open_context(path.clone(), collections.clone()) {
            Ok(ctx) => return Ok(ctx),
            Err(e) => {
                let _ = fs::remove_dir_all(&path);
                if attempt < MAX_ATTEMPTS {
                    eprintln!(
                        "Warning: Failed to create test context (attempt {}/{}): {:?}",
                        attempt, MAX_ATTEMPTS, e
                    );
                    thread::sleep(Duration::from_millis(50 * attempt as u64));
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        StrataError::new("Failed to create test context", ErrorKind::InternalError)
    }))
}

/// A context seeded with the gallery baseline schema.
pub fn create_test_context() -> StrataResult<TestContext> {
    create_test_context_with(gallery::baseline_schema())
}

/// A context with a JSON ledger regardless of enabled features.
pub fn create_json_test_context() -> StrataResult<TestContext> {
    let path = random_path();
    fs::create_dir_all(&path)?;
    let store = JsonFileSchemaStore::open_or_seed(path.join("pb_schema.json"), gallery::baseline_schema())?;
    let ledger = JsonFileLedger::open(path.join("pb_ledger.json"))?;
    Ok(TestContext::new(path, SchemaStore::new(store), Ledger::new(ledger)))
}

pub fn cleanup(ctx: TestContext) -> StrataResult<()> {
    let path = ctx.path().to_path_buf();
    drop(ctx);

    const MAX_ATTEMPTS: u32 = 5;
    for attempt in 1..=MAX_ATTEMPTS {
        if !path.exists() {
            return Ok(());
        }
        match fs::remove_dir_all(&path) {
            Ok(_) => return Ok(()),
            Err(e) if attempt == MAX_ATTEMPTS => return Err(e.into()),
            Err(_) => thread::sleep(Duration::from_millis(20 * attempt as u64)),
        }
    }
    Ok(())
}

/// Wraps a store and saves a competing revision of `collection_id` right before
/// the next batch lands, the way a concurrent admin edit would.
pub struct ConcurrentWriterStore {
    inner: SchemaStore,
    collection_id: String,
    armed: Mutex<bool>,
    interference: Arc<Mutex<usize>>,
}

impl ConcurrentWriterStore {
    pub fn new(inner: SchemaStore, collection_id: &str) -> Self {
        ConcurrentWriterStore {
            inner,
            collection_id: collection_id.to_string(),
            armed: Mutex::new(true),
            interference: Arc::new(Mutex::new(0)),
        }
    }

    /// How many competing writes were made.
    pub fn interference(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.interference)
    }

    fn interfere(&self) -> StrataResult<()> {
        let mut armed = self.armed.lock();
        if *armed {
            *armed = false;
            let current = self.inner.find_collection(&self.collection_id)?;
            self.inner.save(&current)?;
            *self.interference.lock() += 1;
        }
        Ok(())
    }
}

impl SchemaStoreProvider for ConcurrentWriterStore {
    fn find_collection(&self, id_or_name: &str) -> StrataResult<CollectionDefinition> {
        self.inner.find_collection(id_or_name)
    }

    fn save(&self, collection: &CollectionDefinition) -> StrataResult<CollectionDefinition> {
        self.interfere()?;
        self.inner.save(collection)
    }

    fn delete(&self, id: &str) -> StrataResult<()> {
        self.inner.delete(id)
    }

    fn collections(&self) -> StrataResult<Vec<CollectionDefinition>> {
        self.inner.collections()
    }

    fn apply_batch(&self, changes: &[SchemaChange]) -> StrataResult<()> {
        self.interfere()?;
        self.inner.apply_batch(changes)
    }
}
