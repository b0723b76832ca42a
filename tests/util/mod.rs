use inventory_report::search::{CompiledFilter, Searcher};
use inventory_report::storage::{DocumentStore, MemoryStore, SqliteStore, StoreError};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }

    /// Number of captured lines containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.output().lines().filter(|l| l.contains(needle)).count()
    }
}

struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// The reference inventory document: sku 343434 named "test".
#[allow(dead_code)]
pub fn inventory_fixture() -> Value {
    json!({
        "item_id": "0b6e4c1e-6d1c-4f67-9a43-1f3a2c9d8e01",
        "upc": 222222222,
        "sku": 343434,
        "name": "test",
        "origin": "ON Canada",
        "device_id": "5d0f2a8b-77c4-4b8e-8f0e-4a9b3c2d1e10",
        "total_weight": 2000,
        "price": 100,
        "lot": "A-1",
        "date_arrived": 3000,
        "expiry_date": 4000,
        "timestamp": 3500,
        "rs_customer_id": "9c3e7f21-2b4a-4d5e-8f6a-7b8c9d0e1f23",
        "waste_weight": 10,
        "donate_weight": 15,
        "date_sold": 3600,
        "sale_price": 18,
        "sold_weight": 800,
        "prod_quantity": 50
    })
}

/// A small catalogue with distinct skus, names and prices.
#[allow(dead_code)]
pub fn inventory_catalogue() -> Vec<Value> {
    let mut docs = vec![inventory_fixture()];
    for (sku, name, price, lot) in [
        (1001, "apples", 2.5, "B-1"),
        (1002, "pears", 3.0, "B-2"),
        (1003, "plums", 4.75, "B-2"),
    ] {
        docs.push(json!({
            "sku": sku,
            "name": name,
            "price": price,
            "lot": lot,
            "total_weight": 500,
            "sold_weight": 100
        }));
    }
    docs
}

#[allow(dead_code)]
pub fn memory_searcher(docs: Vec<Value>) -> Searcher {
    Searcher::new(
        Arc::new(MemoryStore::with_documents(docs)),
        Duration::from_secs(2),
    )
}

/// SQLite store in a fresh temp dir; keep the dir alive for the test.
#[allow(dead_code)]
pub fn sqlite_store(docs: &[Value]) -> (TempDir, PathBuf, SqliteStore) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("report.db");
    let store = open_sqlite(&path);
    store.insert_many(docs.iter()).expect("seed documents");
    (dir, path, store)
}

#[allow(dead_code)]
pub fn open_sqlite(path: &Path) -> SqliteStore {
    SqliteStore::open(path, "agg_inventory", Duration::from_secs(5)).expect("open sqlite store")
}

/// Store whose every call fails with a database-level error.
#[allow(dead_code)]
pub struct FailingStore;

impl DocumentStore for FailingStore {
    fn backend(&self) -> &'static str {
        "failing"
    }

    fn find(&self, _filter: &CompiledFilter) -> Result<Vec<Value>, StoreError> {
        Err(StoreError::Other("connection reset by peer".to_string()))
    }
}

/// Store that answers only after `delay`.
#[allow(dead_code)]
pub struct SlowStore {
    pub delay: Duration,
    pub inner: MemoryStore,
}

impl DocumentStore for SlowStore {
    fn backend(&self) -> &'static str {
        "slow"
    }

    fn find(&self, filter: &CompiledFilter) -> Result<Vec<Value>, StoreError> {
        std::thread::sleep(self.delay);
        self.inner.find(filter)
    }
}
