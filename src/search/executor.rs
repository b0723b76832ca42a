//! Runs compiled filters against a document store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use super::criteria::CriteriaSet;
use super::error::SearchError;
use super::filter::{CompiledFilter, compile};
use crate::model::Inventory;
use crate::storage::{DocumentStore, StoreError};

/// Inventory search over a shared store.
///
/// Cheap to clone; every call builds and owns its own filter and result set.
#[derive(Clone)]
pub struct Searcher {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl Searcher {
    /// `timeout` bounds each store call; zero disables the bound.
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Compile the inventory criteria of `set` and execute them.
    pub async fn search(&self, set: &CriteriaSet) -> Result<Vec<Inventory>, SearchError> {
        let filter = compile(set)?;
        self.execute(filter).await
    }

    /// Query the store and materialize every match.
    ///
    /// Zero matches is [`SearchError::NoResults`], never an empty success.
    pub async fn execute(&self, filter: CompiledFilter) -> Result<Vec<Inventory>, SearchError> {
        let start = Instant::now();
        debug!(
            backend = self.backend(),
            filter = %filter.to_json(),
            "executing inventory search"
        );

        let docs = self.find(filter).await?;
        if docs.is_empty() {
            return Err(SearchError::NoResults);
        }

        let records = docs
            .into_iter()
            .enumerate()
            .map(|(index, doc)| {
                serde_json::from_value::<Inventory>(doc)
                    .map_err(|source| StoreError::Decode { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            hits = records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "inventory search complete"
        );
        Ok(records)
    }

    /// The store is synchronous; run it on the blocking pool so a slow
    /// backend cannot stall the runtime, and give up after `timeout`.
    async fn find(&self, filter: CompiledFilter) -> Result<Vec<serde_json::Value>, StoreError> {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || store.find(&filter));

        let joined = if self.timeout.is_zero() {
            task.await
        } else {
            match tokio::time::timeout(self.timeout, task).await {
                Ok(joined) => joined,
                // The blocking call keeps running to completion; its result is dropped.
                Err(_) => return Err(StoreError::Timeout(self.timeout.as_millis() as u64)),
            }
        };

        joined.map_err(|e| StoreError::Worker(e.to_string()))?
    }
}
