//! In-process document store.

use parking_lot::RwLock;
use serde_json::Value;

use super::{DocumentStore, StoreError, document_matches};
use crate::search::filter::CompiledFilter;

/// Documents kept in insertion order behind a read-write lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<Vec<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(docs: impl IntoIterator<Item = Value>) -> Self {
        Self {
            docs: RwLock::new(docs.into_iter().collect()),
        }
    }

    pub fn insert(&self, doc: Value) {
        self.docs.write().push(doc);
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}

impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn find(&self, filter: &CompiledFilter) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .docs
            .read()
            .iter()
            .filter(|doc| document_matches(doc, filter))
            .cloned()
            .collect())
    }
}
