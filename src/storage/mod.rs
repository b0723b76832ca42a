//! Document store boundary.
//!
//! The search executor only sees [`DocumentStore`]: hand it a
//! [`CompiledFilter`], get back raw JSON documents. Both shipped stores apply
//! the clause semantics in [`document_matches`]; SQLite does it in SQL.

pub mod memory;
pub mod sqlite;

use serde_json::Value;
use thiserror::Error;

use crate::search::filter::{Bound, Clause, CompiledFilter};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Errors raised by a document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored document {id} is not valid JSON: {source}")]
    Corrupt {
        id: i64,
        source: serde_json::Error,
    },

    #[error("Document {index} does not match the record schema: {source}")]
    Decode {
        index: usize,
        source: serde_json::Error,
    },

    #[error("Store call timed out after {0} ms")]
    Timeout(u64),

    #[error("Store worker failed: {0}")]
    Worker(String),

    #[error("{0}")]
    Other(String),
}

/// A collection of JSON documents that can be queried with a compiled filter.
///
/// Implementations are shared across concurrent searches and own whatever
/// synchronization they need.
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Every document satisfying all clauses of `filter`, in store order.
    fn find(&self, filter: &CompiledFilter) -> Result<Vec<Value>, StoreError>;
}

/// Resolve a dotted path (`a.b.c`) inside a JSON document.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |v, seg| v.get(seg))
}

/// Whether a single field value satisfies `clause`.
///
/// Strings match strings only; numeric clauses match numbers only, comparing
/// integers and floats by value. An unbounded range matches anything,
/// including a missing field.
pub fn clause_matches(value: Option<&Value>, clause: &Clause) -> bool {
    match clause {
        Clause::String(expected) => value.and_then(Value::as_str) == Some(expected.as_str()),
        Clause::Int(bound) => {
            if bound.is_unbounded() {
                return true;
            }
            let Some(value) = value.filter(|v| v.is_number()) else {
                return false;
            };
            match value.as_i64() {
                Some(i) => bound.contains(i),
                None => value
                    .as_f64()
                    .is_some_and(|f| int_bound_as_float(bound).contains(f)),
            }
        }
        Clause::Float(bound) => {
            if bound.is_unbounded() {
                return true;
            }
            value.and_then(Value::as_f64).is_some_and(|f| bound.contains(f))
        }
    }
}

fn int_bound_as_float(bound: &Bound<i64>) -> Bound<f64> {
    match *bound {
        Bound::Eq(v) => Bound::Eq(v as f64),
        Bound::Range { gte, lte } => Bound::Range {
            gte: gte.map(|v| v as f64),
            lte: lte.map(|v| v as f64),
        },
    }
}

/// Whether `doc` satisfies every clause of `filter`.
pub fn document_matches(doc: &Value, filter: &CompiledFilter) -> bool {
    filter
        .iter()
        .all(|(field, clause)| clause_matches(lookup(doc, field), clause))
}
