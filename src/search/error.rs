//! Search error taxonomy.

use thiserror::Error;

use crate::search::criteria::FieldKind;
use crate::storage::StoreError;

/// Errors returned by filter compilation and search execution.
///
/// The first five variants are raised while compiling criteria and name the
/// offending criterion by its position in the request.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("criterion {index}: type is required")]
    MissingType { index: usize },

    #[error("criterion {index}: field is required")]
    MissingField { index: usize },

    #[error("criterion {index} ({field}): no equal value and no lower/upper limit set")]
    MissingValue { index: usize, field: String },

    #[error("criterion {index} ({field}): cannot parse {value:?} as {kind}")]
    ValueParse {
        index: usize,
        field: String,
        kind: FieldKind,
        value: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("criterion {index} ({field}): unsupported type {kind:?}")]
    UnsupportedType {
        index: usize,
        field: String,
        kind: String,
    },

    #[error("error while fetching results from inventory")]
    Store(#[from] StoreError),

    #[error("no results found")]
    NoResults,
}

impl SearchError {
    /// True for errors caused by the request shape rather than the store.
    pub fn is_invalid_request(&self) -> bool {
        !matches!(self, SearchError::Store(_) | SearchError::NoResults)
    }
}
