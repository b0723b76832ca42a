//! Search layer facade.
//!
//! - **[`criteria`]**: wire-level criteria and the `inventory` collection key.
//! - **[`filter`]**: validation and compilation of criteria into a [`CompiledFilter`].
//! - **[`executor`]**: runs a compiled filter against a [`crate::storage::DocumentStore`].
//! - **[`error`]**: the error taxonomy shared by compilation and execution.

pub mod criteria;
pub mod error;
pub mod executor;
pub mod filter;

pub use criteria::{CriteriaSet, Criterion, FieldKind, INVENTORY_KEY, decode_criteria};
pub use error::SearchError;
pub use executor::Searcher;
pub use filter::{Bound, Clause, CompiledFilter, compile};
