//! Typed records read from the document store.

pub(crate) mod de;
pub mod types;

pub use types::{Inventory, InventorySummary};
