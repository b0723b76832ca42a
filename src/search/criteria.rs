//! Wire-level search criteria.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::de::null_as_default;

/// Collection key the request handler searches.
pub const INVENTORY_KEY: &str = "inventory";

/// Criteria grouped by target collection name.
pub type CriteriaSet = HashMap<String, Vec<Criterion>>;

/// One typed search condition against a named field.
///
/// Every member is optional on the wire and `null` reads as unset;
/// [`crate::search::filter::compile`] decides whether the combination is usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub field: String,
    #[serde(
        default,
        rename = "type",
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub kind: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub equal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_limit: Option<f64>,
}

impl Criterion {
    /// Equality criterion, e.g. `Criterion::equal("sku", FieldKind::Int, "343434")`.
    pub fn equal(field: impl Into<String>, kind: FieldKind, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: kind.to_string(),
            equal: value.into(),
            ..Self::default()
        }
    }

    /// Inclusive range criterion; `None` leaves that side open.
    pub fn range(
        field: impl Into<String>,
        kind: FieldKind,
        lower: Option<f64>,
        upper: Option<f64>,
    ) -> Self {
        Self {
            field: field.into(),
            kind: kind.to_string(),
            lower_limit: lower,
            upper_limit: upper,
            ..Self::default()
        }
    }

    pub(crate) fn has_value(&self) -> bool {
        !self.equal.is_empty() || self.lower_limit.is_some() || self.upper_limit.is_some()
    }
}

/// Comparison semantics selected by a criterion's `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Float,
    Int,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Float => "float",
            FieldKind::Int => "int",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized `type` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl FromStr for FieldKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(FieldKind::String),
            "float" => Ok(FieldKind::Float),
            "int" => Ok(FieldKind::Int),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Decode a JSON payload into a [`CriteriaSet`].
///
/// A `null` criteria list is empty and a `null` entry is a criterion with
/// every member unset.
pub fn decode_criteria(payload: &[u8]) -> Result<CriteriaSet, serde_json::Error> {
    let wire: HashMap<String, Option<Vec<Option<Criterion>>>> = serde_json::from_slice(payload)?;
    Ok(wire
        .into_iter()
        .map(|(collection, list)| {
            let list = list
                .unwrap_or_default()
                .into_iter()
                .map(Option::unwrap_or_default)
                .collect();
            (collection, list)
        })
        .collect())
}
