//! Criteria → store filter compiler.
//!
//! A [`CompiledFilter`] maps each field name to exactly one [`Clause`]. When a
//! request names the same field more than once, the later criterion replaces
//! the earlier one; constraints on one field are never conjoined.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use super::criteria::{CriteriaSet, Criterion, FieldKind, INVENTORY_KEY, UnknownKind};
use super::error::SearchError;

/// Numeric comparison: exact match or inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound<T> {
    Eq(T),
    Range { gte: Option<T>, lte: Option<T> },
}

impl<T: Copy + PartialOrd> Bound<T> {
    pub fn contains(&self, value: T) -> bool {
        match *self {
            Bound::Eq(expected) => value == expected,
            Bound::Range { gte, lte } => {
                gte.is_none_or(|lo| value >= lo) && lte.is_none_or(|hi| value <= hi)
            }
        }
    }

    /// A range with neither side set constrains nothing.
    pub fn is_unbounded(&self) -> bool {
        matches!(self, Bound::Range { gte: None, lte: None })
    }
}

/// Typed comparison clause for a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    String(String),
    Int(Bound<i64>),
    Float(Bound<f64>),
}

impl Clause {
    pub fn kind(&self) -> FieldKind {
        match self {
            Clause::String(_) => FieldKind::String,
            Clause::Int(_) => FieldKind::Int,
            Clause::Float(_) => FieldKind::Float,
        }
    }

    /// Operator-document rendering (`{"$eq": ..}` / `{"$gte": .., "$lte": ..}`).
    pub fn to_json(&self) -> Value {
        fn bound_json<T: Into<Value> + Copy>(bound: &Bound<T>) -> Value {
            let mut ops = serde_json::Map::new();
            match *bound {
                Bound::Eq(v) => {
                    ops.insert("$eq".to_string(), v.into());
                }
                Bound::Range { gte, lte } => {
                    if let Some(lo) = gte {
                        ops.insert("$gte".to_string(), lo.into());
                    }
                    if let Some(hi) = lte {
                        ops.insert("$lte".to_string(), hi.into());
                    }
                }
            }
            Value::Object(ops)
        }

        match self {
            Clause::String(s) => json!({ "$eq": s }),
            Clause::Int(b) => bound_json(b),
            Clause::Float(b) => bound_json(b),
        }
    }
}

/// Field → clause mapping handed to a [`crate::storage::DocumentStore`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    clauses: BTreeMap<String, Clause>,
}

impl CompiledFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the clause for `field`, returning the clause it replaced.
    pub fn insert(&mut self, field: impl Into<String>, clause: Clause) -> Option<Clause> {
        self.clauses.insert(field.into(), clause)
    }

    pub fn get(&self, field: &str) -> Option<&Clause> {
        self.clauses.get(field)
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Clause)> {
        self.clauses.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.clauses
                .iter()
                .map(|(field, clause)| (field.clone(), clause.to_json()))
                .collect(),
        )
    }
}

/// Compile the inventory criteria of `set`. Other collections are ignored;
/// a set without inventory criteria yields an empty (match-all) filter.
pub fn compile(set: &CriteriaSet) -> Result<CompiledFilter, SearchError> {
    match set.get(INVENTORY_KEY) {
        Some(criteria) => compile_criteria(criteria),
        None => Ok(CompiledFilter::new()),
    }
}

/// Compile criteria in order, stopping at the first invalid one.
pub fn compile_criteria(criteria: &[Criterion]) -> Result<CompiledFilter, SearchError> {
    let mut filter = CompiledFilter::new();
    for (index, criterion) in criteria.iter().enumerate() {
        let clause = compile_one(index, criterion)?;
        if let Some(previous) = filter.insert(criterion.field.clone(), clause) {
            tracing::debug!(
                field = %criterion.field,
                replaced = %previous.to_json(),
                "later criterion overrides earlier one on the same field"
            );
        }
    }
    Ok(filter)
}

fn compile_one(index: usize, c: &Criterion) -> Result<Clause, SearchError> {
    if c.kind.is_empty() {
        return Err(SearchError::MissingType { index });
    }
    if c.field.is_empty() {
        return Err(SearchError::MissingField { index });
    }
    if !c.has_value() {
        return Err(SearchError::MissingValue {
            index,
            field: c.field.clone(),
        });
    }

    let kind: FieldKind = c
        .kind
        .parse()
        .map_err(|UnknownKind(kind)| SearchError::UnsupportedType {
            index,
            field: c.field.clone(),
            kind,
        })?;

    let parse_error = |source: Box<dyn std::error::Error + Send + Sync>| SearchError::ValueParse {
        index,
        field: c.field.clone(),
        kind,
        value: c.equal.clone(),
        source,
    };

    let clause = match kind {
        FieldKind::String => Clause::String(c.equal.clone()),
        FieldKind::Float => {
            if c.equal.is_empty() {
                Clause::Float(Bound::Range {
                    gte: c.lower_limit,
                    lte: c.upper_limit,
                })
            } else {
                let v = c
                    .equal
                    .parse::<f64>()
                    .map_err(|e| parse_error(Box::new(e)))?;
                Clause::Float(Bound::Eq(v))
            }
        }
        FieldKind::Int => {
            if c.equal.is_empty() {
                // `as` truncates toward zero and saturates at the i64 range.
                Clause::Int(Bound::Range {
                    gte: c.lower_limit.map(|v| v as i64),
                    lte: c.upper_limit.map(|v| v as i64),
                })
            } else {
                let v = c
                    .equal
                    .parse::<i64>()
                    .map_err(|e| parse_error(Box::new(e)))?;
                Clause::Int(Bound::Eq(v))
            }
        }
    };
    Ok(clause)
}
