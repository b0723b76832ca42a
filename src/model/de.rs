//! Lenient field deserializers for loosely typed JSON documents.
//!
//! Explicit `null` decodes as the zero value, and integer fields accept
//! floats with no fractional part (`343434.0`).

use serde::de::{Deserialize, Deserializer, Error};

/// `null` becomes `T::default()`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum WireInt {
    Int(i64),
    Float(f64),
}

/// Integer field that also takes integral floats; `null` becomes 0.
pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<WireInt>::deserialize(deserializer)? {
        None => Ok(0),
        Some(WireInt::Int(v)) => Ok(v),
        // i64::MAX as f64 rounds up to 2^63, which is already out of range.
        Some(WireInt::Float(f))
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 =>
        {
            Ok(f as i64)
        }
        Some(WireInt::Float(f)) => Err(D::Error::custom(format!(
            "expected an integer, found {f}"
        ))),
    }
}
