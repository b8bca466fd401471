//! Serde helpers for floats that may be NaN.
//!
//! serde_json writes non-finite floats as `null`; these fields read `null`
//! back as NaN so exported bundles load again.

use serde::{Deserialize, Deserializer};

pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}
