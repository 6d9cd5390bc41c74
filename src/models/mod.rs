// src/models/mod.rs

pub mod access;
pub mod attempt;
pub mod display;
pub mod quiz;

use serde::{Deserialize, Deserializer};

/// Accepts `0`/`1` as well as `true`/`false`; the remote site uses both.
pub(crate) fn int_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrBool {
        Bool(bool),
        Int(i64),
    }

    Ok(match IntOrBool::deserialize(deserializer)? {
        IntOrBool::Bool(b) => b,
        IntOrBool::Int(i) => i != 0,
    })
}
