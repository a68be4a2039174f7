use serde::Serialize;

use crate::error::MatcherError;

pub fn to_pretty<T: Serialize>(value: &T) -> Result<String, MatcherError> {
    Ok(serde_json::to_string_pretty(value)?)
}
