use serde::{Deserialize, Deserializer};

/// A field models emit either as one string or as a list of strings.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StringOrVec {
    #[default]
    None,
    Single(String),
    Multiple(Vec<String>),
}

impl StringOrVec {
    /// Trimmed, non-empty values.
    pub fn into_vec(self) -> Vec<String> {
        let values = match self {
            Self::None => Vec::new(),
            Self::Single(value) => vec![value],
            Self::Multiple(values) => values,
        };
        values
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Number(f64),
    Text(String),
    Null,
}

/// Accepts `0.8`, `"0.8"` or `null`; unparseable text becomes `None`.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawNumber::deserialize(deserializer)? {
        RawNumber::Number(value) => Some(value),
        RawNumber::Text(text) => text.trim().parse::<f64>().ok(),
        RawNumber::Null => None,
    }
    .filter(|value| value.is_finite()))
}
