use serde::{Deserialize, Serialize};

use crate::error::MatcherError;

pub const MAX_TOP_K: usize = 50;
const DEFAULT_TOP_K: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Ru,
    En,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::En => "en",
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

/// One diagnosis to match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchQuery {
    pub text: String,
    #[serde(default)]
    pub gene: Option<String>,
    #[serde(default)]
    pub variant_coordinates: Option<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub full_context: Option<String>,
}

impl MatchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            gene: None,
            variant_coordinates: None,
            language: Language::default(),
            top_k: DEFAULT_TOP_K,
            full_context: None,
        }
    }

    pub fn validate(&self) -> Result<(), MatcherError> {
        if !(1..=MAX_TOP_K).contains(&self.top_k) {
            return Err(MatcherError::InvalidArgument(format!(
                "top_k must be between 1 and {MAX_TOP_K}, got {}",
                self.top_k
            )));
        }
        Ok(())
    }

    /// Blank text or a lone `-` means the record carries no diagnosis.
    pub fn has_diagnosis(&self) -> bool {
        let text = self.text.trim();
        !text.is_empty() && text != "-"
    }

    pub fn gene(&self) -> Option<&str> {
        self.gene.as_deref().map(str::trim).filter(|g| !g.is_empty())
    }

    pub fn variant_coordinates(&self) -> Option<&str> {
        self.variant_coordinates
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn full_context(&self) -> Option<&str> {
        self.full_context
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}
