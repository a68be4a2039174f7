use serde::Serialize;
use serde_json::Value;

use crate::entities::conflict::Conflict;
use crate::entities::variant::VariantAnnotation;

pub const NO_DIAGNOSIS_NAME: &str = "Диагноз не установлен";
pub const MAX_RESULT_GENES: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub rank: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub omim_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mondo_id: Option<String>,
    pub name: String,
    pub score: f64,
    pub genes: Vec<String>,
    pub requires_clarification: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMetadata {
    pub processing_time_ms: u64,
    pub architecture: String,
    pub model: String,
    pub total_results: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtendedInfo {
    pub methods_used: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_annotation: Option<VariantAnnotation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_reasoning: Option<String>,
    pub conflicts: Vec<Conflict>,
    pub search_details: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// Unified response: either results (possibly empty) or an error, never both.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResponse {
    pub results: Vec<MatchResult>,
    pub metadata: ResponseMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl MatchResponse {
    pub fn error(metadata: ResponseMetadata, code: &str, message: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            metadata: ResponseMetadata {
                total_results: 0,
                ..metadata
            },
            extended: None,
            error: Some(ErrorInfo {
                code: code.to_string(),
                message: message.into(),
            }),
        }
    }

    pub fn top(&self) -> Option<&MatchResult> {
        self.results.first()
    }
}
