#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum MatcherError {
    #[error("HTTP client initialization failed: {0}")]
    HttpClientInit(reqwest::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {api}: {message}")]
    Api { api: String, message: String },

    #[error("API error from {api}: HTTP {status}: {excerpt}")]
    ApiStatus {
        api: String,
        status: u16,
        excerpt: String,
    },

    #[error("API JSON error from {api}: {source}")]
    ApiJson {
        api: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "API key required: {api} requires {env_var} environment variable.\n\nTo set:\n  export {env_var}=your-key"
    )]
    ApiKeyRequired { api: String, env_var: String },

    #[error("{api} did not answer within {after_ms}ms")]
    Timeout { api: String, after_ms: u64 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Source unavailable: {source_name} is not available. {reason}\n\nTry: {suggestion}")]
    SourceUnavailable {
        source_name: String,
        reason: String,
        suggestion: String,
    },

    #[error("Lexical index has not been built")]
    IndexNotBuilt,

    #[error("Dataset error in {path}: {message}")]
    Dataset { path: String, message: String },

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MatcherError {
    /// Whether a retry of the same call has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect(),
            Self::ApiStatus { status, .. } => *status == 429 || *status >= 500,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Stable code reported in the `error` object of a match response.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_REQUEST",
            Self::SourceUnavailable { .. } | Self::Dataset { .. } => "SOURCE_UNAVAILABLE",
            Self::IndexNotBuilt => "INDEX_NOT_BUILT",
            Self::Http(_)
            | Self::Api { .. }
            | Self::ApiStatus { .. }
            | Self::ApiJson { .. }
            | Self::ApiKeyRequired { .. }
            | Self::Timeout { .. } => "UPSTREAM_ERROR",
            Self::HttpClientInit(_) | Self::Template(_) | Self::Json(_) | Self::Io(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MatcherError;

    #[test]
    fn api_key_required_display_includes_env_var() {
        let err = MatcherError::ApiKeyRequired {
            api: "openai".to_string(),
            env_var: "OPENAI_API_KEY".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("OPENAI_API_KEY"));
        assert!(msg.contains("export"));
    }

    #[test]
    fn source_unavailable_display_includes_reason() {
        let err = MatcherError::SourceUnavailable {
            source_name: "genemap2".to_string(),
            reason: "datasets/OMIM/genemap2.txt does not exist".to_string(),
            suggestion: "set DISEASE_MATCHER_GENEMAP_PATH".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("Source unavailable: genemap2"));
        assert!(msg.contains("does not exist"));
        assert!(msg.contains("DISEASE_MATCHER_GENEMAP_PATH"));
    }

    #[test]
    fn api_status_display_includes_status_and_excerpt() {
        let err = MatcherError::ApiStatus {
            api: "openai".to_string(),
            status: 503,
            excerpt: "overloaded".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("HTTP 503"));
        assert!(msg.contains("overloaded"));
    }

    #[test]
    fn transient_errors_cover_server_side_statuses_only() {
        let overloaded = MatcherError::ApiStatus {
            api: "openai".into(),
            status: 503,
            excerpt: String::new(),
        };
        let throttled = MatcherError::ApiStatus {
            api: "openai".into(),
            status: 429,
            excerpt: String::new(),
        };
        let rejected = MatcherError::ApiStatus {
            api: "openai".into(),
            status: 401,
            excerpt: String::new(),
        };
        let missing_key = MatcherError::ApiKeyRequired {
            api: "openai".into(),
            env_var: "OPENAI_API_KEY".into(),
        };

        assert!(overloaded.is_transient());
        assert!(throttled.is_transient());
        assert!(!rejected.is_transient());
        assert!(!missing_key.is_transient());
        assert!(
            MatcherError::Timeout {
                api: "openai".into(),
                after_ms: 10
            }
            .is_transient()
        );
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(MatcherError::IndexNotBuilt.code(), "INDEX_NOT_BUILT");
        assert_eq!(
            MatcherError::InvalidArgument("top_k".into()).code(),
            "INVALID_REQUEST"
        );
        assert_eq!(
            MatcherError::Api {
                api: "openai".into(),
                message: "empty".into()
            }
            .code(),
            "UPSTREAM_ERROR"
        );
    }
}
