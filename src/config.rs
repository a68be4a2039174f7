//! Runtime settings read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::MatcherError;
use crate::sources::env_base;
use crate::sources::retry::RetryPolicy;

const DATASETS_DIR_ENV: &str = "DISEASE_MATCHER_DATASETS_DIR";
const GENEMAP_PATH_ENV: &str = "DISEASE_MATCHER_GENEMAP_PATH";
const GENE_COORDS_ENV: &str = "DISEASE_MATCHER_GENE_COORDS";
const ARCHITECTURE_ENV: &str = "DISEASE_MATCHER_ARCHITECTURE";

pub(crate) const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
const OPENAI_MODEL_ENV: &str = "OPENAI_MODEL";

const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4-turbo-preview";
const DEFAULT_ARCHITECTURE: &str = "hybrid_bm25_llm";

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl LlmSettings {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LexicalSettings {
    pub k1: f64,
    pub b: f64,
    pub gene_boost: f64,
    /// Raw BM25 scores are divided by this and clamped to 1.0.
    pub score_divisor: f64,
    /// Results requested from the lexical index per request.
    pub pool_size: usize,
}

impl Default for LexicalSettings {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            gene_boost: 1.5,
            score_divisor: 50.0,
            pool_size: 20,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RankingSettings {
    pub gene_weight: f64,
    pub lexical_weight: f64,
    pub conflict_penalty: f64,
    /// Merged candidates handed to the reranking judge.
    pub rerank_pool: usize,
    pub max_search_queries: usize,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            gene_weight: 0.6,
            lexical_weight: 0.4,
            conflict_penalty: 0.3,
            rerank_pool: 20,
            max_search_queries: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub datasets_dir: PathBuf,
    pub genemap_path: PathBuf,
    pub gene_coords_path: Option<PathBuf>,
    pub architecture: String,
    pub llm: LlmSettings,
    pub lexical: LexicalSettings,
    pub ranking: RankingSettings,
}

fn env_opt(env_var: &str) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T>(env_var: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    let Some(raw) = env_opt(env_var) else {
        return default;
    };
    match raw.parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var, value = %raw, "Ignoring unparseable setting; using default");
            default
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let datasets_dir = PathBuf::from(env_base("datasets", DATASETS_DIR_ENV).as_ref());
        let genemap_path = env_opt(GENEMAP_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| datasets_dir.join("OMIM").join("genemap2.txt"));

        let lexical_default = LexicalSettings::default();
        let ranking_default = RankingSettings::default();
        let retry_default = RetryPolicy::default();

        let retry_delay_secs = env_parse(
            "DISEASE_MATCHER_LLM_RETRY_DELAY_SECS",
            retry_default.base_delay.as_secs_f64(),
        );

        Self {
            genemap_path,
            gene_coords_path: env_opt(GENE_COORDS_ENV).map(PathBuf::from),
            architecture: env_base(DEFAULT_ARCHITECTURE, ARCHITECTURE_ENV).into_owned(),
            llm: LlmSettings {
                api_key: env_opt(OPENAI_API_KEY_ENV),
                base_url: env_base(DEFAULT_OPENAI_BASE, OPENAI_BASE_URL_ENV).into_owned(),
                model: env_base(DEFAULT_OPENAI_MODEL, OPENAI_MODEL_ENV).into_owned(),
                temperature: env_parse("OPENAI_TEMPERATURE", 0.3),
                max_tokens: env_parse("OPENAI_MAX_TOKENS", 2000),
                timeout: Duration::from_secs(env_parse("DISEASE_MATCHER_LLM_TIMEOUT_SECS", 30)),
                retry: RetryPolicy {
                    max_attempts: env_parse(
                        "DISEASE_MATCHER_LLM_RETRY_ATTEMPTS",
                        retry_default.max_attempts,
                    ),
                    base_delay: Duration::from_secs_f64(retry_delay_secs.max(0.0)),
                    ..retry_default
                },
            },
            lexical: LexicalSettings {
                k1: env_parse("DISEASE_MATCHER_BM25_K1", lexical_default.k1),
                b: env_parse("DISEASE_MATCHER_BM25_B", lexical_default.b),
                gene_boost: env_parse("DISEASE_MATCHER_BM25_GENE_BOOST", lexical_default.gene_boost),
                score_divisor: env_parse(
                    "DISEASE_MATCHER_BM25_SCORE_DIVISOR",
                    lexical_default.score_divisor,
                ),
                pool_size: lexical_default.pool_size,
            },
            ranking: RankingSettings {
                gene_weight: env_parse("DISEASE_MATCHER_GENE_WEIGHT", ranking_default.gene_weight),
                lexical_weight: env_parse(
                    "DISEASE_MATCHER_BM25_WEIGHT",
                    ranking_default.lexical_weight,
                ),
                conflict_penalty: env_parse(
                    "DISEASE_MATCHER_CONFLICT_PENALTY",
                    ranking_default.conflict_penalty,
                ),
                max_search_queries: env_parse(
                    "DISEASE_MATCHER_MAX_SEARCH_QUERIES",
                    ranking_default.max_search_queries,
                ),
                rerank_pool: ranking_default.rerank_pool,
            },
            datasets_dir,
        }
    }

    /// Rejects parameter combinations that would make scores meaningless.
    pub fn validate(&self) -> Result<(), MatcherError> {
        let lexical = &self.lexical;
        let ranking = &self.ranking;
        if lexical.k1.is_nan() || lexical.k1 < 0.0 {
            return Err(MatcherError::InvalidArgument(format!(
                "BM25 k1 must be non-negative, got {}",
                lexical.k1
            )));
        }
        if !(0.0..=1.0).contains(&lexical.b) {
            return Err(MatcherError::InvalidArgument(format!(
                "BM25 b must be within [0, 1], got {}",
                lexical.b
            )));
        }
        if lexical.score_divisor.is_nan() || lexical.score_divisor <= 0.0 {
            return Err(MatcherError::InvalidArgument(format!(
                "BM25 score divisor must be positive, got {}",
                lexical.score_divisor
            )));
        }
        if lexical.gene_boost.is_nan() || lexical.gene_boost < 1.0 {
            return Err(MatcherError::InvalidArgument(format!(
                "gene boost factor must be at least 1.0, got {}",
                lexical.gene_boost
            )));
        }
        if [ranking.gene_weight, ranking.lexical_weight]
            .iter()
            .any(|w| w.is_nan() || *w < 0.0)
        {
            return Err(MatcherError::InvalidArgument(
                "merge weights must be non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&ranking.conflict_penalty) {
            return Err(MatcherError::InvalidArgument(format!(
                "conflict penalty must be within [0, 1], got {}",
                ranking.conflict_penalty
            )));
        }
        if ranking.max_search_queries == 0 {
            return Err(MatcherError::InvalidArgument(
                "at least one search query must be allowed".into(),
            ));
        }
        if self.llm.retry.max_attempts == 0 {
            return Err(MatcherError::InvalidArgument(
                "LLM retry attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn mim_titles_path(&self) -> PathBuf {
        self.datasets_dir.join("OMIM").join("mimTitles.txt")
    }

    pub fn mondo_json_path(&self) -> PathBuf {
        self.datasets_dir.join("mondo").join("mondo.json")
    }

    pub fn mondo_obo_path(&self) -> PathBuf {
        self.datasets_dir.join("mondo").join("mondo.obo")
    }
}

impl Default for Settings {
    fn default() -> Self {
        let datasets_dir = PathBuf::from("datasets");
        Self {
            genemap_path: datasets_dir.join("OMIM").join("genemap2.txt"),
            gene_coords_path: None,
            architecture: DEFAULT_ARCHITECTURE.to_string(),
            llm: LlmSettings {
                api_key: None,
                base_url: DEFAULT_OPENAI_BASE.to_string(),
                model: DEFAULT_OPENAI_MODEL.to_string(),
                temperature: 0.3,
                max_tokens: 2000,
                timeout: Duration::from_secs(30),
                retry: RetryPolicy::default(),
            },
            lexical: LexicalSettings::default(),
            ranking: RankingSettings::default(),
            datasets_dir,
        }
    }
}
