//! LLM-backed pipeline stages: query translation and candidate reranking.

use std::sync::OnceLock;

use minijinja::Environment;

use crate::error::MatcherError;

pub(crate) mod rerank;
pub(crate) mod translate;

static PROMPTS: OnceLock<Environment<'static>> = OnceLock::new();

fn prompt_env() -> Result<&'static Environment<'static>, MatcherError> {
    if let Some(env) = PROMPTS.get() {
        return Ok(env);
    }

    let mut env = Environment::new();
    env.add_template(
        "rerank_user.j2",
        include_str!("../../templates/prompts/rerank_user.j2"),
    )?;

    let _ = PROMPTS.set(env);
    PROMPTS.get().ok_or_else(|| MatcherError::Api {
        api: "prompts".into(),
        message: "Prompt environment failed to initialize".into(),
    })
}
