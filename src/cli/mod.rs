//! Command-line surface and service bootstrap.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::Settings;
use crate::entities::request::{Language, MatchQuery};
use crate::entities::variant::VariantAnnotator;
use crate::error::MatcherError;
use crate::llm::rerank::RerankingJudge;
use crate::llm::translate::QueryTranslator;
use crate::orchestrator::{Components, Orchestrator};
use crate::registry::{self, DiseaseRegistry};
use crate::render;
use crate::search::lexical::{Bm25Params, LexicalSearchIndex};
use crate::search::provider::{GeneLookupProvider, LexicalProvider};
use crate::sources::gene_coords;
use crate::sources::llm::{LlmClient, OpenAiChatClient};

pub mod health;

#[derive(Parser, Debug)]
#[command(
    name = "disease-matcher",
    version,
    about = "Match clinical diagnoses to OMIM and MONDO diseases"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Print JSON instead of markdown
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rank diseases for a diagnosis
    Match {
        /// Diagnosis text (Russian by default)
        text: String,
        /// Gene symbol reported with the diagnosis
        #[arg(short, long)]
        gene: Option<String>,
        /// Variant coordinates, e.g. chrX:31200000-C>T
        #[arg(short, long)]
        variant: Option<String>,
        #[arg(short, long, value_enum, default_value_t = Language::Ru)]
        language: Language,
        /// Number of results (1-50)
        #[arg(short = 'k', long, default_value_t = 10)]
        top_k: usize,
        /// Free-text clinical context passed to the reranking judge
        #[arg(long)]
        context: Option<String>,
    },
    /// List diseases linked to a gene symbol or alias
    Gene { symbol: String },
    /// Parse and annotate variant coordinates
    Variant { coordinates: String },
    /// Run the HTTP API
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(short, long, default_value_t = 8002)]
        port: u16,
    },
    /// Report registry, index and LLM status
    Health {
        /// Also call the LLM endpoint
        #[arg(long)]
        probe: bool,
    },
}

/// A fully loaded matching service.
pub struct Service {
    pub(crate) orchestrator: Orchestrator,
    pub(crate) lexical_documents: usize,
    pub(crate) llm_configured: bool,
}

fn annotator(settings: &Settings) -> Result<VariantAnnotator, MatcherError> {
    let windows = match &settings.gene_coords_path {
        Some(path) => gene_coords::load_windows(path)?,
        None => gene_coords::builtin_windows(),
    };
    Ok(VariantAnnotator::new(windows))
}

async fn load_registry(settings: &Settings) -> anyhow::Result<Arc<DiseaseRegistry>> {
    let owned = settings.clone();
    let registry = tokio::task::spawn_blocking(move || registry::load(&owned))
        .await
        .context("registry loader task failed")??;
    Ok(Arc::new(registry))
}

/// Loads the registry, builds the lexical index and wires the pipeline.
pub(crate) async fn bootstrap(settings: &Settings) -> anyhow::Result<Service> {
    settings.validate()?;

    let registry = load_registry(settings).await?;
    let params = Bm25Params::from(&settings.lexical);
    let index_registry = registry.clone();
    let index = tokio::task::spawn_blocking(move || {
        let mut index = LexicalSearchIndex::new(params);
        index.build(index_registry);
        index
    })
    .await
    .context("lexical index build task failed")?;
    let lexical_documents = index.len();

    if !settings.llm.is_configured() {
        warn!("OPENAI_API_KEY is not set; translation falls back to the dictionary and reranking is skipped");
    }
    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiChatClient::new(&settings.llm)?);
    Ok(assemble(
        registry,
        index,
        annotator(settings)?,
        llm,
        settings,
        lexical_documents,
    ))
}

fn assemble(
    registry: Arc<DiseaseRegistry>,
    index: LexicalSearchIndex,
    annotator: VariantAnnotator,
    llm: Arc<dyn LlmClient>,
    settings: &Settings,
    lexical_documents: usize,
) -> Service {
    let translator = Arc::new(QueryTranslator::new(llm.clone(), settings));
    let components = Components {
        registry: registry.clone(),
        annotator,
        gene_source: Arc::new(GeneLookupProvider::new(registry.clone())),
        text_source: Arc::new(LexicalProvider::new(
            Arc::new(index),
            translator,
            settings.lexical,
        )),
        judge: RerankingJudge::new(llm, registry, settings),
    };
    info!(
        documents = lexical_documents,
        model = %settings.llm.model,
        "Matching service ready"
    );
    Service {
        orchestrator: Orchestrator::new(components, settings),
        lexical_documents,
        llm_configured: settings.llm.is_configured(),
    }
}

fn match_query(
    text: String,
    gene: Option<String>,
    variant: Option<String>,
    language: Language,
    top_k: usize,
    context: Option<String>,
) -> MatchQuery {
    MatchQuery {
        text,
        gene,
        variant_coordinates: variant,
        language,
        top_k,
        full_context: context,
    }
}

fn variant_output(annotator: &VariantAnnotator, coordinates: &str, json: bool) -> anyhow::Result<String> {
    let annotation = annotator.annotate_str(coordinates).ok_or_else(|| {
        MatcherError::InvalidArgument(format!(
            "Unrecognized variant coordinates: {coordinates}. Example: chrX:31200000-C>T"
        ))
    })?;
    if json {
        Ok(render::json::to_pretty(&annotation)?)
    } else {
        Ok(render::markdown::variant_markdown(&annotation)?)
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<String> {
    let settings = Settings::from_env();
    let json = cli.json;

    match cli.command {
        Commands::Match {
            text,
            gene,
            variant,
            language,
            top_k,
            context,
        } => {
            let query = match_query(text, gene, variant, language, top_k, context);
            query.validate()?;
            let service = bootstrap(&settings).await?;
            let response = service.orchestrator.search(&query).await;
            if json {
                Ok(render::json::to_pretty(&response)?)
            } else {
                Ok(render::markdown::match_markdown(&query.text, &response)?)
            }
        }
        Commands::Gene { symbol } => {
            let registry = load_registry(&settings).await?;
            let diseases = GeneLookupProvider::new(registry).lookup(symbol.trim());
            if json {
                Ok(render::json::to_pretty(&diseases)?)
            } else {
                Ok(render::markdown::gene_markdown(symbol.trim(), &diseases)?)
            }
        }
        Commands::Variant { coordinates } => {
            variant_output(&annotator(&settings)?, &coordinates, json)
        }
        Commands::Serve { host, port } => {
            crate::server::serve(&host, port).await?;
            Ok(String::new())
        }
        Commands::Health { probe } => {
            let report = health::check(&settings, probe).await;
            if json {
                Ok(render::json::to_pretty(&report)?)
            } else {
                Ok(report.to_markdown())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::registry::fixtures;
    use crate::sources::llm::fake::ScriptedLlm;

    /// A service over the fixture registry with a scripted LLM.
    pub(crate) fn service(llm: Arc<ScriptedLlm>) -> Service {
        let mut settings = Settings::default();
        settings.llm.retry.base_delay = std::time::Duration::from_millis(1);
        settings.llm.retry.max_delay = std::time::Duration::from_millis(2);
        let registry = Arc::new(fixtures::registry());
        let mut index = LexicalSearchIndex::new(Bm25Params::default());
        index.build(registry.clone());
        let documents = index.len();
        assemble(
            registry,
            index,
            VariantAnnotator::new(gene_coords::builtin_windows()),
            llm,
            &settings,
            documents,
        )
    }
}
