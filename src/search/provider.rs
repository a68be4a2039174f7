//! Independent candidate signals the orchestrator fans out to.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::LexicalSettings;
use crate::entities::candidate::{CandidateSource, DiseaseCandidate, SearchMethod};
use crate::entities::disease::{DiseaseKey, Vocabulary};
use crate::entities::request::Language;
use crate::error::MatcherError;
use crate::llm::translate::QueryTranslator;
use crate::registry::DiseaseRegistry;
use crate::search::lexical::LexicalSearchIndex;

const DIRECT_GENE_SCORE: f64 = 0.95;
const LINKED_GENE_SCORE: f64 = 0.90;

/// Query facts every provider sees.
#[derive(Debug, Clone, Copy)]
pub struct SearchInput<'a> {
    pub text: &'a str,
    /// Working gene: the request's own, else the variant's primary gene.
    pub gene: Option<&'a str>,
    pub language: Language,
}

#[async_trait]
pub trait CandidateProvider: Send + Sync {
    fn method(&self) -> SearchMethod;

    async fn search(&self, input: &SearchInput<'_>) -> Result<Vec<DiseaseCandidate>, MatcherError>;
}

/// Direct gene-to-phenotype lookup through the registry's gene index.
pub struct GeneLookupProvider {
    registry: Arc<DiseaseRegistry>,
}

impl GeneLookupProvider {
    pub fn new(registry: Arc<DiseaseRegistry>) -> Self {
        Self { registry }
    }

    pub(crate) fn lookup(&self, gene: &str) -> Vec<DiseaseCandidate> {
        let hits = self.registry.diseases_for_gene(gene, true);
        let mut emitted: HashSet<DiseaseKey> = HashSet::new();
        let mut candidates = Vec::with_capacity(hits.len());

        for disease in hits.iter().filter(|d| d.source == Vocabulary::Omim) {
            let mut candidate =
                DiseaseCandidate::from_disease(disease, DIRECT_GENE_SCORE, CandidateSource::GeneLookup);
            candidate.set_detail("method", "direct_gene_match");
            candidate.set_detail("gene_query", gene);
            self.registry.enrich(&mut candidate);
            emitted.insert(disease.id.clone());
            candidates.push(candidate);
        }

        for disease in hits.iter().filter(|d| d.source == Vocabulary::Mondo) {
            if disease
                .cross_reference
                .as_ref()
                .is_some_and(|twin| emitted.contains(twin))
            {
                continue;
            }
            let mut candidate =
                DiseaseCandidate::from_disease(disease, LINKED_GENE_SCORE, CandidateSource::GeneLookup);
            candidate.set_detail("method", "gene_index_link");
            candidate.set_detail("gene_query", gene);
            self.registry.enrich(&mut candidate);
            candidates.push(candidate);
        }

        info!(gene, candidates = candidates.len(), "Gene lookup finished");
        candidates
    }
}

#[async_trait]
impl CandidateProvider for GeneLookupProvider {
    fn method(&self) -> SearchMethod {
        SearchMethod::GeneLookup
    }

    async fn search(&self, input: &SearchInput<'_>) -> Result<Vec<DiseaseCandidate>, MatcherError> {
        Ok(input.gene.map(|gene| self.lookup(gene)).unwrap_or_default())
    }
}

/// BM25 over translated queries, gene-boosted when a gene is known.
pub struct LexicalProvider {
    index: Arc<LexicalSearchIndex>,
    translator: Arc<QueryTranslator>,
    settings: LexicalSettings,
}

impl LexicalProvider {
    pub fn new(
        index: Arc<LexicalSearchIndex>,
        translator: Arc<QueryTranslator>,
        settings: LexicalSettings,
    ) -> Self {
        Self {
            index,
            translator,
            settings,
        }
    }

    async fn queries(&self, input: &SearchInput<'_>) -> Vec<String> {
        match input.language {
            Language::Ru => {
                let context = input.gene.map(|gene| format!("Gene: {gene}"));
                self.translator
                    .generate_queries(input.text, context.as_deref())
                    .await
            }
            Language::En => vec![input.text.trim().to_string()],
        }
    }
}

#[async_trait]
impl CandidateProvider for LexicalProvider {
    fn method(&self) -> SearchMethod {
        SearchMethod::Bm25
    }

    async fn search(&self, input: &SearchInput<'_>) -> Result<Vec<DiseaseCandidate>, MatcherError> {
        let queries = self.queries(input).await;
        debug!(?queries, "Lexical queries");

        let pool = self.settings.pool_size;
        let candidates = match input.gene {
            Some(gene) => {
                self.index
                    .search_with_gene_boost(&queries, gene, pool, self.settings.gene_boost)?
            }
            None => self.index.search(&queries, pool)?,
        };
        info!(
            queries = queries.len(),
            candidates = candidates.len(),
            "Lexical search finished"
        );
        Ok(candidates)
    }
}
