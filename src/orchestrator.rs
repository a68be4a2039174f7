//! Per-request pipeline: variant, gene resolution, fork-join retrieval, merge,
//! judge, conflict penalties and response assembly.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Value, json};
use tracing::{debug, error, info};

use crate::config::Settings;
use crate::entities::candidate::{DiseaseCandidate, SearchMethod};
use crate::entities::request::MatchQuery;
use crate::entities::response::{
    ExtendedInfo, MAX_RESULT_GENES, MatchResponse, MatchResult, NO_DIAGNOSIS_NAME,
    ResponseMetadata,
};
use crate::entities::variant::{VariantAnnotation, VariantAnnotator};
use crate::error::MatcherError;
use crate::llm::rerank::{RerankContext, RerankOutcome, RerankingJudge};
use crate::registry::DiseaseRegistry;
use crate::search::conflict::ConflictResolver;
use crate::search::merge::CandidateMerger;
use crate::search::provider::{CandidateProvider, SearchInput};

const SEARCH_ERROR: &str = "SEARCH_ERROR";
const LLM_RERANK_METHOD: &str = "llm_rerank";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    VariantParsed,
    GeneResolved,
    SourcesDispatched,
    Merged,
    Reranked,
    ConflictsApplied,
    ResponseAssembled,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Self::VariantParsed => "variant-parsed",
            Self::GeneResolved => "gene-resolved",
            Self::SourcesDispatched => "sources-dispatched",
            Self::Merged => "merged",
            Self::Reranked => "reranked",
            Self::ConflictsApplied => "conflicts-applied",
            Self::ResponseAssembled => "response-assembled",
        }
    }
}

/// Pipeline collaborators, built once at startup.
pub struct Components {
    pub registry: Arc<DiseaseRegistry>,
    pub annotator: VariantAnnotator,
    pub gene_source: Arc<dyn CandidateProvider>,
    pub text_source: Arc<dyn CandidateProvider>,
    pub judge: RerankingJudge,
}

/// Per-source hit counts kept for `search_details`.
struct Retrieval {
    per_source: Vec<(SearchMethod, Vec<DiseaseCandidate>)>,
    gene_lookup_hits: usize,
    bm25_hits: usize,
}

pub struct Orchestrator {
    registry: Arc<DiseaseRegistry>,
    annotator: VariantAnnotator,
    gene_source: Arc<dyn CandidateProvider>,
    text_source: Arc<dyn CandidateProvider>,
    judge: RerankingJudge,
    merger: CandidateMerger,
    resolver: ConflictResolver,
    rerank_pool: usize,
    architecture: String,
}

impl Orchestrator {
    pub fn new(components: Components, settings: &Settings) -> Self {
        Self {
            registry: components.registry,
            annotator: components.annotator,
            gene_source: components.gene_source,
            text_source: components.text_source,
            judge: components.judge,
            merger: CandidateMerger::from(&settings.ranking),
            resolver: ConflictResolver::from(&settings.ranking),
            rerank_pool: settings.ranking.rerank_pool,
            architecture: settings.architecture.clone(),
        }
    }

    pub fn registry(&self) -> &DiseaseRegistry {
        &self.registry
    }

    pub fn annotator(&self) -> &VariantAnnotator {
        &self.annotator
    }

    pub fn model(&self) -> &str {
        self.judge.model()
    }

    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    /// Error-shaped response for requests rejected before `search` runs.
    pub fn error_response(&self, code: &str, message: impl Into<String>) -> MatchResponse {
        MatchResponse::error(self.metadata(Instant::now(), 0), code, message)
    }

    fn metadata(&self, started: Instant, total_results: usize) -> ResponseMetadata {
        ResponseMetadata {
            processing_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            architecture: self.architecture.clone(),
            model: self.judge.model().to_string(),
            total_results,
        }
    }

    /// Runs one request. Never fails: invalid input and internal errors come
    /// back as the `error` branch of the response.
    pub async fn search(&self, query: &MatchQuery) -> MatchResponse {
        let started = Instant::now();

        if let Err(err) = query.validate() {
            return MatchResponse::error(self.metadata(started, 0), err.code(), err.to_string());
        }
        if !query.has_diagnosis() {
            info!("Query carries no diagnosis; short-circuiting");
            return self.no_diagnosis(started);
        }

        match self.run(query, started).await {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, "Search failed");
                MatchResponse::error(self.metadata(started, 0), SEARCH_ERROR, err.to_string())
            }
        }
    }

    async fn run(&self, query: &MatchQuery, started: Instant) -> Result<MatchResponse, MatcherError> {
        let annotation = query
            .variant_coordinates()
            .and_then(|raw| self.annotator.annotate_str(raw));
        if let Some(annotation) = &annotation {
            debug!(
                stage = Stage::VariantParsed.as_str(),
                genes = ?annotation.genes,
                region = annotation.region_type.as_str(),
                "Variant annotated"
            );
        }

        let working_gene = query
            .gene()
            .or_else(|| annotation.as_ref().and_then(VariantAnnotation::primary_gene))
            .map(str::to_string);
        debug!(stage = Stage::GeneResolved.as_str(), gene = ?working_gene, "Working gene resolved");

        let input = SearchInput {
            text: query.text.trim(),
            gene: working_gene.as_deref(),
            language: query.language,
        };
        let retrieval = self.retrieve(&input).await?;
        let mut methods_used: Vec<String> = retrieval
            .per_source
            .iter()
            .map(|(method, _)| method.as_str().to_string())
            .collect();

        let mut merged = self.merger.merge(retrieval.per_source);
        let merged_count = merged.len();
        debug!(stage = Stage::Merged.as_str(), candidates = merged_count, "Candidates merged");
        if merged.is_empty() {
            info!("No candidates from any source");
            return Ok(self.empty(started));
        }

        merged.truncate(self.rerank_pool);
        let ctx = RerankContext {
            query: input.text,
            language: query.language,
            gene: input.gene,
            variant: annotation.as_ref(),
            full_context: query.full_context(),
        };
        let RerankOutcome {
            candidates,
            reasoning,
            conflicts,
            passed_through,
            ..
        } = self.judge.rerank(merged, &ctx).await;
        debug!(stage = Stage::Reranked.as_str(), passed_through, "Judge finished");

        let mut ranked = self.resolver.apply(candidates, &conflicts);
        ranked.truncate(query.top_k);
        debug!(
            stage = Stage::ConflictsApplied.as_str(),
            conflicts = conflicts.len(),
            "Conflict penalties applied"
        );

        let results = self.assemble(ranked);
        methods_used.push(LLM_RERANK_METHOD.to_string());

        info!(
            stage = Stage::ResponseAssembled.as_str(),
            results = results.len(),
            top = results.first().map(|r| r.name.as_str()).unwrap_or("-"),
            "Search complete"
        );
        Ok(MatchResponse {
            metadata: self.metadata(started, results.len()),
            results,
            extended: Some(ExtendedInfo {
                methods_used,
                variant_annotation: annotation,
                llm_reasoning: Some(reasoning),
                conflicts,
                search_details: json!({
                    "gene_lookup_hits": retrieval.gene_lookup_hits,
                    "bm25_hits": retrieval.bm25_hits,
                    "merged_candidates": merged_count,
                }),
            }),
            error: None,
        })
    }

    /// Gene lookup (only with a working gene) and lexical search, concurrently.
    async fn retrieve(&self, input: &SearchInput<'_>) -> Result<Retrieval, MatcherError> {
        debug!(stage = Stage::SourcesDispatched.as_str(), "Dispatching sources");
        let gene_search = async {
            match input.gene {
                Some(_) => self.gene_source.search(input).await.map(Some),
                None => Ok(None),
            }
        };
        let (gene_hits, text_hits) = tokio::join!(gene_search, self.text_source.search(input));
        let gene_hits = gene_hits?;
        let text_hits = text_hits?;

        let gene_lookup_hits = gene_hits.as_ref().map_or(0, Vec::len);
        let bm25_hits = text_hits.len();
        let mut per_source = Vec::with_capacity(2);
        if let Some(hits) = gene_hits {
            per_source.push((self.gene_source.method(), hits));
        }
        per_source.push((self.text_source.method(), text_hits));

        Ok(Retrieval {
            per_source,
            gene_lookup_hits,
            bm25_hits,
        })
    }

    fn assemble(&self, candidates: Vec<DiseaseCandidate>) -> Vec<MatchResult> {
        candidates
            .into_iter()
            .enumerate()
            .map(|(idx, mut candidate)| {
                self.registry.enrich(&mut candidate);
                let (requires_clarification, clarification_reason) = if idx == 0 {
                    (
                        candidate
                            .match_details
                            .get("requires_clarification")
                            .and_then(Value::as_bool)
                            .unwrap_or(false),
                        candidate
                            .match_details
                            .get("clarification_reason")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    )
                } else {
                    (false, None)
                };
                candidate.genes.truncate(MAX_RESULT_GENES);

                MatchResult {
                    rank: idx + 1,
                    omim_id: candidate.omim_id,
                    mondo_id: candidate.mondo_id,
                    name: candidate.name,
                    score: candidate.score.clamp(0.0, 1.0),
                    genes: candidate.genes,
                    requires_clarification,
                    clarification_reason,
                }
            })
            .collect()
    }

    fn no_diagnosis(&self, started: Instant) -> MatchResponse {
        MatchResponse {
            results: vec![MatchResult {
                rank: 1,
                omim_id: None,
                mondo_id: None,
                name: NO_DIAGNOSIS_NAME.to_string(),
                score: 0.0,
                genes: Vec::new(),
                requires_clarification: false,
                clarification_reason: None,
            }],
            metadata: self.metadata(started, 1),
            extended: Some(ExtendedInfo {
                methods_used: Vec::new(),
                variant_annotation: None,
                llm_reasoning: None,
                conflicts: Vec::new(),
                search_details: json!({
                    "no_diagnosis": true,
                    "message": "No diagnosis provided in the query",
                }),
            }),
            error: None,
        }
    }

    fn empty(&self, started: Instant) -> MatchResponse {
        MatchResponse {
            results: Vec::new(),
            metadata: self.metadata(started, 0),
            extended: Some(ExtendedInfo {
                methods_used: Vec::new(),
                variant_annotation: None,
                llm_reasoning: None,
                conflicts: Vec::new(),
                search_details: json!({ "message": "No matches found" }),
            }),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Map;

    use super::*;
    use crate::entities::candidate::CandidateSource;
    use crate::entities::request::Language;
    use crate::registry::fixtures;
    use crate::sources::gene_coords::builtin_windows;
    use crate::sources::llm::fake::ScriptedLlm;

    /// Returns canned candidates and records how it was called.
    struct CountingProvider {
        method: SearchMethod,
        hits: Vec<DiseaseCandidate>,
        fail: bool,
        calls: AtomicUsize,
        last_gene: Mutex<Option<String>>,
    }

    impl CountingProvider {
        fn new(method: SearchMethod, hits: Vec<DiseaseCandidate>) -> Arc<Self> {
            Arc::new(Self {
                method,
                hits,
                fail: false,
                calls: AtomicUsize::new(0),
                last_gene: Mutex::new(None),
            })
        }

        fn failing(method: SearchMethod) -> Arc<Self> {
            Arc::new(Self {
                method,
                hits: Vec::new(),
                fail: true,
                calls: AtomicUsize::new(0),
                last_gene: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CandidateProvider for CountingProvider {
        fn method(&self) -> SearchMethod {
            self.method
        }

        async fn search(
            &self,
            input: &SearchInput<'_>,
        ) -> Result<Vec<DiseaseCandidate>, MatcherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_gene.lock().unwrap() = input.gene.map(str::to_string);
            if self.fail {
                return Err(MatcherError::IndexNotBuilt);
            }
            Ok(self.hits.clone())
        }
    }

    fn candidate(
        omim: Option<&str>,
        mondo: Option<&str>,
        name: &str,
        genes: &[&str],
        score: f64,
    ) -> DiseaseCandidate {
        DiseaseCandidate {
            omim_id: omim.map(str::to_string),
            mondo_id: mondo.map(str::to_string),
            name: name.to_string(),
            genes: genes.iter().map(|g| g.to_string()).collect(),
            score,
            source: CandidateSource::Bm25,
            match_details: Map::new(),
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        gene: Arc<CountingProvider>,
        text: Arc<CountingProvider>,
        llm: Arc<ScriptedLlm>,
    }

    fn harness(gene: Arc<CountingProvider>, text: Arc<CountingProvider>, llm: ScriptedLlm) -> Harness {
        let mut settings = Settings::default();
        settings.llm.retry.base_delay = Duration::from_millis(1);
        settings.llm.retry.max_delay = Duration::from_millis(2);
        let registry = Arc::new(fixtures::registry());
        let llm = Arc::new(llm);
        let components = Components {
            registry: registry.clone(),
            annotator: VariantAnnotator::new(builtin_windows()),
            gene_source: gene.clone(),
            text_source: text.clone(),
            judge: RerankingJudge::new(llm.clone(), registry, &settings),
        };
        Harness {
            orchestrator: Orchestrator::new(components, &settings),
            gene,
            text,
            llm,
        }
    }

    fn dmd_sources() -> (Arc<CountingProvider>, Arc<CountingProvider>) {
        let gene = CountingProvider::new(
            SearchMethod::GeneLookup,
            vec![
                candidate(
                    Some("310200"),
                    Some("MONDO:0010679"),
                    "Duchenne muscular dystrophy",
                    &["DMD"],
                    0.95,
                ),
                candidate(Some("300376"), None, "Becker muscular dystrophy", &["DMD"], 0.95),
            ],
        );
        let text = CountingProvider::new(
            SearchMethod::Bm25,
            vec![
                candidate(None, Some("MONDO:0010679"), "Duchenne muscular dystrophy", &["DMD"], 0.9),
                candidate(Some("253300"), None, "Spinal muscular atrophy", &["SMN1"], 0.3),
            ],
        );
        (gene, text)
    }

    fn english(text: &str) -> MatchQuery {
        let mut query = MatchQuery::new(text);
        query.language = Language::En;
        query
    }

    #[tokio::test]
    async fn placeholder_text_short_circuits_without_touching_sources() {
        let (gene, text) = dmd_sources();
        let h = harness(gene, text, ScriptedLlm::replying("{}"));

        for raw in ["-", "  ", ""] {
            let response = h.orchestrator.search(&MatchQuery::new(raw)).await;
            assert_eq!(response.results.len(), 1);
            assert_eq!(response.results[0].name, NO_DIAGNOSIS_NAME);
            assert_eq!(response.results[0].score, 0.0);
            let extended = response.extended.expect("extended");
            assert_eq!(extended.search_details["no_diagnosis"], true);
        }
        assert_eq!(h.gene.calls(), 0);
        assert_eq!(h.text.calls(), 0);
        assert_eq!(h.llm.calls(), 0);
    }

    #[tokio::test]
    async fn full_pipeline_ranks_enriches_and_reports() {
        let (gene, text) = dmd_sources();
        let judge = r#"{
            "best_match_id": "OMIM:310200",
            "reasoning": "Classic Duchenne presentation",
            "ranked_candidates": [
                {"id": "OMIM:310200", "adjusted_score": 0.97, "adjustment_reason": "exact"},
                {"id": "OMIM:253300", "adjusted_score": 0.5, "adjustment_reason": "other gene"}
            ],
            "conflicts": [
                {"type": "gene_disease_mismatch", "severity": 1.0, "found_gene": "SMN1", "expected_genes": ["DMD"], "message": "SMN1 is unrelated"}
            ]
        }"#;
        let h = harness(gene, text, ScriptedLlm::replying(judge));

        let mut query = english("Duchenne muscular dystrophy");
        query.gene = Some("DMD".into());
        query.top_k = 3;
        let response = h.orchestrator.search(&query).await;

        assert!(response.error.is_none());
        let ranked: Vec<_> = response
            .results
            .iter()
            .map(|r| (r.rank, r.omim_id.clone().unwrap_or_default()))
            .collect();
        assert_eq!(
            ranked,
            vec![(1, "310200".to_string()), (2, "300376".to_string()), (3, "253300".to_string())]
        );
        // The MONDO-only lexical hit merged into the gene hit.
        assert_eq!(response.results[0].mondo_id.as_deref(), Some("MONDO:0010679"));
        // Filled from the cross-reference map at assembly.
        assert_eq!(response.results[1].mondo_id.as_deref(), Some("MONDO:0010311"));
        assert_eq!(response.results[0].score, 0.97);
        // 0.5 * (1 - 0.3 * 1.0)
        assert!((response.results[2].score - 0.35).abs() < 1e-9);
        assert_eq!(response.metadata.total_results, 3);
        assert_eq!(response.metadata.model, "fake-model");

        let extended = response.extended.expect("extended");
        assert_eq!(extended.methods_used, vec!["gene_lookup", "bm25", "llm_rerank"]);
        assert_eq!(extended.llm_reasoning.as_deref(), Some("Classic Duchenne presentation"));
        assert_eq!(extended.conflicts.len(), 1);
        assert_eq!(extended.search_details["gene_lookup_hits"], 2);
        assert_eq!(extended.search_details["bm25_hits"], 2);
        assert_eq!(extended.search_details["merged_candidates"], 3);
        assert_eq!(h.llm.calls(), 1);
    }

    #[tokio::test]
    async fn variant_supplies_the_working_gene() {
        let (gene, text) = dmd_sources();
        let h = harness(gene, text, ScriptedLlm::replying("{}"));

        let mut query = english("muscular dystrophy");
        query.variant_coordinates = Some("chrX:31500000-C>T".into());
        let response = h.orchestrator.search(&query).await;

        assert_eq!(h.gene.calls(), 1);
        assert_eq!(h.gene.last_gene.lock().unwrap().as_deref(), Some("DMD"));
        assert_eq!(h.text.last_gene.lock().unwrap().as_deref(), Some("DMD"));
        let extended = response.extended.expect("extended");
        let annotation = extended.variant_annotation.expect("annotation");
        assert_eq!(annotation.genes, vec!["DMD"]);
    }

    #[tokio::test]
    async fn without_gene_only_lexical_search_runs() {
        let (gene, text) = dmd_sources();
        let h = harness(gene, text, ScriptedLlm::replying("{}"));

        let mut query = english("muscular dystrophy");
        query.variant_coordinates = Some("garbage".into());
        let response = h.orchestrator.search(&query).await;

        assert_eq!(h.gene.calls(), 0);
        assert_eq!(h.text.calls(), 1);
        let extended = response.extended.expect("extended");
        assert_eq!(extended.methods_used, vec!["bm25", "llm_rerank"]);
        assert!(extended.variant_annotation.is_none());
    }

    #[tokio::test]
    async fn no_candidates_skips_the_judge() {
        let gene = CountingProvider::new(SearchMethod::GeneLookup, Vec::new());
        let text = CountingProvider::new(SearchMethod::Bm25, Vec::new());
        let h = harness(gene, text, ScriptedLlm::replying("{}"));

        let response = h.orchestrator.search(&english("unheard-of syndrome")).await;
        assert!(response.results.is_empty());
        assert!(response.error.is_none());
        let extended = response.extended.expect("extended");
        assert_eq!(extended.search_details["message"], "No matches found");
        assert_eq!(h.llm.calls(), 0);
    }

    #[tokio::test]
    async fn judge_failure_keeps_merged_order() {
        let (gene, text) = dmd_sources();
        let h = harness(gene, text, ScriptedLlm::replying("not json at all"));

        let mut query = english("Duchenne muscular dystrophy");
        query.gene = Some("DMD".into());
        let response = h.orchestrator.search(&query).await;

        assert_eq!(response.results.len(), 3);
        assert_eq!(response.results[0].omim_id.as_deref(), Some("310200"));
        assert!(response.results.iter().all(|r| (0.0..=1.0).contains(&r.score)));
        let reasoning = response.extended.and_then(|e| e.llm_reasoning).unwrap_or_default();
        assert!(reasoning.starts_with("Failed to parse LLM response"));
    }

    #[tokio::test]
    async fn clarification_flag_only_on_top_result() {
        let (gene, text) = dmd_sources();
        let judge = r#"{
            "initial_analysis": {"query_understanding": "dystrophy"},
            "candidates_evaluation": [
                {"id": "OMIM:300376", "rank": 1, "selection_reason": "milder course"},
                {"id": "OMIM:310200", "rank": 2, "elimination_reason": "onset"}
            ],
            "final_decision": {
                "best_match_id": "OMIM:300376",
                "brief_justification": "ambulant at 16",
                "requires_clarification": true,
                "clarification_reason": "confirm ambulation age"
            }
        }"#;
        let h = harness(gene, text, ScriptedLlm::replying(judge));

        let mut query = english("muscular dystrophy");
        query.gene = Some("DMD".into());
        let response = h.orchestrator.search(&query).await;

        assert_eq!(response.results[0].omim_id.as_deref(), Some("300376"));
        assert!(response.results[0].requires_clarification);
        assert_eq!(
            response.results[0].clarification_reason.as_deref(),
            Some("confirm ambulation age")
        );
        assert!(response.results[1..].iter().all(|r| !r.requires_clarification));
        assert!(response.results[0].score <= 1.0);
    }

    #[tokio::test]
    async fn source_failure_becomes_error_response() {
        let (gene, _) = dmd_sources();
        let text = CountingProvider::failing(SearchMethod::Bm25);
        let h = harness(gene, text, ScriptedLlm::replying("{}"));

        let response = h.orchestrator.search(&english("cystic fibrosis")).await;
        assert!(response.results.is_empty());
        assert!(response.extended.is_none());
        let error = response.error.expect("error");
        assert_eq!(error.code, "SEARCH_ERROR");
        assert!(error.message.contains("not been built"));
    }

    #[tokio::test]
    async fn invalid_top_k_is_rejected_before_search() {
        let (gene, text) = dmd_sources();
        let h = harness(gene, text, ScriptedLlm::replying("{}"));

        let mut query = english("cystic fibrosis");
        query.top_k = 0;
        let response = h.orchestrator.search(&query).await;
        assert_eq!(response.error.expect("error").code, "INVALID_REQUEST");
        assert_eq!(h.text.calls(), 0);
    }
}
