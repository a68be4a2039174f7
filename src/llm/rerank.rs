//! The reranking judge: prompt, response decoding and pass-through rules.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use minijinja::context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::entities::candidate::DiseaseCandidate;
use crate::entities::conflict::{Conflict, ConflictType};
use crate::entities::disease::DiseaseKey;
use crate::entities::request::Language;
use crate::entities::variant::VariantAnnotation;
use crate::error::MatcherError;
use crate::registry::DiseaseRegistry;
use crate::search::text::fold_name;
use crate::sources::llm::{ChatRequest, LlmClient};
use crate::sources::retry::{RetryPolicy, with_retry};
use crate::utils::serde::{StringOrVec, lenient_f64};

const RERANK_API: &str = "reranking-judge";
const SYSTEM_PROMPT: &str = include_str!("../../templates/prompts/rerank_system.txt");

/// Candidates written into the prompt.
const PROMPT_CANDIDATES: usize = 10;
const PROMPT_GENES: usize = 10;
const PROMPT_SYNONYMS: usize = 3;

const MISSING_RANK: f64 = 999.0;
const DEFAULT_RANK: f64 = 10.0;
const MIN_RANK_SCORE: f64 = 0.1;
const BEST_MATCH_FLOOR: f64 = 0.95;
const DEFAULT_SEVERITY: f64 = 0.5;
const ADJUSTMENT_EPSILON: f64 = 0.01;

/// Query-side facts the judge sees next to the candidates.
#[derive(Debug, Clone, Copy)]
pub struct RerankContext<'a> {
    pub query: &'a str,
    pub language: Language,
    pub gene: Option<&'a str>,
    pub variant: Option<&'a VariantAnnotation>,
    pub full_context: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct RerankOutcome {
    /// Same length as the input, judged candidates first.
    pub candidates: Vec<DiseaseCandidate>,
    pub reasoning: String,
    pub conflicts: Vec<Conflict>,
    pub best_match_id: Option<String>,
    /// Score change per candidate id, recorded when larger than 0.01.
    pub confidence_adjustment: BTreeMap<String, f64>,
    /// The judge's answer was not applied.
    pub passed_through: bool,
}

impl RerankOutcome {
    fn pass_through(candidates: Vec<DiseaseCandidate>, reasoning: String) -> Self {
        Self {
            candidates,
            reasoning,
            conflicts: Vec::new(),
            best_match_id: None,
            confidence_adjustment: BTreeMap::new(),
            passed_through: true,
        }
    }
}

// ---- wire shapes ---------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawConflict {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    severity: Option<f64>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    expected_genes: StringOrVec,
    #[serde(default)]
    found_gene: String,
    #[serde(default)]
    resolution_hint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlatRanked {
    #[serde(default)]
    id: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    adjusted_score: Option<f64>,
    #[serde(default)]
    adjustment_reason: String,
}

#[derive(Debug, Deserialize)]
struct FlatResponse {
    #[serde(default)]
    best_match_id: Option<String>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    ranked_candidates: Vec<FlatRanked>,
    #[serde(default)]
    conflicts: Vec<RawConflict>,
}

#[derive(Debug, Default, Deserialize)]
struct InitialAnalysis {
    #[serde(default)]
    query_understanding: String,
}

#[derive(Debug, Default, Deserialize)]
struct CriticalThinking {
    #[serde(default)]
    main_differentiator: String,
}

#[derive(Debug, Deserialize)]
struct FinalDecision {
    #[serde(default)]
    best_match_id: Option<String>,
    #[serde(default)]
    brief_justification: String,
    #[serde(default)]
    requires_clarification: bool,
    #[serde(default)]
    clarification_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Evaluation {
    #[serde(default)]
    id: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    rank: Option<f64>,
    #[serde(default)]
    selection_reason: Option<String>,
    #[serde(default)]
    elimination_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StepwiseResponse {
    #[serde(default)]
    initial_analysis: Option<InitialAnalysis>,
    #[serde(default)]
    critical_thinking: Option<CriticalThinking>,
    final_decision: FinalDecision,
    candidates_evaluation: Vec<Evaluation>,
    #[serde(default)]
    conflicts: Vec<RawConflict>,
}

/// The two answer formats the judge prompt family produces.
#[derive(Debug)]
enum JudgeResponse {
    Flat(FlatResponse),
    Stepwise(StepwiseResponse),
}

impl JudgeResponse {
    /// Detects the shape from its marker keys before deserializing.
    fn decode(content: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(content.trim())?;
        let stepwise = value
            .as_object()
            .is_some_and(|o| o.contains_key("final_decision") && o.contains_key("candidates_evaluation"));
        if stepwise {
            serde_json::from_value(value).map(Self::Stepwise)
        } else {
            serde_json::from_value(value).map(Self::Flat)
        }
    }

    fn into_verdict(self) -> JudgeVerdict {
        match self {
            Self::Flat(flat) => JudgeVerdict {
                reasoning: flat.reasoning,
                best_match_id: flat.best_match_id,
                requires_clarification: false,
                clarification_reason: None,
                rankings: flat
                    .ranked_candidates
                    .into_iter()
                    .map(|item| Ranking {
                        id: item.id,
                        score: item.adjusted_score,
                        reason: item.adjustment_reason,
                        rank: None,
                    })
                    .collect(),
                conflicts: flat.conflicts,
            },
            Self::Stepwise(step) => {
                let reasoning = [
                    step.initial_analysis
                        .map(|a| format!("Query analysis: {}", a.query_understanding)),
                    step.critical_thinking
                        .map(|c| format!("Critical thinking: {}", c.main_differentiator)),
                    Some(step.final_decision.brief_justification),
                ]
                .into_iter()
                .flatten()
                .filter(|part| !part.trim().is_empty())
                .collect::<Vec<_>>()
                .join(" ");

                let best = step.final_decision.best_match_id;
                let best_key = best.as_deref().and_then(DiseaseKey::parse);
                let mut evaluations = step.candidates_evaluation;
                evaluations.sort_by(|a, b| {
                    a.rank
                        .unwrap_or(MISSING_RANK)
                        .total_cmp(&b.rank.unwrap_or(MISSING_RANK))
                });

                let rankings = evaluations
                    .into_iter()
                    .map(|eval| {
                        let rank = eval.rank.unwrap_or(DEFAULT_RANK);
                        let mut score = (1.1 - 0.1 * rank).max(MIN_RANK_SCORE);
                        let is_best = best_key.is_some() && DiseaseKey::parse(&eval.id) == best_key;
                        if rank == 1.0 && is_best {
                            score = score.max(BEST_MATCH_FLOOR);
                        }
                        Ranking {
                            id: eval.id,
                            score: Some(score),
                            reason: eval
                                .selection_reason
                                .filter(|r| !r.is_empty())
                                .or(eval.elimination_reason)
                                .unwrap_or_default(),
                            rank: Some(rank),
                        }
                    })
                    .collect();

                JudgeVerdict {
                    reasoning,
                    best_match_id: best,
                    requires_clarification: step.final_decision.requires_clarification,
                    clarification_reason: step.final_decision.clarification_reason,
                    rankings,
                    conflicts: step.conflicts,
                }
            }
        }
    }
}

/// Shape-independent judge decision.
#[derive(Debug)]
struct JudgeVerdict {
    reasoning: String,
    best_match_id: Option<String>,
    requires_clarification: bool,
    clarification_reason: Option<String>,
    rankings: Vec<Ranking>,
    conflicts: Vec<RawConflict>,
}

#[derive(Debug)]
struct Ranking {
    id: String,
    /// `None` keeps the candidate's current score.
    score: Option<f64>,
    reason: String,
    rank: Option<f64>,
}

fn decode_conflicts(raw: Vec<RawConflict>) -> Vec<Conflict> {
    raw.into_iter()
        .filter_map(|c| {
            let kind_text = c.kind.as_deref().unwrap_or("gene_disease_mismatch");
            let Some(kind) = ConflictType::parse(kind_text) else {
                warn!(kind = kind_text, "Dropping conflict with unknown type");
                return None;
            };
            Some(Conflict {
                kind,
                severity: c.severity.unwrap_or(DEFAULT_SEVERITY).clamp(0.0, 1.0),
                found: c.found_gene.trim().to_string(),
                expected: c.expected_genes.into_vec(),
                message: c.message,
                resolution_hint: c.resolution_hint.filter(|h| !h.trim().is_empty()),
            })
        })
        .collect()
}

impl JudgeVerdict {
    fn apply(self, candidates: Vec<DiseaseCandidate>) -> RerankOutcome {
        let mut by_key: HashMap<DiseaseKey, usize> = HashMap::new();
        for (idx, candidate) in candidates.iter().enumerate() {
            for key in candidate.id_keys() {
                by_key.entry(key).or_insert(idx);
            }
        }
        let best_key = self.best_match_id.as_deref().and_then(DiseaseKey::parse);

        let mut slots: Vec<Option<DiseaseCandidate>> = candidates.into_iter().map(Some).collect();
        let mut ranked = Vec::with_capacity(slots.len());
        let mut confidence_adjustment = BTreeMap::new();

        for ranking in self.rankings {
            let Some(key) = DiseaseKey::parse(&ranking.id) else {
                debug!(id = %ranking.id, "Judge referenced an unparseable id");
                continue;
            };
            let Some(mut candidate) = by_key.get(&key).and_then(|&idx| slots[idx].take()) else {
                continue;
            };

            let original = candidate.score;
            let adjusted = ranking.score.unwrap_or(original).clamp(0.0, 1.0);
            candidate.score = adjusted;
            candidate.set_detail("llm_adjusted", true);
            candidate.set_detail("adjustment_reason", ranking.reason);
            if let Some(rank) = ranking.rank {
                candidate.set_detail("llm_rank", rank);
            }
            let is_best = best_key.as_ref().is_some_and(|b| candidate.id_keys().contains(b));
            if self.requires_clarification && is_best {
                candidate.set_detail("requires_clarification", true);
                if let Some(reason) = &self.clarification_reason {
                    candidate.set_detail("clarification_reason", reason.as_str());
                }
            }
            if (adjusted - original).abs() > ADJUSTMENT_EPSILON {
                confidence_adjustment.insert(key.to_string(), adjusted - original);
            }
            ranked.push(candidate);
        }

        let judged = ranked.len();
        ranked.extend(slots.into_iter().flatten());
        debug!(judged, total = ranked.len(), "Applied judge ranking");

        RerankOutcome {
            candidates: ranked,
            reasoning: self.reasoning,
            conflicts: decode_conflicts(self.conflicts),
            best_match_id: self.best_match_id,
            confidence_adjustment,
            passed_through: false,
        }
    }
}

// ---- prompt ----------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PromptCandidate<'a> {
    name: &'a str,
    omim_id: Option<&'a str>,
    mondo_id: Option<&'a str>,
    genes: &'a [String],
    exact_synonyms: &'a [String],
    related_synonyms: &'a [String],
    alternative_names: &'a [String],
    categories: &'a [String],
    cross_references: Vec<String>,
    exact_name_match: bool,
}

fn head(items: &[String], n: usize) -> &[String] {
    &items[..items.len().min(n)]
}

/// LLM judge over the merged shortlist.
pub struct RerankingJudge {
    llm: Arc<dyn LlmClient>,
    registry: Arc<DiseaseRegistry>,
    policy: RetryPolicy,
    timeout: Duration,
    temperature: f32,
    max_tokens: u32,
}

impl RerankingJudge {
    pub fn new(llm: Arc<dyn LlmClient>, registry: Arc<DiseaseRegistry>, settings: &Settings) -> Self {
        Self {
            llm,
            registry,
            policy: settings.llm.retry,
            timeout: settings.llm.timeout,
            temperature: settings.llm.temperature,
            max_tokens: settings.llm.max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    fn prompt_candidate<'a>(&'a self, candidate: &'a DiseaseCandidate, query: &str) -> PromptCandidate<'a> {
        let disease = candidate
            .omim_key()
            .and_then(|k| self.registry.get(&k))
            .or_else(|| candidate.mondo_key().and_then(|k| self.registry.get(&k)));
        let empty: &[String] = &[];
        let folded_query = fold_name(query);

        let exact_name_match = fold_name(&candidate.name) == folded_query
            || disease.is_some_and(|d| d.all_names().any(|n| fold_name(n) == folded_query));

        PromptCandidate {
            name: &candidate.name,
            omim_id: candidate.omim_id.as_deref(),
            mondo_id: candidate.mondo_id.as_deref(),
            genes: head(&candidate.genes, PROMPT_GENES),
            exact_synonyms: disease.map_or(empty, |d| head(&d.exact_synonyms, PROMPT_SYNONYMS)),
            related_synonyms: disease.map_or(empty, |d| head(&d.related_synonyms, PROMPT_SYNONYMS)),
            alternative_names: disease.map_or(empty, |d| head(&d.alternative_names, PROMPT_SYNONYMS)),
            categories: disease.map_or(empty, |d| d.subsets.as_slice()),
            cross_references: disease
                .and_then(|d| d.cross_reference.as_ref())
                .map(ToString::to_string)
                .into_iter()
                .collect(),
            exact_name_match,
        }
    }

    pub(crate) fn build_prompt(
        &self,
        candidates: &[DiseaseCandidate],
        ctx: &RerankContext<'_>,
    ) -> Result<String, MatcherError> {
        let rows: Vec<PromptCandidate<'_>> = candidates
            .iter()
            .take(PROMPT_CANDIDATES)
            .map(|c| self.prompt_candidate(c, ctx.query))
            .collect();
        let variant = ctx.variant;
        let tmpl = super::prompt_env()?.get_template("rerank_user.j2")?;
        Ok(tmpl.render(context! {
            query => ctx.query,
            language => ctx.language.as_str(),
            gene => ctx.gene,
            variant => variant.map(|v| v.variant.to_string()),
            region_type => variant.map(|v| v.region_type.as_str()),
            variant_genes => variant.map(|v| v.genes.clone()),
            distance_to_gene => variant.and_then(|v| v.distance_to_gene),
            full_context => ctx.full_context,
            candidates => rows,
        })?)
    }

    /// Reorders and rescales `candidates` according to the judge.
    ///
    /// Never fails: a call error, exhausted retries or an unreadable answer
    /// return the input unchanged with the failure in `reasoning`.
    pub async fn rerank(
        &self,
        candidates: Vec<DiseaseCandidate>,
        ctx: &RerankContext<'_>,
    ) -> RerankOutcome {
        if candidates.is_empty() {
            return RerankOutcome::pass_through(candidates, "No candidates to rerank".into());
        }

        let user = match self.build_prompt(&candidates, ctx) {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "Judge prompt could not be rendered; keeping merged order");
                return RerankOutcome::pass_through(
                    candidates,
                    format!("LLM reranking failed: {err}"),
                );
            }
        };
        let request = ChatRequest {
            system: SYSTEM_PROMPT.to_string(),
            user,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            json_mode: true,
        };

        let content = match with_retry(RERANK_API, &self.policy, self.timeout, || {
            self.llm.complete(&request)
        })
        .await
        {
            Ok(content) => content,
            Err(err) => {
                warn!(error = %err, candidates = candidates.len(), "Reranking failed; keeping merged order");
                return RerankOutcome::pass_through(
                    candidates,
                    format!("LLM reranking failed: {err}"),
                );
            }
        };
        debug!(%content, "Judge response");

        match JudgeResponse::decode(&content) {
            Ok(response) => {
                let outcome = response.into_verdict().apply(candidates);
                info!(
                    best_match = outcome.best_match_id.as_deref().unwrap_or("-"),
                    conflicts = outcome.conflicts.len(),
                    adjusted = outcome.confidence_adjustment.len(),
                    "Judge ranking applied"
                );
                outcome
            }
            Err(err) => {
                warn!(error = %err, "Judge answer could not be parsed; keeping merged order");
                RerankOutcome::pass_through(candidates, format!("Failed to parse LLM response: {err}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;
    use crate::entities::candidate::CandidateSource;
    use crate::entities::variant::{RegionType, VariantInfo};
    use crate::registry::fixtures;
    use crate::sources::llm::fake::ScriptedLlm;

    fn candidate(omim: Option<&str>, mondo: Option<&str>, name: &str, score: f64) -> DiseaseCandidate {
        DiseaseCandidate {
            omim_id: omim.map(str::to_string),
            mondo_id: mondo.map(str::to_string),
            name: name.to_string(),
            genes: vec!["DMD".into()],
            score,
            source: CandidateSource::Combined,
            match_details: Map::new(),
        }
    }

    fn shortlist() -> Vec<DiseaseCandidate> {
        vec![
            candidate(Some("300376"), Some("MONDO:0010311"), "Becker muscular dystrophy", 0.8),
            candidate(Some("310200"), Some("MONDO:0010679"), "Duchenne muscular dystrophy", 0.7),
            candidate(Some("302045"), None, "Cardiomyopathy, dilated, 3B", 0.4),
        ]
    }

    fn judge(llm: Arc<ScriptedLlm>) -> RerankingJudge {
        let mut settings = Settings::default();
        settings.llm.retry.base_delay = Duration::from_millis(1);
        settings.llm.retry.max_delay = Duration::from_millis(2);
        RerankingJudge::new(llm, Arc::new(fixtures::registry()), &settings)
    }

    fn ctx() -> RerankContext<'static> {
        RerankContext {
            query: "Duchenne muscular dystrophy",
            language: Language::En,
            gene: Some("DMD"),
            variant: None,
            full_context: None,
        }
    }

    fn ids(outcome: &RerankOutcome) -> Vec<String> {
        outcome.candidates.iter().map(DiseaseCandidate::display_id).collect()
    }

    #[tokio::test]
    async fn flat_answer_reorders_and_appends_unmentioned() {
        let llm = Arc::new(ScriptedLlm::replying(
            r#"{
              "best_match_id": "OMIM:310200",
              "reasoning": "Exact name match",
              "ranked_candidates": [
                {"id": "omim_310200", "adjusted_score": 0.97, "adjustment_reason": "exact"},
                {"id": "OMIM:310200", "adjusted_score": 0.2, "adjustment_reason": "duplicate"}
              ],
              "conflicts": [
                {"type": "gene_disease_mismatch", "severity": 1.7, "message": "m", "expected_genes": "DMD", "found_gene": "UTRN"},
                {"type": "made_up", "found_gene": "X"}
              ]
            }"#,
        ));
        let outcome = judge(llm.clone()).rerank(shortlist(), &ctx()).await;

        assert!(!outcome.passed_through);
        assert_eq!(ids(&outcome), vec!["OMIM:310200", "OMIM:300376", "OMIM:302045"]);
        assert_eq!(outcome.candidates[0].score, 0.97);
        assert_eq!(outcome.candidates[1].score, 0.8);
        assert_eq!(outcome.reasoning, "Exact name match");
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].severity, 1.0);
        assert_eq!(outcome.conflicts[0].expected, vec!["DMD"]);
        assert!(
            (outcome.confidence_adjustment["OMIM:310200"] - 0.27).abs() < 1e-9
        );
        let request = llm.last_request().expect("request");
        assert!(request.json_mode);
    }

    #[tokio::test]
    async fn out_of_range_adjusted_scores_are_clamped() {
        let llm = Arc::new(ScriptedLlm::replying(
            r#"{
              "ranked_candidates": [
                {"id": "OMIM:310200", "adjusted_score": 1.6},
                {"id": "OMIM:300376", "adjusted_score": -0.4}
              ]
            }"#,
        ));
        let outcome = judge(llm).rerank(shortlist(), &ctx()).await;

        assert_eq!(ids(&outcome), vec!["OMIM:310200", "OMIM:300376", "OMIM:302045"]);
        assert_eq!(outcome.candidates[0].score, 1.0);
        assert_eq!(outcome.candidates[1].score, 0.0);
        assert!(outcome.candidates.iter().all(|c| (0.0..=1.0).contains(&c.score)));
    }

    #[tokio::test]
    async fn stepwise_answer_scores_by_rank() {
        let llm = Arc::new(ScriptedLlm::replying(
            r#"{
              "initial_analysis": {"query_understanding": "DMD phenotype"},
              "critical_thinking": {"main_differentiator": "onset age"},
              "candidates_evaluation": [
                {"id": "OMIM:300376", "rank": 2, "elimination_reason": "milder"},
                {"id": "MONDO:0010679", "rank": 1, "selection_reason": "exact"}
              ],
              "final_decision": {
                "best_match_id": "MONDO:0010679",
                "brief_justification": "Classic presentation.",
                "requires_clarification": true,
                "clarification_reason": "no biopsy"
              }
            }"#,
        ));
        let outcome = judge(llm).rerank(shortlist(), &ctx()).await;

        assert_eq!(ids(&outcome), vec!["OMIM:310200", "OMIM:300376", "OMIM:302045"]);
        assert!((outcome.candidates[0].score - 1.0).abs() < 1e-9);
        assert!((outcome.candidates[1].score - 0.9).abs() < 1e-9);
        assert_eq!(outcome.candidates[0].match_details["llm_rank"], 1.0);
        assert_eq!(outcome.candidates[0].match_details["requires_clarification"], true);
        assert_eq!(outcome.candidates[0].match_details["clarification_reason"], "no biopsy");
        assert!(!outcome.candidates[1].match_details.contains_key("requires_clarification"));
        assert_eq!(
            outcome.reasoning,
            "Query analysis: DMD phenotype Critical thinking: onset age Classic presentation."
        );
    }

    #[tokio::test]
    async fn unparseable_answer_passes_through() {
        let llm = Arc::new(ScriptedLlm::replying("I think it is Duchenne."));
        let input = shortlist();
        let outcome = judge(llm).rerank(input.clone(), &ctx()).await;
        assert!(outcome.passed_through);
        assert!(outcome.reasoning.starts_with("Failed to parse LLM response"));
        assert_eq!(ids(&outcome), vec!["OMIM:300376", "OMIM:310200", "OMIM:302045"]);
        assert_eq!(outcome.candidates[0].score, input[0].score);
    }

    #[tokio::test]
    async fn call_failure_passes_through_after_retries() {
        let llm = Arc::new(ScriptedLlm::failing(|| MatcherError::ApiStatus {
            api: "openai".into(),
            status: 502,
            excerpt: "bad gateway".into(),
        }));
        let outcome = judge(llm.clone()).rerank(shortlist(), &ctx()).await;
        assert!(outcome.passed_through);
        assert!(outcome.reasoning.starts_with("LLM reranking failed"));
        assert_eq!(outcome.candidates.len(), 3);
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test]
    async fn empty_shortlist_skips_the_call() {
        let llm = Arc::new(ScriptedLlm::replying("{}"));
        let outcome = judge(llm.clone()).rerank(Vec::new(), &ctx()).await;
        assert_eq!(outcome.reasoning, "No candidates to rerank");
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn output_length_always_matches_input() {
        let answers = [
            r#"{"ranked_candidates": []}"#,
            r#"{"ranked_candidates": [{"id": "OMIM:999999"}]}"#,
            r#"{"ranked_candidates": [{"id": "OMIM:302045"}, {"id": "OMIM:302045"}]}"#,
            r#"[1, 2, 3]"#,
        ];
        for answer in answers {
            let outcome = judge(Arc::new(ScriptedLlm::replying(answer)))
                .rerank(shortlist(), &ctx())
                .await;
            assert_eq!(outcome.candidates.len(), 3, "answer: {answer}");
        }
    }

    #[test]
    fn prompt_lists_candidates_with_registry_details() {
        let judge = judge(Arc::new(ScriptedLlm::replying("{}")));
        let annotation = VariantAnnotation {
            variant: VariantInfo {
                chromosome: "X".into(),
                position: 31_200_000,
                reference: "C".into(),
                alternative: "T".into(),
            },
            genes: vec!["DMD".into()],
            region_type: RegionType::Exonic,
            distance_to_gene: Some(0),
            functional_impact: None,
        };
        let context = RerankContext {
            variant: Some(&annotation),
            full_context: Some("pathogenic, exon 45 deletion"),
            ..ctx()
        };
        let prompt = judge.build_prompt(&shortlist(), &context).expect("prompt");

        assert!(prompt.starts_with(
            "Query: \"Duchenne muscular dystrophy\" / \"DUCHENNE MUSCULAR DYSTROPHY\""
        ));
        assert!(prompt.contains("Gene: DMD"));
        assert!(prompt.contains("Variant: X:31200000:C>T"));
        assert!(prompt.contains("Region type: exonic"));
        assert!(prompt.contains("Distance to nearest gene: 0bp"));
        assert!(prompt.contains("pathogenic, exon 45 deletion"));
        assert!(prompt.contains("1. BECKER MUSCULAR DYSTROPHY"));
        assert!(prompt.contains("   OMIM: 310200"));
        assert!(prompt.contains("Cross-references: MONDO:0010679"));
        assert!(prompt.contains("EXACT NAME MATCH with query!"));
        assert_eq!(prompt.matches("EXACT NAME MATCH").count(), 1);
    }
}
