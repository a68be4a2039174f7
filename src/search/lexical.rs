//! Okapi BM25 over one composite document per registry record.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::LexicalSettings;
use crate::entities::candidate::{CandidateSource, DiseaseCandidate, sort_by_score_desc};
use crate::entities::disease::Disease;
use crate::error::MatcherError;
use crate::registry::DiseaseRegistry;
use crate::search::text::{clean_disease_name, normalize_gene_symbol, preprocess, tokenize};

/// Negative IDFs (terms in more than half the corpus) are floored at this
/// fraction of the mean IDF.
const IDF_FLOOR_RATIO: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    pub score_divisor: f64,
}

impl From<&LexicalSettings> for Bm25Params {
    fn from(settings: &LexicalSettings) -> Self {
        Self {
            k1: settings.k1,
            b: settings.b,
            score_divisor: settings.score_divisor,
        }
    }
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self::from(&LexicalSettings::default())
    }
}

#[derive(Debug)]
struct BuiltIndex {
    registry: Arc<DiseaseRegistry>,
    /// term -> (document, term frequency)
    postings: HashMap<String, Vec<(usize, u32)>>,
    idf: HashMap<String, f64>,
    doc_lens: Vec<f64>,
    avg_doc_len: f64,
}

/// Per-document aggregate across every query of one search call.
struct Hit {
    raw: f64,
    matched_queries: Vec<String>,
}

#[derive(Debug, Default)]
pub struct LexicalSearchIndex {
    params: Bm25Params,
    built: Option<BuiltIndex>,
}

fn document_tokens(disease: &Disease) -> Vec<String> {
    let composite = disease
        .all_names()
        .map(clean_disease_name)
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    tokenize(&format!("{composite} {}", preprocess(&composite)))
}

fn query_tokens(query: &str) -> Vec<String> {
    tokenize(&format!("{query} {}", preprocess(query)))
}

impl LexicalSearchIndex {
    pub fn new(params: Bm25Params) -> Self {
        Self {
            params,
            built: None,
        }
    }

    /// Number of indexed documents (0 before `build`).
    pub fn len(&self) -> usize {
        self.built.as_ref().map_or(0, |b| b.doc_lens.len())
    }

    pub fn build(&mut self, registry: Arc<DiseaseRegistry>) {
        let mut postings: HashMap<String, Vec<(usize, u32)>> = HashMap::new();
        let mut doc_lens = Vec::with_capacity(registry.len());

        for (doc, disease) in registry.diseases().iter().enumerate() {
            let tokens = document_tokens(disease);
            doc_lens.push(tokens.len() as f64);

            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *tf.entry(token).or_default() += 1;
            }
            for (term, count) in tf {
                postings.entry(term).or_default().push((doc, count));
            }
        }

        let n = doc_lens.len() as f64;
        let avg_doc_len = if doc_lens.is_empty() {
            0.0
        } else {
            doc_lens.iter().sum::<f64>() / n
        };

        let mut idf: HashMap<String, f64> = postings
            .iter()
            .map(|(term, docs)| {
                let df = docs.len() as f64;
                (term.clone(), ((n - df + 0.5) / (df + 0.5)).ln())
            })
            .collect();
        if !idf.is_empty() {
            let floor = IDF_FLOOR_RATIO * idf.values().sum::<f64>() / idf.len() as f64;
            for value in idf.values_mut() {
                if *value < 0.0 {
                    *value = floor;
                }
            }
        }

        info!(
            documents = doc_lens.len(),
            terms = postings.len(),
            avg_doc_len,
            "Lexical index built"
        );
        self.built = Some(BuiltIndex {
            registry,
            postings,
            idf,
            doc_lens,
            avg_doc_len,
        });
    }

    fn built(&self) -> Result<&BuiltIndex, MatcherError> {
        self.built.as_ref().ok_or(MatcherError::IndexNotBuilt)
    }

    /// Raw BM25 score of every document matching at least one query token.
    fn scores_for_query(&self, index: &BuiltIndex, query: &str) -> HashMap<usize, f64> {
        let Bm25Params { k1, b, .. } = self.params;
        let mut scores: HashMap<usize, f64> = HashMap::new();
        for token in query_tokens(query) {
            let (Some(docs), Some(&idf)) = (index.postings.get(&token), index.idf.get(&token))
            else {
                continue;
            };
            for &(doc, tf) in docs {
                let tf = f64::from(tf);
                let len_norm = if index.avg_doc_len > 0.0 {
                    index.doc_lens[doc] / index.avg_doc_len
                } else {
                    1.0
                };
                let denom = tf + k1 * (1.0 - b + b * len_norm);
                *scores.entry(doc).or_default() += idf * tf * (k1 + 1.0) / denom;
            }
        }
        scores
    }

    /// Ranks documents by their best score over `queries`.
    ///
    /// Scores are the maximum across queries, normalized by the configured
    /// divisor and clamped to 1.0. Ties keep registry order.
    pub fn search(
        &self,
        queries: &[String],
        top_k: usize,
    ) -> Result<Vec<DiseaseCandidate>, MatcherError> {
        let index = self.built()?;

        let mut hits: HashMap<usize, Hit> = HashMap::new();
        for query in queries.iter().map(|q| q.trim()).filter(|q| !q.is_empty()) {
            for (doc, raw) in self.scores_for_query(index, query) {
                if raw <= 0.0 {
                    continue;
                }
                let hit = hits.entry(doc).or_insert_with(|| Hit {
                    raw: 0.0,
                    matched_queries: Vec::new(),
                });
                hit.raw = hit.raw.max(raw);
                hit.matched_queries.push(query.to_string());
            }
        }

        let mut ranked: Vec<(usize, Hit)> = hits.into_iter().collect();
        ranked.sort_by(|(doc_a, a), (doc_b, b)| b.raw.total_cmp(&a.raw).then(doc_a.cmp(doc_b)));
        ranked.truncate(top_k);

        let diseases = index.registry.diseases();
        Ok(ranked
            .into_iter()
            .map(|(doc, hit)| {
                let score = (hit.raw / self.params.score_divisor).min(1.0);
                let mut candidate =
                    DiseaseCandidate::from_disease(&diseases[doc], score, CandidateSource::Bm25);
                candidate.set_detail("bm25_score", hit.raw);
                candidate.set_detail("matched_queries", hit.matched_queries);
                index.registry.enrich(&mut candidate);
                candidate
            })
            .collect())
    }

    /// `search` over a doubled pool, then the gene boost, re-sort and truncate.
    pub fn search_with_gene_boost(
        &self,
        queries: &[String],
        gene: &str,
        top_k: usize,
        boost_factor: f64,
    ) -> Result<Vec<DiseaseCandidate>, MatcherError> {
        let mut candidates = self.search(queries, top_k.saturating_mul(2))?;
        apply_gene_boost(&mut candidates, gene, boost_factor);
        candidates.truncate(top_k);
        Ok(candidates)
    }
}

/// Multiplies the score of candidates carrying `gene` by `boost_factor`,
/// clamps to 1.0 and re-sorts.
pub(crate) fn apply_gene_boost(candidates: &mut [DiseaseCandidate], gene: &str, boost_factor: f64) {
    let gene = normalize_gene_symbol(gene);
    if gene.is_empty() {
        return;
    }
    for candidate in candidates.iter_mut().filter(|c| c.has_gene(&gene)) {
        candidate.score = (candidate.score * boost_factor).min(1.0);
        candidate.set_detail("gene_boosted", true);
    }
    sort_by_score_desc(candidates);
}
