//! Weighted fusion of per-source candidate lists.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::config::RankingSettings;
use crate::entities::candidate::{
    CandidateSource, DiseaseCandidate, SearchMethod, sort_by_score_desc,
};
use crate::entities::disease::DiseaseKey;

const MULTI_SOURCE_BONUS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateMerger {
    pub gene_weight: f64,
    pub lexical_weight: f64,
}

impl From<&RankingSettings> for CandidateMerger {
    fn from(settings: &RankingSettings) -> Self {
        Self {
            gene_weight: settings.gene_weight,
            lexical_weight: settings.lexical_weight,
        }
    }
}

impl Default for CandidateMerger {
    fn default() -> Self {
        Self::from(&RankingSettings::default())
    }
}

struct Group {
    candidate: DiseaseCandidate,
    methods: Vec<SearchMethod>,
    method_scores: Map<String, Value>,
    total: f64,
}

impl Group {
    fn absorb(&mut self, method: SearchMethod, incoming: DiseaseCandidate, contribution: f64) {
        let merged = &mut self.candidate;
        if merged.omim_id.is_none() {
            merged.omim_id = incoming.omim_id;
        }
        if merged.mondo_id.is_none() {
            merged.mondo_id = incoming.mondo_id;
        }
        merged.union_genes(&incoming.genes);
        for (key, value) in incoming.match_details {
            merged.match_details.entry(key).or_insert(value);
        }
        self.record(method, incoming.score, contribution);
    }

    fn record(&mut self, method: SearchMethod, score: f64, contribution: f64) {
        self.total += contribution;
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        let best = self
            .method_scores
            .get(method.as_str())
            .and_then(Value::as_f64)
            .map_or(score, |prev| prev.max(score));
        self.method_scores.insert(method.as_str().to_string(), best.into());
    }

    fn finish(self) -> DiseaseCandidate {
        let Group {
            mut candidate,
            methods,
            method_scores,
            total,
        } = self;
        let distinct = methods.len().max(1);
        let bonus = 1.0 + MULTI_SOURCE_BONUS * (distinct - 1) as f64;
        let score = (total * bonus).min(1.0);

        candidate.score = score;
        candidate.source = match methods.as_slice() {
            [single] => CandidateSource::from(*single),
            _ => CandidateSource::Combined,
        };
        candidate.set_detail(
            "methods",
            methods.iter().map(|m| m.as_str()).collect::<Vec<_>>(),
        );
        candidate.set_detail("method_scores", method_scores);
        candidate.set_detail("final_score", score);
        candidate
    }
}

/// Keys a group is registered under: its ids, or its folded name when it has none.
fn grouping_keys(candidate: &DiseaseCandidate) -> Vec<DiseaseKey> {
    let keys = candidate.id_keys();
    if keys.is_empty() {
        vec![candidate.key()]
    } else {
        keys
    }
}

/// Existing group an incoming candidate belongs to.
///
/// OMIM ids are authoritative: a candidate with an OMIM id only joins the
/// group holding that id, or a MONDO-keyed group that has no OMIM id yet.
/// Two candidates with different OMIM ids never share a group.
fn target_group(
    candidate: &DiseaseCandidate,
    groups: &[Group],
    by_key: &HashMap<DiseaseKey, usize>,
) -> Option<usize> {
    if let Some(omim) = candidate.omim_key() {
        if let Some(&idx) = by_key.get(&omim) {
            return Some(idx);
        }
        return candidate
            .mondo_key()
            .and_then(|mondo| by_key.get(&mondo).copied())
            .filter(|&idx| groups[idx].candidate.omim_id.is_none());
    }
    by_key.get(&candidate.key()).copied()
}

impl CandidateMerger {
    pub fn weight(&self, method: SearchMethod) -> f64 {
        match method {
            SearchMethod::GeneLookup => self.gene_weight,
            SearchMethod::Bm25 => self.lexical_weight,
        }
    }

    /// Groups candidates naming the same disease, sums their weighted
    /// scores, applies the corroboration bonus and clamps to 1.0.
    ///
    /// A MONDO-only hit joins the group of its OMIM twin, but distinct OMIM
    /// diseases sharing one MONDO cross-reference stay separate.
    /// Output is sorted by descending score; ties keep first-seen order.
    pub fn merge(&self, per_source: Vec<(SearchMethod, Vec<DiseaseCandidate>)>) -> Vec<DiseaseCandidate> {
        let mut groups: Vec<Group> = Vec::new();
        let mut by_key: HashMap<DiseaseKey, usize> = HashMap::new();

        for (method, candidates) in per_source {
            let weight = self.weight(method);
            for candidate in candidates {
                let contribution = candidate.score.max(0.0) * weight;
                let idx = match target_group(&candidate, &groups, &by_key) {
                    Some(idx) => {
                        groups[idx].absorb(method, candidate, contribution);
                        idx
                    }
                    None => {
                        let score = candidate.score;
                        let mut group = Group {
                            candidate,
                            methods: Vec::new(),
                            method_scores: Map::new(),
                            total: 0.0,
                        };
                        group.record(method, score, contribution);
                        groups.push(group);
                        groups.len() - 1
                    }
                };

                for key in grouping_keys(&groups[idx].candidate) {
                    by_key.entry(key).or_insert(idx);
                }
            }
        }

        let mut merged: Vec<DiseaseCandidate> = groups.into_iter().map(Group::finish).collect();
        sort_by_score_desc(&mut merged);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(omim: Option<&str>, mondo: Option<&str>, name: &str, score: f64) -> DiseaseCandidate {
        DiseaseCandidate {
            omim_id: omim.map(str::to_string),
            mondo_id: mondo.map(str::to_string),
            name: name.to_string(),
            genes: Vec::new(),
            score,
            source: CandidateSource::Bm25,
            match_details: Map::new(),
        }
    }

    fn ids(candidates: &[DiseaseCandidate]) -> Vec<String> {
        candidates.iter().map(DiseaseCandidate::display_id).collect()
    }

    #[test]
    fn weighted_scores_sum_across_sources_with_bonus() {
        let merger = CandidateMerger::default();
        let merged = merger.merge(vec![
            (SearchMethod::GeneLookup, vec![candidate(Some("310200"), None, "DMD", 0.5)]),
            (SearchMethod::Bm25, vec![candidate(Some("310200"), None, "DMD", 0.5)]),
        ]);
        assert_eq!(merged.len(), 1);
        let expected = (0.5 * 0.6 + 0.5 * 0.4) * 1.1;
        assert!((merged[0].score - expected).abs() < 1e-12);
        assert_eq!(merged[0].source, CandidateSource::Combined);
        assert_eq!(merged[0].match_details["methods"], serde_json::json!(["gene_lookup", "bm25"]));
    }

    #[test]
    fn single_source_keeps_its_tag_and_weight() {
        let merger = CandidateMerger::default();
        let merged = merger.merge(vec![(
            SearchMethod::Bm25,
            vec![candidate(None, Some("MONDO:0010679"), "Duchenne", 0.5)],
        )]);
        assert!((merged[0].score - 0.2).abs() < 1e-12);
        assert_eq!(merged[0].source, CandidateSource::Bm25);
    }

    #[test]
    fn merging_a_list_with_itself_keeps_relative_order() {
        let merger = CandidateMerger {
            gene_weight: 0.5,
            lexical_weight: 0.5,
        };
        let list = vec![
            candidate(Some("100001"), None, "a", 0.9),
            candidate(Some("100002"), None, "b", 0.6),
            candidate(Some("100003"), None, "c", 0.6),
            candidate(Some("100004"), None, "d", 0.2),
        ];
        let alone = merger.merge(vec![(SearchMethod::Bm25, list.clone())]);
        let doubled = merger.merge(vec![
            (SearchMethod::GeneLookup, list.clone()),
            (SearchMethod::Bm25, list),
        ]);
        assert_eq!(ids(&alone), ids(&doubled));
        for (single, twice) in alone.iter().zip(&doubled) {
            let expected = (single.score * 2.0 * 1.1).min(1.0);
            assert!((twice.score - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn merged_scores_are_clamped() {
        let merger = CandidateMerger::default();
        let merged = merger.merge(vec![
            (SearchMethod::GeneLookup, vec![candidate(Some("1"), None, "x", 25.0)]),
            (
                SearchMethod::Bm25,
                vec![
                    candidate(Some("1"), None, "x", 40.0),
                    candidate(Some("2"), None, "y", 3.0),
                ],
            ),
        ]);
        assert!(merged.iter().all(|c| (0.0..=1.0).contains(&c.score)));
    }

    #[test]
    fn partial_ids_reconcile_and_genes_union() {
        let merger = CandidateMerger::default();
        let mut from_genes = candidate(Some("306700"), None, "Hemophilia A", 0.95);
        from_genes.genes = vec!["F8".into()];
        let mut from_text = candidate(Some("306700"), Some("MONDO:0010602"), "hemophilia A", 0.4);
        from_text.genes = vec!["F8".into(), "F8C".into()];
        let mondo_only = candidate(None, Some("MONDO:0010602"), "hemophilia A", 0.3);

        let merged = merger.merge(vec![
            (SearchMethod::GeneLookup, vec![from_genes]),
            (SearchMethod::Bm25, vec![from_text, mondo_only]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].omim_id.as_deref(), Some("306700"));
        assert_eq!(merged[0].mondo_id.as_deref(), Some("MONDO:0010602"));
        assert_eq!(merged[0].genes, vec!["F8", "F8C"]);
        assert_eq!(merged[0].match_details["method_scores"]["bm25"], 0.4);
    }

    #[test]
    fn name_keys_group_id_less_candidates() {
        let merger = CandidateMerger::default();
        let merged = merger.merge(vec![
            (SearchMethod::GeneLookup, vec![candidate(None, None, "Rare Thing", 0.5)]),
            (SearchMethod::Bm25, vec![candidate(None, None, "rare  thing", 0.5)]),
        ]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn distinct_omim_diseases_sharing_a_mondo_term_stay_apart() {
        let merger = CandidateMerger::default();
        let merged = merger.merge(vec![(
            SearchMethod::Bm25,
            vec![
                candidate(Some("100200"), Some("MONDO:0000111"), "ALPHA TYPE TWO DISORDER", 0.8),
                candidate(Some("100100"), Some("MONDO:0000111"), "ALPHA TYPE ONE DISORDER", 0.6),
            ],
        )]);
        assert_eq!(ids(&merged), vec!["OMIM:100200", "OMIM:100100"]);
        assert_eq!(merged[0].name, "ALPHA TYPE TWO DISORDER");
        assert!((merged[0].score - 0.8 * 0.4).abs() < 1e-12);
        assert!((merged[1].score - 0.6 * 0.4).abs() < 1e-12);
    }

    #[test]
    fn mondo_only_hit_joins_first_omim_twin_without_fusing_siblings() {
        let merger = CandidateMerger::default();
        let merged = merger.merge(vec![
            (
                SearchMethod::GeneLookup,
                vec![
                    candidate(Some("100100"), Some("MONDO:0000111"), "ALPHA TYPE ONE DISORDER", 0.95),
                    candidate(Some("100200"), Some("MONDO:0000111"), "ALPHA TYPE TWO DISORDER", 0.95),
                ],
            ),
            (
                SearchMethod::Bm25,
                vec![candidate(None, Some("MONDO:0000111"), "alpha type disorder", 0.5)],
            ),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].omim_id.as_deref(), Some("100100"));
        assert_eq!(merged[0].source, CandidateSource::Combined);
        assert_eq!(merged[1].omim_id.as_deref(), Some("100200"));
        assert_eq!(merged[1].source, CandidateSource::GeneLookup);
    }

    #[test]
    fn omim_hit_adopts_a_mondo_only_group() {
        let merger = CandidateMerger::default();
        let merged = merger.merge(vec![
            (
                SearchMethod::Bm25,
                vec![candidate(None, Some("MONDO:0009061"), "cystic fibrosis", 0.5)],
            ),
            (
                SearchMethod::GeneLookup,
                vec![
                    candidate(Some("219700"), Some("MONDO:0009061"), "CYSTIC FIBROSIS", 0.95),
                    candidate(Some("219701"), Some("MONDO:0009061"), "CF-LIKE DISORDER", 0.95),
                ],
            ),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].omim_id.as_deref(), Some("219700"));
        assert_eq!(merged[0].source, CandidateSource::Combined);
        assert_eq!(merged[1].omim_id.as_deref(), Some("219701"));
    }

    #[test]
    fn empty_input_merges_to_empty() {
        assert!(CandidateMerger::default().merge(Vec::new()).is_empty());
    }
}
