use crate::config::RankingSettings;
use crate::entities::candidate::{DiseaseCandidate, sort_by_score_desc};
use crate::entities::conflict::Conflict;

/// Penalizes candidates carrying a gene the judge flagged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConflictResolver {
    pub penalty_weight: f64,
}

impl From<&RankingSettings> for ConflictResolver {
    fn from(settings: &RankingSettings) -> Self {
        Self {
            penalty_weight: settings.conflict_penalty,
        }
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::from(&RankingSettings::default())
    }
}

impl ConflictResolver {
    /// `score * (1 - weight * max_severity)` for every candidate whose genes
    /// include a conflict's `found` gene, then re-sorts.
    ///
    /// Conflicts match by gene only, so every candidate sharing the flagged
    /// gene is penalized. Severities do not accumulate.
    pub fn apply(
        &self,
        mut candidates: Vec<DiseaseCandidate>,
        conflicts: &[Conflict],
    ) -> Vec<DiseaseCandidate> {
        if conflicts.is_empty() {
            return candidates;
        }

        for candidate in &mut candidates {
            let matching: Vec<f64> = conflicts
                .iter()
                .filter(|conflict| candidate.has_gene(&conflict.found))
                .map(|conflict| conflict.severity.clamp(0.0, 1.0))
                .collect();
            let Some(max_severity) = matching.iter().copied().reduce(f64::max) else {
                continue;
            };

            let penalty = self.penalty_weight * max_severity;
            candidate.score *= 1.0 - penalty;
            candidate.set_detail("conflict_penalty", penalty);
            candidate.set_detail("conflicts", matching.len());
        }

        sort_by_score_desc(&mut candidates);
        candidates
    }
}
