use serde::Serialize;
use serde_json::{Map, Value};

use crate::entities::disease::{Disease, DiseaseKey, Vocabulary};

/// Independent signal that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    GeneLookup,
    Bm25,
}

impl SearchMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GeneLookup => "gene_lookup",
            Self::Bm25 => "bm25",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    GeneLookup,
    Bm25,
    Combined,
}

impl From<SearchMethod> for CandidateSource {
    fn from(method: SearchMethod) -> Self {
        match method {
            SearchMethod::GeneLookup => Self::GeneLookup,
            SearchMethod::Bm25 => Self::Bm25,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiseaseCandidate {
    /// Bare OMIM number.
    pub omim_id: Option<String>,
    /// Prefixed MONDO id, e.g. `MONDO:0010679`.
    pub mondo_id: Option<String>,
    pub name: String,
    pub genes: Vec<String>,
    pub score: f64,
    pub source: CandidateSource,
    pub match_details: Map<String, Value>,
}

impl DiseaseCandidate {
    pub fn from_disease(disease: &Disease, score: f64, source: CandidateSource) -> Self {
        let (omim_id, mondo_id) = match disease.source {
            Vocabulary::Omim => (disease.id.omim_digits().map(str::to_string), None),
            Vocabulary::Mondo => (None, disease.id.mondo_curie()),
        };
        Self {
            omim_id,
            mondo_id,
            name: disease.name.clone(),
            genes: disease.genes.clone(),
            score,
            source,
            match_details: Map::new(),
        }
    }

    pub fn omim_key(&self) -> Option<DiseaseKey> {
        self.omim_id.as_deref().map(DiseaseKey::omim)
    }

    pub fn mondo_key(&self) -> Option<DiseaseKey> {
        self.mondo_id.as_deref().and_then(DiseaseKey::parse)
    }

    /// Grouping key: OMIM when known, else MONDO, else the case-folded name.
    pub fn key(&self) -> DiseaseKey {
        self.omim_key()
            .or_else(|| self.mondo_key())
            .unwrap_or_else(|| DiseaseKey::from_name(&self.name))
    }

    /// Every id-based key this candidate can be reached by.
    pub fn id_keys(&self) -> Vec<DiseaseKey> {
        self.omim_key().into_iter().chain(self.mondo_key()).collect()
    }

    pub fn has_gene(&self, symbol: &str) -> bool {
        let symbol = symbol.trim();
        !symbol.is_empty() && self.genes.iter().any(|g| g.eq_ignore_ascii_case(symbol))
    }

    /// Appends genes not already present, keeping first-seen order.
    pub fn union_genes<'a>(&mut self, genes: impl IntoIterator<Item = &'a String>) {
        for gene in genes {
            if !self.has_gene(gene) {
                self.genes.push(gene.clone());
            }
        }
    }

    pub fn set_detail(&mut self, key: &str, value: impl Into<Value>) {
        self.match_details.insert(key.to_string(), value.into());
    }

    /// Display form of the identifier the judge and logs refer to.
    pub fn display_id(&self) -> String {
        match (&self.omim_id, &self.mondo_id) {
            (Some(omim), _) => format!("OMIM:{omim}"),
            (None, Some(mondo)) => mondo.clone(),
            (None, None) => DiseaseKey::from_name(&self.name).to_string(),
        }
    }
}

/// Sorts by descending score; ties keep their incoming order.
pub(crate) fn sort_by_score_desc(candidates: &mut [DiseaseCandidate]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
}
