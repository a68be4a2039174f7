use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

/// Identity of a disease across the two reference vocabularies.
///
/// `Name` only appears for candidates that carry neither id; the registry
/// never stores name-keyed records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiseaseKey {
    Omim(String),
    Mondo(String),
    Name(String),
}

impl DiseaseKey {
    pub fn omim(digits: &str) -> Self {
        Self::Omim(digits.trim().to_string())
    }

    pub fn mondo(digits: &str) -> Self {
        Self::Mondo(digits.trim().to_string())
    }

    /// Case-folded, whitespace-collapsed name key.
    pub fn from_name(name: &str) -> Self {
        let folded = name
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");
        Self::Name(folded)
    }

    /// Parses `OMIM:123456`, `MIM:123456`, `MONDO:0000001`, `MONDO_0000001`
    /// or a bare six-digit OMIM number. Case and inner whitespace are ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        let compact: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| if c == '_' { ':' } else { c.to_ascii_uppercase() })
            .collect();
        if compact.is_empty() {
            return None;
        }

        let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

        if let Some(rest) = compact
            .strip_prefix("OMIM:")
            .or_else(|| compact.strip_prefix("MIM:"))
        {
            return all_digits(rest).then(|| Self::omim(rest));
        }
        if let Some(rest) = compact.strip_prefix("MONDO:") {
            return all_digits(rest).then(|| Self::mondo(rest));
        }
        if all_digits(&compact) && compact.len() == 6 {
            return Some(Self::omim(&compact));
        }
        None
    }

    /// The bare OMIM number, when this is an OMIM key.
    pub fn omim_digits(&self) -> Option<&str> {
        match self {
            Self::Omim(digits) => Some(digits),
            _ => None,
        }
    }

    /// The prefixed MONDO id (`MONDO:0000001`), when this is a MONDO key.
    pub fn mondo_curie(&self) -> Option<String> {
        match self {
            Self::Mondo(digits) => Some(format!("MONDO:{digits}")),
            _ => None,
        }
    }
}

impl fmt::Display for DiseaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Omim(digits) => write!(f, "OMIM:{digits}"),
            Self::Mondo(digits) => write!(f, "MONDO:{digits}"),
            Self::Name(name) => write!(f, "NAME:{name}"),
        }
    }
}

impl Serialize for DiseaseKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vocabulary {
    Omim,
    Mondo,
}

#[derive(Debug, Clone, Serialize)]
pub struct Disease {
    pub id: DiseaseKey,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternative_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exact_synonyms: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_synonyms: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subsets: Vec<String>,
    pub genes: Vec<String>,
    pub source: Vocabulary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_reference: Option<DiseaseKey>,
}

impl Disease {
    pub fn new(id: DiseaseKey, name: impl Into<String>, source: Vocabulary) -> Self {
        Self {
            id,
            name: name.into(),
            alternative_names: Vec::new(),
            exact_synonyms: Vec::new(),
            related_synonyms: Vec::new(),
            subsets: Vec::new(),
            genes: Vec::new(),
            source,
            cross_reference: None,
        }
    }

    /// Adds an upper-cased gene symbol, keeping first-seen order.
    pub fn add_gene(&mut self, symbol: &str) {
        let symbol = symbol.trim().to_ascii_uppercase();
        if !symbol.is_empty() && !self.genes.contains(&symbol) {
            self.genes.push(symbol);
        }
    }

    pub fn has_gene(&self, symbol: &str) -> bool {
        self.genes.iter().any(|g| g.eq_ignore_ascii_case(symbol.trim()))
    }

    /// Name plus every synonym tier, in display-priority order.
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(self.alternative_names.iter().map(String::as_str))
            .chain(self.exact_synonyms.iter().map(String::as_str))
            .chain(self.related_synonyms.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_common_spellings() {
        assert_eq!(DiseaseKey::parse("OMIM:310200"), Some(DiseaseKey::omim("310200")));
        assert_eq!(DiseaseKey::parse("omim: 310200"), Some(DiseaseKey::omim("310200")));
        assert_eq!(DiseaseKey::parse("MIM:310200"), Some(DiseaseKey::omim("310200")));
        assert_eq!(DiseaseKey::parse("310200"), Some(DiseaseKey::omim("310200")));
        assert_eq!(
            DiseaseKey::parse("MONDO_0010679"),
            Some(DiseaseKey::mondo("0010679"))
        );
        assert_eq!(
            DiseaseKey::parse("mondo:0010679"),
            Some(DiseaseKey::mondo("0010679"))
        );
        assert_eq!(DiseaseKey::parse("MONDO:"), None);
        assert_eq!(DiseaseKey::parse("12345"), None);
        assert_eq!(DiseaseKey::parse("Duchenne"), None);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for key in [DiseaseKey::omim("310200"), DiseaseKey::mondo("0010679")] {
            assert_eq!(DiseaseKey::parse(&key.to_string()), Some(key));
        }
    }

    #[test]
    fn name_keys_fold_case_and_whitespace() {
        assert_eq!(
            DiseaseKey::from_name("  Duchenne   Muscular dystrophy "),
            DiseaseKey::from_name("duchenne muscular DYSTROPHY")
        );
        assert_ne!(
            DiseaseKey::from_name("Becker muscular dystrophy"),
            DiseaseKey::from_name("Duchenne muscular dystrophy")
        );
    }

    #[test]
    fn keys_of_different_vocabularies_never_collide() {
        assert_ne!(DiseaseKey::omim("0010679"), DiseaseKey::mondo("0010679"));
        assert!(DiseaseKey::omim("1") < DiseaseKey::mondo("1"));
        assert!(DiseaseKey::mondo("1") < DiseaseKey::from_name("a"));
    }

    #[test]
    fn add_gene_upper_cases_and_dedupes() {
        let mut disease = Disease::new(
            DiseaseKey::omim("310200"),
            "Duchenne muscular dystrophy",
            Vocabulary::Omim,
        );
        disease.add_gene("dmd");
        disease.add_gene("DMD");
        disease.add_gene(" ");
        assert_eq!(disease.genes, vec!["DMD"]);
        assert!(disease.has_gene("Dmd"));
    }

    #[test]
    fn serializes_key_as_prefixed_string() {
        let json = serde_json::to_value(DiseaseKey::mondo("0010679")).expect("json");
        assert_eq!(json, serde_json::json!("MONDO:0010679"));
    }
}
