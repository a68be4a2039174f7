use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    GeneDiseaseMismatch,
    VariantGeneMismatch,
    RegionTypeConflict,
}

impl ConflictType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "gene_disease_mismatch" => Some(Self::GeneDiseaseMismatch),
            "variant_gene_mismatch" => Some(Self::VariantGeneMismatch),
            "region_type_conflict" => Some(Self::RegionTypeConflict),
            _ => None,
        }
    }
}

/// A problem the judge found between the query's genetic evidence and a candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    #[serde(rename = "type")]
    pub kind: ConflictType,
    /// Within [0, 1].
    pub severity: f64,
    /// Offending gene or value.
    pub found: String,
    pub expected: Vec<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_hint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tolerates_spelling_variants() {
        assert_eq!(
            ConflictType::parse("gene_disease_mismatch"),
            Some(ConflictType::GeneDiseaseMismatch)
        );
        assert_eq!(
            ConflictType::parse("Variant-Gene Mismatch"),
            Some(ConflictType::VariantGeneMismatch)
        );
        assert_eq!(ConflictType::parse("phenotype_gap"), None);
    }

    #[test]
    fn serializes_kind_as_type() {
        let conflict = Conflict {
            kind: ConflictType::RegionTypeConflict,
            severity: 0.4,
            found: "F8".into(),
            expected: vec!["F9".into()],
            message: "intergenic variant".into(),
            resolution_hint: None,
        };
        let json = serde_json::to_value(&conflict).expect("json");
        assert_eq!(json["type"], "region_type_conflict");
        assert!(json.get("resolution_hint").is_none());
    }
}
