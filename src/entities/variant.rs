use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::sources::gene_coords::{GeneWindow, Strand};

const GENE_WINDOW_BP: u64 = 5_000;
const PROMOTER_BP: u64 = 2_000;

/// A parsed single-nucleotide genomic coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantInfo {
    /// `1`..`22`, `X` or `Y`, no `chr` prefix.
    pub chromosome: String,
    pub position: u64,
    pub reference: String,
    pub alternative: String,
}

impl fmt::Display for VariantInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}>{}",
            self.chromosome, self.position, self.reference, self.alternative
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionType {
    Exonic,
    Intronic,
    Promoter,
    Utr,
    Intergenic,
    Unknown,
}

impl RegionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exonic => "exonic",
            Self::Intronic => "intronic",
            Self::Promoter => "promoter",
            Self::Utr => "utr",
            Self::Intergenic => "intergenic",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantAnnotation {
    pub variant: VariantInfo,
    /// Nearest first.
    pub genes: Vec<String>,
    pub region_type: RegionType,
    /// Base pairs to the nearest gene; 0 inside a gene, `None` when no gene is near.
    pub distance_to_gene: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functional_impact: Option<String>,
}

impl VariantAnnotation {
    pub fn primary_gene(&self) -> Option<&str> {
        self.genes.first().map(String::as_str)
    }
}

const CHROM: &str = r"(?:chr)?([0-9]{1,2}|X|Y)";

fn colon_dash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)^{CHROM}:(\d+)-([ACGT])>([ACGT])$")).expect("valid regex")
    })
}

fn all_colons_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)^{CHROM}:(\d+):([ACGT]):([ACGT])$")).expect("valid regex")
    })
}

fn hgvs_genomic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)^{CHROM}:g\.(\d+)([ACGT])>([ACGT])$")).expect("valid regex")
    })
}

fn flexible_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)^{CHROM}[:_](\d+)[:_\-]([ACGT])[>:/]([ACGT])$"))
            .expect("valid regex")
    })
}

/// Parses a coordinate such as `chrX:31200000-C>T`, `X:31200000:C:T`,
/// `X:g.31200000C>T` or `X_31200000_C/T`.
///
/// Returns `None` for anything else; a malformed coordinate is not an error.
pub fn parse_variant(raw: &str) -> Option<VariantInfo> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let caps = [colon_dash_re(), all_colons_re(), hgvs_genomic_re(), flexible_re()]
        .into_iter()
        .find_map(|re| re.captures(raw))?;

    let chromosome = caps.get(1)?.as_str().to_ascii_uppercase();
    if let Ok(n) = chromosome.parse::<u8>() {
        if !(1..=22).contains(&n) {
            return None;
        }
    }
    let position = caps.get(2)?.as_str().parse::<u64>().ok()?;
    if position == 0 {
        return None;
    }

    Some(VariantInfo {
        chromosome: chromosome.trim_start_matches('0').to_string(),
        position,
        reference: caps.get(3)?.as_str().to_ascii_uppercase(),
        alternative: caps.get(4)?.as_str().to_ascii_uppercase(),
    })
}

/// Places variants relative to a table of gene windows.
///
/// Without an exon model every in-gene position is reported as exonic.
#[derive(Debug, Clone)]
pub struct VariantAnnotator {
    windows: Vec<GeneWindow>,
}

impl VariantAnnotator {
    pub fn new(windows: Vec<GeneWindow>) -> Self {
        Self { windows }
    }

    pub fn gene_count(&self) -> usize {
        self.windows.len()
    }

    /// Genes whose window (±5 kb) covers the position, nearest first.
    pub fn genes_near(&self, variant: &VariantInfo) -> Vec<(&GeneWindow, u64)> {
        let mut hits: Vec<(&GeneWindow, u64)> = self
            .windows
            .iter()
            .filter(|w| w.chromosome.eq_ignore_ascii_case(&variant.chromosome))
            .filter(|w| {
                variant.position.saturating_add(GENE_WINDOW_BP) >= w.start
                    && variant.position <= w.end.saturating_add(GENE_WINDOW_BP)
            })
            .map(|w| (w, distance(w, variant.position)))
            .collect();
        hits.sort_by_key(|(_, d)| *d);
        hits
    }

    pub fn annotate(&self, variant: VariantInfo) -> VariantAnnotation {
        let hits = self.genes_near(&variant);
        let Some((nearest, distance)) = hits.first().map(|(w, d)| (*w, *d)) else {
            debug!(variant = %variant, "No gene within window");
            return VariantAnnotation {
                variant,
                genes: Vec::new(),
                region_type: RegionType::Intergenic,
                distance_to_gene: None,
                functional_impact: None,
            };
        };

        let region_type = if distance == 0 {
            RegionType::Exonic
        } else if distance <= PROMOTER_BP && is_upstream(nearest, variant.position) {
            RegionType::Promoter
        } else {
            RegionType::Intergenic
        };
        let genes = hits.iter().map(|(w, _)| w.symbol.clone()).collect();

        VariantAnnotation {
            variant,
            genes,
            region_type,
            distance_to_gene: Some(distance),
            functional_impact: None,
        }
    }

    /// Parses and annotates in one step; unparseable input yields `None`.
    pub fn annotate_str(&self, raw: &str) -> Option<VariantAnnotation> {
        match parse_variant(raw) {
            Some(variant) => Some(self.annotate(variant)),
            None => {
                warn!(coordinates = raw, "Unparseable variant coordinates; skipping annotation");
                None
            }
        }
    }
}

fn distance(window: &GeneWindow, position: u64) -> u64 {
    if position < window.start {
        window.start - position
    } else if position > window.end {
        position - window.end
    } else {
        0
    }
}

fn is_upstream(window: &GeneWindow, position: u64) -> bool {
    match window.strand {
        Strand::Plus => position < window.start,
        Strand::Minus => position > window.end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::gene_coords::builtin_windows;

    fn variant(chromosome: &str, position: u64) -> VariantInfo {
        VariantInfo {
            chromosome: chromosome.into(),
            position,
            reference: "C".into(),
            alternative: "T".into(),
        }
    }

    #[test]
    fn all_accepted_formats_parse_to_the_same_variant() {
        let expected = variant("X", 31_200_000);
        for raw in [
            "chrX:31200000-C>T",
            "X:31200000:C:T",
            "chrX:g.31200000C>T",
            "X_31200000_C/T",
            "x:31200000-c>t",
        ] {
            assert_eq!(parse_variant(raw), Some(expected.clone()), "{raw}");
        }
    }

    #[test]
    fn rejects_malformed_coordinates() {
        for raw in [
            "",
            "chr23:100-A>G",
            "chrX:100-A>N",
            "chrX:100",
            "BRCA1 c.68_69del",
            "chrX:0-A>G",
        ] {
            assert_eq!(parse_variant(raw), None, "{raw}");
        }
    }

    #[test]
    fn display_uses_compact_notation() {
        assert_eq!(variant("17", 43_050_000).to_string(), "17:43050000:C>T");
    }

    #[test]
    fn inside_gene_is_exonic_with_zero_distance() {
        let annotator = VariantAnnotator::new(builtin_windows());
        let annotation = annotator.annotate(variant("X", 31_500_000));
        assert_eq!(annotation.genes, vec!["DMD"]);
        assert_eq!(annotation.region_type, RegionType::Exonic);
        assert_eq!(annotation.distance_to_gene, Some(0));
        assert_eq!(annotation.primary_gene(), Some("DMD"));
    }

    #[test]
    fn upstream_of_plus_strand_gene_is_promoter() {
        let annotator = VariantAnnotator::new(builtin_windows());
        // CFTR starts at 117,480,095 on the plus strand.
        let annotation = annotator.annotate(variant("7", 117_479_000));
        assert_eq!(annotation.genes, vec!["CFTR"]);
        assert_eq!(annotation.region_type, RegionType::Promoter);
        assert_eq!(annotation.distance_to_gene, Some(1_095));
    }

    #[test]
    fn downstream_of_plus_strand_gene_is_intergenic() {
        let annotator = VariantAnnotator::new(builtin_windows());
        let annotation = annotator.annotate(variant("7", 117_668_689));
        assert_eq!(annotation.region_type, RegionType::Intergenic);
        assert_eq!(annotation.distance_to_gene, Some(1_000));
    }

    #[test]
    fn upstream_of_minus_strand_gene_is_promoter() {
        let annotator = VariantAnnotator::new(builtin_windows());
        // DMD ends at 33,229,673 on the minus strand; its promoter lies above.
        let annotation = annotator.annotate(variant("X", 33_230_673));
        assert_eq!(annotation.region_type, RegionType::Promoter);
    }

    #[test]
    fn far_from_any_gene_is_intergenic_without_genes() {
        let annotator = VariantAnnotator::new(builtin_windows());
        let annotation = annotator.annotate(variant("1", 1_000));
        assert!(annotation.genes.is_empty());
        assert_eq!(annotation.region_type, RegionType::Intergenic);
        assert_eq!(annotation.distance_to_gene, None);
    }

    #[test]
    fn annotate_str_ignores_garbage() {
        let annotator = VariantAnnotator::new(builtin_windows());
        assert!(annotator.annotate_str("not a variant").is_none());
        assert!(annotator.annotate_str("chr17:43050000-A>G").is_some());
    }
}
