//! OMIM flat-file parsers (`mimTitles.txt`, `genemap2.txt`).

use std::io::BufRead;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::error::MatcherError;

const GENEMAP_MIN_COLUMNS: usize = 13;
const GENEMAP_MIM_COL: usize = 5;
const GENEMAP_SYMBOLS_COL: usize = 6;
const GENEMAP_APPROVED_COL: usize = 8;
const GENEMAP_PHENOTYPES_COL: usize = 12;

/// Phenotype entries in `mimTitles.txt` (`#` and `%` prefixes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimTitle {
    pub mim_number: String,
    pub preferred_title: String,
    /// Symbol following the preferred title, e.g. `DMD` in `...; DMD`.
    pub preferred_symbol: Option<String>,
    pub alternative_titles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenemapPhenotype {
    pub name: String,
    pub mim_number: String,
    pub mapping_key: Option<u8>,
    pub inheritance: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenemapRow {
    pub gene_mim_number: String,
    /// Raw symbols as listed by OMIM, upper-cased.
    pub gene_symbols: Vec<String>,
    pub approved_symbol: Option<String>,
    pub phenotypes: Vec<GenemapPhenotype>,
}

impl GenemapRow {
    /// Approved symbol first, then every raw symbol not equal to it.
    pub fn all_symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for symbol in self.approved_symbol.iter().chain(self.gene_symbols.iter()) {
            if !out.contains(symbol) {
                out.push(symbol.clone());
            }
        }
        out
    }
}

fn phenotype_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<name>.+?),\s*(?P<mim>\d{6})\s*\((?P<key>\d)\)(?:\s*,\s*(?P<inh>.+))?$")
            .expect("valid regex")
    })
}

fn alt_title_trailer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[;,]\s*$").expect("valid regex"))
}

fn split_columns(line: &str) -> Vec<&str> {
    line.trim_end_matches(['\n', '\r']).split('\t').collect()
}

fn strip_markers(name: &str) -> String {
    name.trim()
        .trim_matches(|c| matches!(c, '{' | '}' | '[' | ']' | '?'))
        .trim()
        .to_string()
}

/// Parses the phenotype column of one genemap2 row.
///
/// Entries without a six-digit phenotype MIM number are skipped; the gene's
/// own MIM number is never used as a disease id.
pub fn parse_phenotypes(field: &str) -> Vec<GenemapPhenotype> {
    field
        .split(';')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .filter_map(|piece| {
            let caps = phenotype_re().captures(piece)?;
            let name = strip_markers(caps.name("name")?.as_str());
            if name.is_empty() {
                return None;
            }
            Some(GenemapPhenotype {
                name,
                mim_number: caps.name("mim")?.as_str().to_string(),
                mapping_key: caps.name("key").and_then(|m| m.as_str().parse().ok()),
                inheritance: caps
                    .name("inh")
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|s| !s.is_empty()),
            })
        })
        .collect()
}

pub fn parse_mim_titles(reader: impl BufRead) -> Result<Vec<MimTitle>, MatcherError> {
    let mut titles = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let cols = split_columns(&line);
        if cols.len() < 3 {
            continue;
        }
        if !matches!(cols[0].trim(), "Number Sign" | "Percent") {
            continue;
        }

        let mim_number = cols[1].trim();
        if mim_number.is_empty() || !mim_number.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        let mut preferred = cols[2].splitn(2, ';');
        let preferred_title = preferred.next().unwrap_or_default().trim().to_string();
        if preferred_title.is_empty() {
            continue;
        }
        let preferred_symbol = preferred
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let alternative_titles = cols
            .get(3)
            .map(|raw| {
                let raw = alt_title_trailer_re().replace(raw, "");
                raw.split(';')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        titles.push(MimTitle {
            mim_number: mim_number.to_string(),
            preferred_title,
            preferred_symbol,
            alternative_titles,
        });
    }
    Ok(titles)
}

pub fn parse_genemap(reader: impl BufRead) -> Result<Vec<GenemapRow>, MatcherError> {
    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for line in reader.lines() {
        let line = line?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let cols = split_columns(&line);
        if cols.len() < GENEMAP_MIN_COLUMNS {
            skipped += 1;
            continue;
        }

        let phenotypes = parse_phenotypes(cols[GENEMAP_PHENOTYPES_COL]);
        if phenotypes.is_empty() {
            continue;
        }

        let gene_symbols: Vec<String> = cols[GENEMAP_SYMBOLS_COL]
            .split([',', ';'])
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        let approved_symbol = Some(cols[GENEMAP_APPROVED_COL].trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty());

        rows.push(GenemapRow {
            gene_mim_number: cols[GENEMAP_MIM_COL].trim().to_string(),
            gene_symbols,
            approved_symbol,
            phenotypes,
        });
    }
    if skipped > 0 {
        debug!(skipped, "genemap2 rows with too few columns");
    }
    Ok(rows)
}
