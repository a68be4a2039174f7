//! Gene coordinate windows used to place variants relative to genes.

use std::io::BufRead;
use std::path::Path;

use tracing::warn;

use crate::error::MatcherError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Plus,
    Minus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneWindow {
    pub symbol: String,
    /// Chromosome without `chr` prefix.
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
}

// GRCh38 spans for genes that dominate clinical-genetics requests.
const BUILTIN_WINDOWS: &[(&str, &str, u64, u64, Strand)] = &[
    ("DMD", "X", 31_137_344, 33_229_673, Strand::Minus),
    ("F8", "X", 154_250_998, 154_426_786, Strand::Minus),
    ("F9", "X", 138_612_889, 138_643_668, Strand::Plus),
    ("BRCA1", "17", 43_044_294, 43_125_483, Strand::Minus),
    ("BRCA2", "13", 32_315_507, 32_400_266, Strand::Plus),
    ("APP", "21", 25_880_253, 26_170_538, Strand::Minus),
    ("CFTR", "7", 117_480_095, 117_667_689, Strand::Plus),
    ("HBB", "11", 5_225_464, 5_227_071, Strand::Minus),
    ("PAH", "12", 102_958_306, 103_087_319, Strand::Minus),
    ("FBN1", "15", 48_408_313, 48_645_708, Strand::Minus),
    ("NF1", "17", 31_094_927, 31_377_677, Strand::Plus),
    ("COL3A1", "2", 188_974_372, 189_012_746, Strand::Plus),
    ("TP53", "17", 7_668_402, 7_687_550, Strand::Minus),
    ("MLH1", "3", 36_993_365, 37_050_845, Strand::Plus),
    ("MSH2", "2", 47_403_067, 47_483_140, Strand::Plus),
    ("APC", "5", 112_707_498, 112_846_239, Strand::Plus),
    ("PTEN", "10", 87_863_113, 87_971_930, Strand::Plus),
    ("RB1", "13", 48_303_747, 48_481_890, Strand::Plus),
    ("VHL", "3", 10_141_722, 10_153_668, Strand::Plus),
    ("SMN1", "5", 70_924_941, 70_953_015, Strand::Plus),
];

pub fn builtin_windows() -> Vec<GeneWindow> {
    BUILTIN_WINDOWS
        .iter()
        .map(|(symbol, chromosome, start, end, strand)| GeneWindow {
            symbol: (*symbol).to_string(),
            chromosome: (*chromosome).to_string(),
            start: *start,
            end: *end,
            strand: *strand,
        })
        .collect()
}

fn parse_strand(raw: &str) -> Option<Strand> {
    match raw.trim() {
        "+" | "1" | "plus" => Some(Strand::Plus),
        "-" | "-1" | "minus" => Some(Strand::Minus),
        _ => None,
    }
}

fn parse_window_row(cols: &[&str]) -> Option<GeneWindow> {
    let [symbol, chromosome, start, end, strand, ..] = cols else {
        return None;
    };
    let start = start.parse::<u64>().ok()?;
    let end = end.parse::<u64>().ok()?;
    if start > end || symbol.is_empty() {
        return None;
    }
    Some(GeneWindow {
        symbol: symbol.to_ascii_uppercase(),
        chromosome: chromosome
            .trim_start_matches("chr")
            .trim_start_matches("CHR")
            .to_ascii_uppercase(),
        start,
        end,
        strand: parse_strand(strand)?,
    })
}

/// Parses `symbol  chromosome  start  end  strand` rows (tab separated, `#` comments).
pub fn parse_windows(reader: impl BufRead) -> Result<Vec<GeneWindow>, MatcherError> {
    let mut windows = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cols: Vec<&str> = line.split('\t').map(str::trim).collect();
        let parsed = parse_window_row(&cols);
        match parsed {
            Some(window) => windows.push(window),
            None => warn!(line = line_no + 1, "Skipping malformed gene coordinate row"),
        }
    }
    Ok(windows)
}

pub fn load_windows(path: &Path) -> Result<Vec<GeneWindow>, MatcherError> {
    let file = std::fs::File::open(path).map_err(|err| MatcherError::Dataset {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    parse_windows(std::io::BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_covers_common_genes() {
        let windows = builtin_windows();
        assert_eq!(windows.len(), 20);
        let dmd = windows.iter().find(|w| w.symbol == "DMD").expect("DMD");
        assert_eq!(dmd.chromosome, "X");
        assert_eq!(dmd.strand, Strand::Minus);
        assert!(windows.iter().all(|w| w.start < w.end));
    }

    #[test]
    fn parse_windows_skips_comments_and_malformed_rows() {
        let tsv = "# symbol\tchr\tstart\tend\tstrand\n\
                   GAA\tchr17\t80101526\t80119881\t+\n\
                   BROKEN\t1\tabc\t10\t+\n\
                   HEXA\t15\t72340924\t72375971\t-\n";
        let windows = parse_windows(tsv.as_bytes()).expect("parse");
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].symbol, "GAA");
        assert_eq!(windows[0].chromosome, "17");
        assert_eq!(windows[1].strand, Strand::Minus);
    }
}
