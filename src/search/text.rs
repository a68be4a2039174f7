//! Normalization shared by the lexical index, its queries and gene matching.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

// Common clinical abbreviations. Two-letter forms that collide with English
// words in upper-case OMIM titles (AS, AT, AN, ID, ...) are left out.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("DMD", "Duchenne muscular dystrophy"),
    ("BMD", "Becker muscular dystrophy"),
    ("SMA", "spinal muscular atrophy"),
    ("ALS", "amyotrophic lateral sclerosis"),
    ("CMT", "Charcot-Marie-Tooth"),
    ("LGMD", "limb-girdle muscular dystrophy"),
    ("FSHD", "facioscapulohumeral dystrophy"),
    ("DM", "myotonic dystrophy"),
    ("CMD", "congenital muscular dystrophy"),
    ("EDMD", "Emery-Dreifuss muscular dystrophy"),
    ("OPMD", "oculopharyngeal muscular dystrophy"),
    ("CF", "cystic fibrosis"),
    ("HD", "Huntington disease"),
    ("PD", "Parkinson disease"),
    ("AD", "Alzheimer disease"),
    ("MS", "multiple sclerosis"),
    ("MD", "muscular dystrophy"),
    ("CP", "cerebral palsy"),
    ("DS", "Down syndrome"),
    ("FXS", "fragile X syndrome"),
    ("PWS", "Prader-Willi syndrome"),
    ("TSC", "tuberous sclerosis complex"),
    ("NF", "neurofibromatosis"),
    ("VHL", "von Hippel-Lindau"),
    ("MEN", "multiple endocrine neoplasia"),
    ("FAP", "familial adenomatous polyposis"),
    ("HNPCC", "hereditary nonpolyposis colorectal cancer"),
    ("PKD", "polycystic kidney disease"),
    ("SCD", "sickle cell disease"),
    ("SCID", "severe combined immunodeficiency"),
    ("CGD", "chronic granulomatous disease"),
    ("XLA", "X-linked agammaglobulinemia"),
    ("CVID", "common variable immunodeficiency"),
    ("DiGS", "DiGeorge syndrome"),
    ("FA", "Fanconi anemia"),
    ("BS", "Bloom syndrome"),
    ("XP", "xeroderma pigmentosum"),
    ("ARVC", "arrhythmogenic right ventricular cardiomyopathy"),
    ("HCM", "hypertrophic cardiomyopathy"),
    ("DCM", "dilated cardiomyopathy"),
    ("LQTS", "long QT syndrome"),
    ("CPVT", "catecholaminergic polymorphic ventricular tachycardia"),
    ("WPW", "Wolff-Parkinson-White syndrome"),
    ("MVP", "mitral valve prolapse"),
    ("BAV", "bicuspid aortic valve"),
    ("PDA", "patent ductus arteriosus"),
    ("VSD", "ventricular septal defect"),
    ("ASD", "atrial septal defect"),
    ("TOF", "tetralogy of Fallot"),
    ("TGA", "transposition of great arteries"),
    ("HLHS", "hypoplastic left heart syndrome"),
    ("OI", "osteogenesis imperfecta"),
    ("EDS", "Ehlers-Danlos syndrome"),
    ("MFS", "Marfan syndrome"),
    ("ACH", "achondroplasia"),
    ("RA", "rheumatoid arthritis"),
    ("SLE", "systemic lupus erythematosus"),
    ("JIA", "juvenile idiopathic arthritis"),
    ("FMF", "familial Mediterranean fever"),
    ("CAPS", "cryopyrin-associated periodic syndromes"),
    ("TRAPS", "TNF receptor-associated periodic syndrome"),
    ("MKD", "mevalonate kinase deficiency"),
    ("T1D", "type 1 diabetes"),
    ("T2D", "type 2 diabetes"),
    ("MODY", "maturity-onset diabetes of the young"),
    ("DI", "diabetes insipidus"),
    ("CAH", "congenital adrenal hyperplasia"),
    ("GHD", "growth hormone deficiency"),
    ("PHP", "pseudohypoparathyroidism"),
    ("MTC", "medullary thyroid carcinoma"),
    ("IBD", "inflammatory bowel disease"),
    ("UC", "ulcerative colitis"),
    ("PBC", "primary biliary cholangitis"),
    ("PSC", "primary sclerosing cholangitis"),
    ("HCC", "hepatocellular carcinoma"),
    ("AML", "acute myeloid leukemia"),
    ("CLL", "chronic lymphocytic leukemia"),
    ("CML", "chronic myeloid leukemia"),
    ("MM", "multiple myeloma"),
    ("NHL", "non-Hodgkin lymphoma"),
    ("MDS", "myelodysplastic syndrome"),
    ("PV", "polycythemia vera"),
    ("PMF", "primary myelofibrosis"),
    ("ITP", "immune thrombocytopenic purpura"),
    ("TTP", "thrombotic thrombocytopenic purpura"),
    ("HUS", "hemolytic uremic syndrome"),
    ("VWD", "von Willebrand disease"),
    ("IPF", "idiopathic pulmonary fibrosis"),
    ("COPD", "chronic obstructive pulmonary disease"),
    ("LAM", "lymphangioleiomyomatosis"),
    ("CKD", "chronic kidney disease"),
    ("FSGS", "focal segmental glomerulosclerosis"),
    ("IgAN", "IgA nephropathy"),
    ("PCOS", "polycystic ovary syndrome"),
    ("POF", "premature ovarian failure"),
    ("ADHD", "attention deficit hyperactivity disorder"),
    ("GBM", "glioblastoma multiforme"),
    ("DIPG", "diffuse intrinsic pontine glioma"),
];

fn abbreviations() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| ABBREVIATIONS.iter().copied().collect())
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Za-z][A-Za-z0-9]*\b").expect("valid regex"))
}

fn punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s\-]").expect("valid regex"))
}

fn trailing_parenthetical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\([^)]*\)\s*$").expect("valid regex"))
}

fn trailing_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\s*,\s*\d+|\s+\d{6})\s*$").expect("valid regex"))
}

fn trailing_separators_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[;,\s]+$").expect("valid regex"))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Expands upper-case clinical abbreviations (`DMD` → `Duchenne muscular dystrophy`).
pub fn expand_abbreviations(text: &str) -> String {
    let map = abbreviations();
    word_re()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let word = &caps[0];
            map.get(word).map_or_else(|| word.to_string(), |full| (*full).to_string())
        })
        .into_owned()
}

/// Strips a trailing parenthetical, a trailing MIM-style numeric code and
/// trailing separators. Disease numbers such as `type 2` or `failure 24` stay.
pub fn clean_disease_name(text: &str) -> String {
    let text = trailing_parenthetical_re().replace(text, "");
    let text = trailing_code_re().replace(&text, "");
    let text = trailing_separators_re().replace(&text, "");
    collapse_whitespace(&text)
}

/// Abbreviation expansion, lower-casing, punctuation (except hyphens) to spaces.
pub fn preprocess(text: &str) -> String {
    let expanded = expand_abbreviations(text).to_lowercase();
    let stripped = punctuation_re().replace_all(&expanded, " ");
    collapse_whitespace(&stripped)
}

/// Upper-case, keep only `[A-Z0-9-]`.
pub fn normalize_gene_symbol(symbol: &str) -> String {
    symbol
        .trim()
        .to_ascii_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

/// Lower-cased whitespace tokens; the shared tokenizer for documents and queries.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Case- and whitespace-insensitive form used for exact-name comparisons.
pub fn fold_name(text: &str) -> String {
    collapse_whitespace(&text.to_lowercase())
}
