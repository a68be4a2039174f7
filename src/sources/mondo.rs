//! MONDO ontology readers: obographs JSON (preferred) and OBO (fallback).

use std::io::{BufRead, Read};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::MatcherError;

const MONDO_IRI_PREFIX: &str = "http://purl.obolibrary.org/obo/MONDO_";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MondoTerm {
    /// Digits only, e.g. `0010679`.
    pub id: String,
    pub name: String,
    pub exact_synonyms: Vec<String>,
    pub related_synonyms: Vec<String>,
    /// Narrow, broad and untyped synonyms.
    pub other_synonyms: Vec<String>,
    pub subsets: Vec<String>,
    /// OMIM numbers from `OMIM:` xrefs, digits only.
    pub omim_xrefs: Vec<String>,
}

impl MondoTerm {
    fn push_synonym(&mut self, kind: SynonymKind, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        let bucket = match kind {
            SynonymKind::Exact => &mut self.exact_synonyms,
            SynonymKind::Related => &mut self.related_synonyms,
            SynonymKind::Other => &mut self.other_synonyms,
        };
        if !bucket.iter().any(|s| s == value) {
            bucket.push(value.to_string());
        }
    }

    fn push_xref(&mut self, xref: &str) {
        let Some(omim) = xref.trim().strip_prefix("OMIM:") else {
            return;
        };
        let omim = omim.split_whitespace().next().unwrap_or_default();
        if !omim.is_empty()
            && omim.chars().all(|c| c.is_ascii_digit())
            && !self.omim_xrefs.iter().any(|x| x == omim)
        {
            self.omim_xrefs.push(omim.to_string());
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SynonymKind {
    Exact,
    Related,
    Other,
}

impl SynonymKind {
    fn from_pred(pred: &str) -> Self {
        if pred.contains("hasExactSynonym") {
            Self::Exact
        } else if pred.contains("hasRelatedSynonym") {
            Self::Related
        } else {
            Self::Other
        }
    }

    fn from_obo_scope(scope: &str) -> Self {
        match scope {
            "EXACT" => Self::Exact,
            "RELATED" => Self::Related,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ObographDocument {
    #[serde(default)]
    graphs: Vec<ObographGraph>,
}

#[derive(Debug, Deserialize)]
struct ObographGraph {
    #[serde(default)]
    nodes: Vec<ObographNode>,
}

#[derive(Debug, Deserialize)]
struct ObographNode {
    id: String,
    #[serde(default)]
    lbl: Option<String>,
    #[serde(default)]
    meta: Option<ObographMeta>,
}

#[derive(Debug, Default, Deserialize)]
struct ObographMeta {
    #[serde(default)]
    synonyms: Vec<ObographSynonym>,
    #[serde(default)]
    xrefs: Vec<ObographXref>,
    #[serde(default)]
    subsets: Vec<String>,
    #[serde(default)]
    deprecated: bool,
}

#[derive(Debug, Deserialize)]
struct ObographSynonym {
    #[serde(default)]
    pred: String,
    val: String,
}

#[derive(Debug, Deserialize)]
struct ObographXref {
    val: String,
}

fn is_obsolete_name(name: &str) -> bool {
    name.trim_start().to_ascii_lowercase().starts_with("obsolete")
}

fn subset_name(raw: &str) -> String {
    raw.rsplit(['/', '#']).next().unwrap_or(raw).to_string()
}

pub fn parse_mondo_json(reader: impl Read) -> Result<Vec<MondoTerm>, MatcherError> {
    let doc: ObographDocument = serde_json::from_reader(reader)?;
    let mut terms = Vec::new();

    for node in doc.graphs.into_iter().flat_map(|g| g.nodes) {
        let Some(id) = node.id.strip_prefix(MONDO_IRI_PREFIX) else {
            continue;
        };
        let Some(name) = node.lbl.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()) else {
            continue;
        };
        let meta = node.meta.unwrap_or_default();
        if meta.deprecated || is_obsolete_name(&name) {
            continue;
        }

        let mut term = MondoTerm {
            id: id.to_string(),
            name,
            subsets: meta.subsets.iter().map(|s| subset_name(s)).collect(),
            ..MondoTerm::default()
        };
        for synonym in &meta.synonyms {
            term.push_synonym(SynonymKind::from_pred(&synonym.pred), &synonym.val);
        }
        for xref in &meta.xrefs {
            term.push_xref(&xref.val);
        }
        terms.push(term);
    }

    Ok(terms)
}

fn obo_synonym_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^"((?:[^"\\]|\\.)*)"\s+(EXACT|RELATED|NARROW|BROAD)\b"#)
            .expect("valid regex")
    })
}

#[derive(Default)]
struct OboStanza {
    in_term: bool,
    obsolete: bool,
    term: MondoTerm,
}

impl OboStanza {
    fn finish(&mut self, terms: &mut Vec<MondoTerm>) {
        let stanza = std::mem::take(self);
        if stanza.in_term
            && !stanza.obsolete
            && !stanza.term.id.is_empty()
            && !stanza.term.name.is_empty()
            && !is_obsolete_name(&stanza.term.name)
        {
            terms.push(stanza.term);
        }
    }
}

pub fn parse_mondo_obo(reader: impl BufRead) -> Result<Vec<MondoTerm>, MatcherError> {
    let mut terms = Vec::new();
    let mut stanza = OboStanza::default();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();

        if line.starts_with('[') {
            stanza.finish(&mut terms);
            stanza.in_term = line == "[Term]";
            continue;
        }
        if !stanza.in_term {
            continue;
        }

        let Some((tag, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match tag {
            "id" => {
                if let Some(digits) = value.strip_prefix("MONDO:") {
                    stanza.term.id = digits.to_string();
                }
            }
            "name" => stanza.term.name = value.to_string(),
            "synonym" => {
                if let Some(caps) = obo_synonym_re().captures(value) {
                    let text = caps[1].replace("\\\"", "\"");
                    stanza
                        .term
                        .push_synonym(SynonymKind::from_obo_scope(&caps[2]), &text);
                }
            }
            "xref" => stanza.term.push_xref(value),
            "subset" => stanza.term.subsets.push(subset_name(value)),
            "is_obsolete" => stanza.obsolete = value == "true",
            _ => {}
        }
    }
    stanza.finish(&mut terms);

    Ok(terms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_nodes_route_synonyms_and_xrefs() {
        let json = r#"{
          "graphs": [{
            "nodes": [
              {
                "id": "http://purl.obolibrary.org/obo/MONDO_0010679",
                "lbl": "Duchenne muscular dystrophy",
                "type": "CLASS",
                "meta": {
                  "subsets": ["http://purl.obolibrary.org/obo/mondo#ordo_disease", "http://purl.obolibrary.org/obo/mondo#rare"],
                  "synonyms": [
                    {"pred": "hasExactSynonym", "val": "DMD"},
                    {"pred": "hasRelatedSynonym", "val": "pseudohypertrophic muscular dystrophy"},
                    {"pred": "hasNarrowSynonym", "val": "Duchenne type progressive muscular dystrophy"}
                  ],
                  "xrefs": [{"val": "OMIM:310200"}, {"val": "OMIMPS:310200"}, {"val": "Orphanet:98896"}]
                }
              },
              {
                "id": "http://purl.obolibrary.org/obo/MONDO_0000001",
                "lbl": "obsolete disease",
                "meta": {}
              },
              {
                "id": "http://purl.obolibrary.org/obo/MONDO_0000002",
                "lbl": "retired term",
                "meta": {"deprecated": true}
              },
              {
                "id": "http://purl.obolibrary.org/obo/HP_0000001",
                "lbl": "All"
              }
            ]
          }]
        }"#;

        let terms = parse_mondo_json(json.as_bytes()).expect("parse");
        assert_eq!(terms.len(), 1);
        let dmd = &terms[0];
        assert_eq!(dmd.id, "0010679");
        assert_eq!(dmd.exact_synonyms, vec!["DMD"]);
        assert_eq!(
            dmd.related_synonyms,
            vec!["pseudohypertrophic muscular dystrophy"]
        );
        assert_eq!(dmd.other_synonyms.len(), 1);
        assert_eq!(dmd.subsets, vec!["ordo_disease", "rare"]);
        assert_eq!(dmd.omim_xrefs, vec!["310200"]);
    }

    #[test]
    fn obo_stanzas_parse_including_the_last_term() {
        let obo = "format-version: 1.2\n\
                   \n\
                   [Term]\n\
                   id: MONDO:0010679\n\
                   name: Duchenne muscular dystrophy\n\
                   synonym: \"DMD\" EXACT [MONDO:equivalentTo]\n\
                   synonym: \"Duchenne-type muscular dystrophy\" RELATED []\n\
                   synonym: \"severe \\\"X-linked\\\" dystrophy\" BROAD []\n\
                   xref: OMIM:310200 {source=\"MONDO:equivalentTo\"}\n\
                   subset: rare\n\
                   \n\
                   [Term]\n\
                   id: MONDO:0000003\n\
                   name: old term\n\
                   is_obsolete: true\n\
                   \n\
                   [Typedef]\n\
                   id: part_of\n\
                   name: part of\n\
                   \n\
                   [Term]\n\
                   id: MONDO:0008608\n\
                   name: Down syndrome\n\
                   xref: OMIM:190685\n";

        let terms = parse_mondo_obo(obo.as_bytes()).expect("parse");
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].id, "0010679");
        assert_eq!(terms[0].exact_synonyms, vec!["DMD"]);
        assert_eq!(terms[0].related_synonyms, vec!["Duchenne-type muscular dystrophy"]);
        assert_eq!(terms[0].other_synonyms, vec!["severe \"X-linked\" dystrophy"]);
        assert_eq!(terms[0].omim_xrefs, vec!["310200"]);
        assert_eq!(terms[0].subsets, vec!["rare"]);
        assert_eq!(terms[1].name, "Down syndrome");
        assert_eq!(terms[1].omim_xrefs, vec!["190685"]);
    }
}
