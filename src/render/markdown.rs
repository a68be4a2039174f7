use std::sync::OnceLock;

use minijinja::{Environment, context};

use crate::entities::candidate::DiseaseCandidate;
use crate::entities::response::MatchResponse;
use crate::entities::variant::VariantAnnotation;
use crate::error::MatcherError;

static ENV: OnceLock<Environment<'static>> = OnceLock::new();

const OMIM_ENTRY_URL: &str = "https://omim.org/entry/";
const MONDO_TERM_URL: &str = "https://monarchinitiative.org/";

#[derive(serde::Serialize)]
struct GeneRow<'a> {
    name: &'a str,
    omim_id: Option<&'a str>,
    mondo_id: Option<&'a str>,
    method: &'a str,
    genes: &'a [String],
}

fn env() -> Result<&'static Environment<'static>, MatcherError> {
    if let Some(env) = ENV.get() {
        return Ok(env);
    }

    let mut env = Environment::new();
    env.add_filter("truncate", |s: String, max_bytes: usize| -> String {
        if s.len() <= max_bytes {
            return s;
        }
        if max_bytes == 0 {
            return "…".to_string();
        }
        let mut boundary = max_bytes;
        while boundary > 0 && !s.is_char_boundary(boundary) {
            boundary -= 1;
        }
        let mut out = s[..boundary].trim_end().to_string();
        out.push('…');
        out
    });
    env.add_filter("score", |v: f64| -> String { format!("{v:.3}") });

    env.add_template("match.md.j2", include_str!("../../templates/match.md.j2"))?;
    env.add_template("gene.md.j2", include_str!("../../templates/gene.md.j2"))?;
    env.add_template(
        "variant.md.j2",
        include_str!("../../templates/variant.md.j2"),
    )?;

    let _ = ENV.set(env);
    ENV.get().ok_or_else(|| MatcherError::Api {
        api: "render".into(),
        message: "Markdown environment failed to initialize".into(),
    })
}

fn append_evidence_urls(mut body: String, urls: Vec<(&str, String)>) -> String {
    let links = urls
        .into_iter()
        .filter_map(|(label, url)| {
            let label = label.trim();
            let url = url.trim();
            if label.is_empty() || url.is_empty() {
                return None;
            }
            Some(format!("[{label}]({url})"))
        })
        .collect::<Vec<_>>();
    if links.is_empty() {
        return body;
    }
    if !body.ends_with('\n') {
        body.push('\n');
    }
    body.push('\n');
    body.push_str(&links.join(" | "));
    body.push('\n');
    body
}

fn disease_evidence_urls(omim_id: Option<&str>, mondo_id: Option<&str>) -> Vec<(&'static str, String)> {
    let mut urls = Vec::new();
    if let Some(omim) = omim_id.map(str::trim).filter(|s| !s.is_empty()) {
        urls.push(("OMIM", format!("{OMIM_ENTRY_URL}{omim}")));
    }
    if let Some(mondo) = mondo_id.map(str::trim).filter(|s| !s.is_empty()) {
        urls.push(("MONDO", format!("{MONDO_TERM_URL}{mondo}")));
    }
    urls
}

pub fn match_markdown(query: &str, response: &MatchResponse) -> Result<String, MatcherError> {
    let extended = response.extended.as_ref();
    let variant = extended.and_then(|e| e.variant_annotation.as_ref());

    let tmpl = env()?.get_template("match.md.j2")?;
    let body = tmpl.render(context! {
        query => query,
        error => &response.error,
        results => &response.results,
        variant => variant.map(|v| v.variant.to_string()),
        region_type => variant.map(|v| v.region_type.as_str()),
        variant_genes => variant.map(|v| v.genes.as_slice()),
        reasoning => extended.and_then(|e| e.llm_reasoning.as_deref()),
        conflicts => extended.map(|e| e.conflicts.as_slice()),
        methods => extended.map(|e| e.methods_used.as_slice()),
        model => &response.metadata.model,
        processing_time_ms => response.metadata.processing_time_ms,
    })?;

    let urls = response
        .top()
        .map(|top| disease_evidence_urls(top.omim_id.as_deref(), top.mondo_id.as_deref()))
        .unwrap_or_default();
    Ok(append_evidence_urls(body, urls))
}

pub fn gene_markdown(gene: &str, diseases: &[DiseaseCandidate]) -> Result<String, MatcherError> {
    let rows: Vec<GeneRow<'_>> = diseases
        .iter()
        .map(|d| GeneRow {
            name: &d.name,
            omim_id: d.omim_id.as_deref(),
            mondo_id: d.mondo_id.as_deref(),
            method: d
                .match_details
                .get("method")
                .and_then(|v| v.as_str())
                .unwrap_or("-"),
            genes: &d.genes,
        })
        .collect();

    let tmpl = env()?.get_template("gene.md.j2")?;
    Ok(tmpl.render(context! {
        gene => gene,
        diseases => rows,
    })?)
}

pub fn variant_markdown(annotation: &VariantAnnotation) -> Result<String, MatcherError> {
    let variant = &annotation.variant;
    let tmpl = env()?.get_template("variant.md.j2")?;
    Ok(tmpl.render(context! {
        variant => variant.to_string(),
        chromosome => &variant.chromosome,
        position => variant.position,
        reference => &variant.reference,
        alternative => &variant.alternative,
        region_type => annotation.region_type.as_str(),
        genes => &annotation.genes,
        distance_to_gene => annotation.distance_to_gene,
    })?)
}
