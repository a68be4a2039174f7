use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::cli::Service;
use crate::config::{LlmSettings, Settings};
use crate::error::MatcherError;

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthRow {
    pub component: String,
    pub status: String,
    pub detail: String,
}

impl HealthRow {
    fn ok(component: &str, detail: String) -> Self {
        Self {
            component: component.to_string(),
            status: "ok".into(),
            detail,
        }
    }

    fn error(component: &str, detail: String) -> Self {
        Self {
            component: component.to_string(),
            status: "error".into(),
            detail,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
    pub healthy: usize,
    pub total: usize,
    pub rows: Vec<HealthRow>,
}

impl HealthReport {
    fn from_rows(rows: Vec<HealthRow>) -> Self {
        // "not configured" is a supported degraded mode, not a failure.
        let healthy = rows.iter().filter(|r| r.status != "error").count();
        Self {
            healthy,
            total: rows.len(),
            rows,
        }
    }

    pub fn all_healthy(&self) -> bool {
        self.healthy == self.total
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Disease Matcher Health Check\n\n");
        out.push_str("| Component | Status | Detail |\n");
        out.push_str("|-----------|--------|--------|\n");
        for row in &self.rows {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                row.component, row.status, row.detail
            ));
        }
        out.push_str(&format!(
            "\nStatus: {}/{} components healthy\n",
            self.healthy, self.total
        ));
        out
    }
}

async fn check_one(
    client: reqwest::Client,
    component: &str,
    url: &str,
    api_key: Option<&str>,
) -> HealthRow {
    let start = Instant::now();
    let mut req = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json");
    if let Some(key) = api_key {
        req = req.bearer_auth(key);
    }

    match req.send().await {
        Ok(resp) => {
            let status = resp.status();
            let elapsed = start.elapsed().as_millis();
            if status.is_success() {
                HealthRow::ok(component, format!("{elapsed}ms"))
            } else {
                HealthRow::error(
                    component,
                    format!("{elapsed}ms (HTTP {})", status.as_u16()),
                )
            }
        }
        Err(err) => {
            let reason = if err.is_timeout() {
                "timeout"
            } else if err.is_connect() {
                "connect"
            } else {
                "error"
            };
            HealthRow::error(component, reason.into())
        }
    }
}

fn health_http_client() -> Result<reqwest::Client, MatcherError> {
    static HEALTH_HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

    if let Some(client) = HEALTH_HTTP_CLIENT.get() {
        return Ok(client.clone());
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .connect_timeout(Duration::from_secs(5))
        .user_agent(concat!("disease-matcher/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(MatcherError::HttpClientInit)?;

    match HEALTH_HTTP_CLIENT.set(client.clone()) {
        Ok(()) => Ok(client),
        Err(_) => HEALTH_HTTP_CLIENT
            .get()
            .cloned()
            .ok_or_else(|| MatcherError::Api {
                api: "health".into(),
                message: "Health HTTP client initialization race".into(),
            }),
    }
}

fn llm_row(llm_configured: bool, model: &str) -> HealthRow {
    if llm_configured {
        HealthRow::ok("LLM", format!("configured ({model})"))
    } else {
        HealthRow {
            component: "LLM".into(),
            status: "not configured".into(),
            detail: "dictionary translation, no reranking".into(),
        }
    }
}

/// Component rows for an already loaded service.
pub(crate) fn service_rows(service: &Service) -> Vec<HealthRow> {
    let orchestrator = &service.orchestrator;
    let stats = orchestrator.registry().stats();
    vec![
        HealthRow::ok(
            "Disease registry",
            format!(
                "{} OMIM, {} MONDO diseases",
                stats.omim_diseases, stats.mondo_diseases
            ),
        ),
        HealthRow::ok(
            "Cross-references",
            format!("{} OMIM-MONDO pairs", stats.cross_references),
        ),
        HealthRow::ok(
            "Gene index",
            format!(
                "{} genes, {} aliases, {} associations",
                stats.genes.total_genes,
                stats.genes.total_aliases,
                stats.genes.total_disease_associations
            ),
        ),
        HealthRow::ok(
            "Lexical index",
            format!("{} documents", service.lexical_documents),
        ),
        HealthRow::ok(
            "Variant annotator",
            format!("{} gene windows", orchestrator.annotator().gene_count()),
        ),
        llm_row(service.llm_configured, orchestrator.model()),
    ]
}

pub(crate) fn service_report(service: &Service) -> HealthReport {
    HealthReport::from_rows(service_rows(service))
}

async fn probe_llm(llm: &LlmSettings) -> HealthRow {
    let Some(key) = llm.api_key.as_deref() else {
        return llm_row(false, &llm.model);
    };
    let client = match health_http_client() {
        Ok(client) => client,
        Err(err) => return HealthRow::error("LLM endpoint", err.to_string()),
    };
    let url = format!("{}/models", llm.base_url.trim_end_matches('/'));
    check_one(client, "LLM endpoint", &url, Some(key)).await
}

/// Loads every component and reports its status; `probe` also calls the LLM endpoint.
pub async fn check(settings: &Settings, probe: bool) -> HealthReport {
    let mut rows = match super::bootstrap(settings).await {
        Ok(service) => service_rows(&service),
        Err(err) => vec![HealthRow::error("Startup", format!("{err:#}"))],
    };
    if probe {
        rows.push(probe_llm(&settings.llm).await);
    }
    HealthReport::from_rows(rows)
}
