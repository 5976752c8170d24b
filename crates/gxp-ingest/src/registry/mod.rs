//! Registry client & linker
//!
//! Talks to the remote metadata registry (Entrez-style E-utilities,
//! `retmode=json`). Metadata ingestion is a strictly ordered pipeline:
//!
//! 1. [`RegistryClient::fetch_results`]: search + summary, returning
//!    raw docsums. Network failure here is `SourceUnavailable` and
//!    aborts the whole job before anything is committed.
//! 2. [`RegistryClient::parse`]: pure conversion into typed drafts.
//! 3. [`RegistryClient::link_studies`]: one secondary lookup per
//!    draft resolving the GEO series; a miss leaves the external
//!    fields empty rather than failing.

pub mod models;

use gxp_common::IngestError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::{SampleRow, Study};
use models::{SeriesLink, StudyDraft};

/// Default public E-utilities endpoint.
pub const DEFAULT_REGISTRY_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Upper bound on ids requested from a single search.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Registry endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub base_url: String,
    /// Contact address the registry requires on every request
    pub email: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub page_size: usize,
}

impl RegistryConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            base_url: std::env::var("REGISTRY_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_REGISTRY_BASE_URL.to_string()),
            email: std::env::var("REGISTRY_EMAIL").unwrap_or_default(),
            api_key: std::env::var("REGISTRY_API_KEY").ok(),
            timeout_secs: std::env::var("REGISTRY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            page_size: std::env::var("REGISTRY_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PAGE_SIZE),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base_url.is_empty() {
            anyhow::bail!("REGISTRY_BASE_URL cannot be empty");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("REGISTRY_TIMEOUT_SECS must be greater than 0");
        }
        if self.page_size == 0 {
            anyhow::bail!("REGISTRY_PAGE_SIZE must be greater than 0");
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REGISTRY_BASE_URL.to_string(),
            email: String::new(),
            api_key: None,
            timeout_secs: 300,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Client for the remote metadata registry.
#[derive(Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    config: RegistryConfig,
}

impl RegistryClient {
    pub fn new(config: RegistryConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { http, config })
    }

    /// Search the registry and fetch the raw document summaries for
    /// every hit, in search order.
    pub async fn fetch_results(
        &self,
        email: &str,
        query: &str,
    ) -> Result<Vec<Value>, IngestError> {
        let ids = self.search("bioproject", query, email).await?;
        info!(hits = ids.len(), "Registry search completed");

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.summaries("bioproject", &ids, email).await
    }

    /// Pure parse stage: raw docsums to typed drafts. The first
    /// malformed docsum aborts the stage.
    pub fn parse(raw: &[Value]) -> Result<Vec<StudyDraft>, IngestError> {
        raw.iter().map(StudyDraft::from_docsum).collect()
    }

    /// Resolve the external series for each draft and merge it in.
    ///
    /// A lookup that yields no match is not an error: the study keeps
    /// empty external-database fields and is inserted anyway.
    pub async fn link_studies(
        &self,
        email: &str,
        drafts: Vec<StudyDraft>,
    ) -> Result<Vec<Study>, IngestError> {
        let mut studies = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let link = self.lookup_series(email, &draft.accession_number).await?;
            if link.is_none() {
                warn!(
                    accession = %draft.accession_number,
                    "No linked series found; keeping partial metadata"
                );
            }
            studies.push(draft.into_study(link));
        }

        Ok(studies)
    }

    /// Fetch per-sample metadata for one linked series as long-format
    /// (study, sample, variable, value) rows.
    pub async fn fetch_sample_metadata(
        &self,
        email: &str,
        series_accession: &str,
    ) -> Result<Vec<SampleRow>, IngestError> {
        let term = format!("{}[Accession]", series_accession);
        let ids = self.search("gds", &term, email).await?;

        let Some(id) = ids.first() else {
            return Ok(Vec::new());
        };

        let docsums = self.summaries("gds", std::slice::from_ref(id), email).await?;
        let Some(docsum) = docsums.first() else {
            return Ok(Vec::new());
        };

        let series = SeriesLink::from_docsum(docsum)?;
        let mut rows = Vec::new();
        for sample in series.samples {
            if let Some(title) = sample.title {
                rows.push(SampleRow {
                    accession_number: series_accession.to_string(),
                    sample_accession: sample.accession.clone(),
                    variable: "title".to_string(),
                    value: title,
                });
            }
        }

        debug!(
            series = %series_accession,
            rows = rows.len(),
            "Fetched sample metadata"
        );
        Ok(rows)
    }

    /// Secondary lookup: find the series registered under a project
    /// accession. Zero hits resolve to `None`.
    async fn lookup_series(
        &self,
        email: &str,
        project_accession: &str,
    ) -> Result<Option<SeriesLink>, IngestError> {
        let term = format!("{}[BioProject]", project_accession);
        let ids = self.search("gds", &term, email).await?;

        let Some(id) = ids.first() else {
            return Ok(None);
        };

        let docsums = self.summaries("gds", std::slice::from_ref(id), email).await?;
        match docsums.first() {
            Some(docsum) => Ok(Some(SeriesLink::from_docsum(docsum)?)),
            None => Ok(None),
        }
    }

    async fn search(
        &self,
        db: &str,
        term: &str,
        email: &str,
    ) -> Result<Vec<String>, IngestError> {
        let url = format!("{}/esearch.fcgi", self.config.base_url);
        let retmax = self.config.page_size.to_string();
        let mut params = vec![
            ("db", db),
            ("term", term),
            ("retmode", "json"),
            ("retmax", retmax.as_str()),
            ("email", email),
        ];
        if let Some(key) = &self.config.api_key {
            params.push(("api_key", key.as_str()));
        }

        let body: Value = self.get_json(&url, &params).await?;

        let ids = body
            .get("esearchresult")
            .and_then(|r| r.get("idlist"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                IngestError::Decode("search response has no esearchresult.idlist".to_string())
            })?
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        Ok(ids)
    }

    async fn summaries(
        &self,
        db: &str,
        ids: &[String],
        email: &str,
    ) -> Result<Vec<Value>, IngestError> {
        let url = format!("{}/esummary.fcgi", self.config.base_url);
        let joined = ids.join(",");
        let mut params = vec![
            ("db", db),
            ("id", joined.as_str()),
            ("retmode", "json"),
            ("email", email),
        ];
        if let Some(key) = &self.config.api_key {
            params.push(("api_key", key.as_str()));
        }

        let body: Value = self.get_json(&url, &params).await?;

        let result = body.get("result").ok_or_else(|| {
            IngestError::Decode("summary response has no result object".to_string())
        })?;

        // Docsums are keyed by uid; the uids array preserves order.
        let uids = result
            .get("uids")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|| ids.to_vec());

        let mut docsums = Vec::with_capacity(uids.len());
        for uid in &uids {
            if let Some(docsum) = result.get(uid.as_str()) {
                docsums.push(docsum.clone());
            }
        }

        Ok(docsums)
    }

    async fn get_json(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, IngestError> {
        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| IngestError::SourceUnavailable(format!("registry request failed: {e}")))?
            .error_for_status()
            .map_err(|e| {
                IngestError::SourceUnavailable(format!("registry rejected request: {e}"))
            })?;

        response
            .json()
            .await
            .map_err(|e| IngestError::Decode(format!("registry returned malformed JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.base_url, DEFAULT_REGISTRY_BASE_URL);
        assert_eq!(config.page_size, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let config = RegistryConfig {
            base_url: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_is_all_or_nothing() {
        let raw = vec![
            serde_json::json!({"uid": "1", "project_acc": "PRJNA1"}),
            serde_json::json!({"uid": "2"}),
        ];
        assert!(RegistryClient::parse(&raw).is_err());

        let raw = vec![serde_json::json!({"uid": "1", "project_acc": "PRJNA1"})];
        let drafts = RegistryClient::parse(&raw).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].accession_number, "PRJNA1");
    }
}
