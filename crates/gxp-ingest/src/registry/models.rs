//! Registry record types and docsum parsing
//!
//! The registry speaks Entrez-style JSON: a search returns numeric
//! ids, a summary endpoint returns one heterogeneous "docsum" object
//! per id. Parsing is a pure transformation so a malformed docsum is
//! attributable to the parse stage, not the network.

use gxp_common::IngestError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Study;

/// Study draft parsed from a project docsum, before linking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyDraft {
    pub study_id: i64,
    pub accession_number: String,
    pub title: String,
    pub description: String,
    pub data_type: Option<String>,
    pub submitted: Option<String>,
    pub organism_name: Option<String>,
    pub organism_id: Option<i64>,
    pub organization: Option<String>,
}

impl StudyDraft {
    /// Parse one project docsum. The uid and project accession are
    /// required; everything else degrades to empty/None.
    pub fn from_docsum(docsum: &Value) -> Result<Self, IngestError> {
        let study_id = lenient_i64(docsum.get("uid")).ok_or_else(|| {
            IngestError::Decode(format!("project docsum is missing a uid: {}", docsum))
        })?;

        let accession_number = docsum
            .get("project_acc")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                IngestError::Decode(format!(
                    "project docsum {} is missing project_acc",
                    study_id
                ))
            })?
            .to_string();

        Ok(Self {
            study_id,
            accession_number,
            title: str_field(docsum, "project_title").unwrap_or_default(),
            description: str_field(docsum, "project_description").unwrap_or_default(),
            data_type: str_field(docsum, "project_data_type"),
            submitted: str_field(docsum, "registration_date"),
            organism_name: str_field(docsum, "organism_name"),
            organism_id: lenient_i64(docsum.get("taxid")),
            organization: str_field(docsum, "submitter_organization"),
        })
    }

    /// Merge the secondary-lookup result into the draft. A draft whose
    /// lookup found nothing keeps empty external-database fields;
    /// partial metadata is acceptable.
    pub fn into_study(self, link: Option<SeriesLink>) -> Study {
        let (external_db, external_db_id, n_samples, gds_type) = match link {
            Some(series) => (
                Some("GEO".to_string()),
                Some(series.accession),
                series.n_samples,
                series.gds_type,
            ),
            None => (None, None, None, None),
        };

        Study {
            study_id: self.study_id,
            title: self.title,
            description: self.description,
            data_type: self.data_type,
            submitted: self.submitted,
            organism_name: self.organism_name,
            organism_id: self.organism_id,
            external_db,
            external_db_id,
            organization: self.organization,
            accession_number: Some(self.accession_number),
            n_samples,
            gds_type,
        }
    }
}

/// Linked series record resolved by the secondary lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesLink {
    pub accession: String,
    pub gds_type: Option<String>,
    pub n_samples: Option<i32>,
    pub samples: Vec<SeriesSample>,
}

/// One sample entry inside a series docsum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSample {
    pub accession: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl SeriesLink {
    /// Parse a series docsum. Only the series accession is required.
    pub fn from_docsum(docsum: &Value) -> Result<Self, IngestError> {
        let accession = docsum
            .get("accession")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                IngestError::Decode(format!("series docsum is missing an accession: {}", docsum))
            })?
            .to_string();

        let samples = docsum
            .get("samples")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let accession = entry.get("accession")?.as_str()?.to_string();
                        Some(SeriesSample {
                            accession,
                            title: str_field(entry, "title"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            accession,
            gds_type: str_field(docsum, "gdstype"),
            n_samples: lenient_i64(docsum.get("n_samples")).map(|n| n as i32),
            samples,
        })
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Entrez encodes numbers inconsistently across docsum fields; accept
/// both JSON numbers and numeric strings.
fn lenient_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn project_docsum() -> Value {
        json!({
            "uid": "200321",
            "project_acc": "PRJNA901",
            "project_title": "Airway epithelium response",
            "project_description": "Expression profiling of airway epithelium",
            "project_data_type": "Transcriptome or Gene expression",
            "organism_name": "Homo sapiens",
            "taxid": 9606,
            "submitter_organization": "Example University",
            "registration_date": "2023/04/02"
        })
    }

    #[test]
    fn test_parse_project_docsum() {
        let draft = StudyDraft::from_docsum(&project_docsum()).unwrap();
        assert_eq!(draft.study_id, 200321);
        assert_eq!(draft.accession_number, "PRJNA901");
        assert_eq!(draft.organism_id, Some(9606));
        assert_eq!(draft.organism_name.as_deref(), Some("Homo sapiens"));
    }

    #[test]
    fn test_docsum_without_uid_fails_fast() {
        let err = StudyDraft::from_docsum(&json!({"project_acc": "PRJNA1"})).unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)));
    }

    #[test]
    fn test_docsum_without_accession_fails_fast() {
        let err = StudyDraft::from_docsum(&json!({"uid": 5})).unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)));
    }

    #[test]
    fn test_unlinked_draft_keeps_empty_external_fields() {
        let study = StudyDraft::from_docsum(&project_docsum())
            .unwrap()
            .into_study(None);

        assert_eq!(study.external_db, None);
        assert_eq!(study.external_db_id, None);
        assert_eq!(study.n_samples, None);
        assert_eq!(study.accession_number.as_deref(), Some("PRJNA901"));
    }

    #[test]
    fn test_linked_draft_merges_series_fields() {
        let link = SeriesLink::from_docsum(&json!({
            "accession": "GSE777",
            "gdstype": "Expression profiling by high throughput sequencing",
            "n_samples": "24",
            "samples": [
                {"accession": "GSM1", "title": "lung biopsy, control"},
                {"accession": "GSM2", "title": "lung biopsy, disease"}
            ]
        }))
        .unwrap();

        assert_eq!(link.samples.len(), 2);

        let study = StudyDraft::from_docsum(&project_docsum())
            .unwrap()
            .into_study(Some(link));

        assert_eq!(study.external_db.as_deref(), Some("GEO"));
        assert_eq!(study.external_db_id.as_deref(), Some("GSE777"));
        assert_eq!(study.n_samples, Some(24));
    }
}
