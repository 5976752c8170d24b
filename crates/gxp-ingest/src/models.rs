//! Row types for the three target tables

use serde::{Deserialize, Serialize};

/// One study/experiment row, fully populated by the registry linker.
///
/// `has_data` is intentionally absent: it is derived state owned by
/// the reconciler and defaults to 0 on insert.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Study {
    pub study_id: i64,
    pub title: String,
    pub description: String,
    pub data_type: Option<String>,
    pub submitted: Option<String>,
    pub organism_name: Option<String>,
    pub organism_id: Option<i64>,
    /// External database name ("GEO"), empty when linking found nothing
    pub external_db: Option<String>,
    /// External accession (e.g. a GSE series id)
    pub external_db_id: Option<String>,
    pub organization: Option<String>,
    pub accession_number: Option<String>,
    pub n_samples: Option<i32>,
    /// Profiling-method tag from the linked series
    pub gds_type: Option<String>,
}

/// One long-format sample metadata observation:
/// (study accession, sample accession, variable) -> value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRow {
    pub accession_number: String,
    pub sample_accession: String,
    pub variable: String,
    pub value: String,
}

/// One decoded expression-matrix row. Field names must match the
/// object's CSV header; a row missing any of them fails decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionRow {
    pub accession_number: String,
    pub gene: String,
    pub sample_accession: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_row_field_names_match_header() {
        let row = ExpressionRow {
            accession_number: "GSE1".into(),
            gene: "G1".into(),
            sample_accession: "S1".into(),
            value: "0.25".into(),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["accession_number"], "GSE1");
        assert_eq!(json["gene"], "G1");
        assert_eq!(json["sample_accession"], "S1");
        assert_eq!(json["value"], "0.25");
    }
}
