//! Study search/browse queries
//!
//! The read-side surface the portal frontend uses. These are thin
//! filters over the `studies` table; everything that writes rows lives
//! in the ingestion crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// Search filters posted by the frontend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySearch {
    pub search_string: String,
    pub n_samples: i32,
    pub organism: String,
    pub profiling_method: String,
    pub has_data: i32,
}

/// One study row as returned to the frontend.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudyRecord {
    pub study_id: i64,
    pub title: String,
    pub description: String,
    pub data_type: Option<String>,
    pub submitted: Option<String>,
    pub organism_name: Option<String>,
    pub organism_id: Option<i64>,
    pub external_db: Option<String>,
    pub external_db_id: Option<String>,
    pub organization: Option<String>,
    pub accession_number: Option<String>,
    pub n_samples: Option<i32>,
    pub gds_type: Option<String>,
    pub has_data: i32,
}

/// Search study metadata with the frontend's filter set.
pub async fn search_studies(
    db: &PgPool,
    search: &StudySearch,
) -> Result<Vec<StudyRecord>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT study_id, title, description, data_type, submitted,
               organism_name, organism_id, external_db, external_db_id,
               organization, accession_number, n_samples, gds_type, has_data
        FROM studies
        WHERE description ILIKE $1
          AND n_samples >= $2
          AND organism_name = $3
          AND gds_type = $4
          AND has_data = $5
        ORDER BY study_id
        "#,
    )
    .bind(format!("%{}%", search.search_string))
    .bind(search.n_samples)
    .bind(&search.organism)
    .bind(&search.profiling_method)
    .bind(search.has_data)
    .fetch_all(db)
    .await
}

/// Distinct organisms available, filtered by the has_data flag.
pub async fn list_organisms(db: &PgPool, has_data: i32) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT DISTINCT organism_name
        FROM studies
        WHERE has_data = $1 AND organism_name IS NOT NULL
        ORDER BY organism_name
        "#,
    )
    .bind(has_data)
    .fetch_all(db)
    .await
}

/// Distinct profiling methods available, filtered by the has_data flag.
pub async fn list_profiling_methods(
    db: &PgPool,
    has_data: i32,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT DISTINCT gds_type
        FROM studies
        WHERE has_data = $1 AND gds_type IS NOT NULL
        ORDER BY gds_type
        "#,
    )
    .bind(has_data)
    .fetch_all(db)
    .await
}

/// Queued-job acknowledgement returned on submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job_id: Uuid,
    pub kind: String,
}

/// Job status as exposed to pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub kind: String,
    pub state: String,
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_filters_deserialize() {
        let search: StudySearch = serde_json::from_value(serde_json::json!({
            "search_string": "asthma",
            "n_samples": 50,
            "organism": "Homo sapiens",
            "profiling_method": "Expression profiling by array",
            "has_data": 1
        }))
        .unwrap();

        assert_eq!(search.search_string, "asthma");
        assert_eq!(search.n_samples, 50);
        assert_eq!(search.has_data, 1);
    }

    #[test]
    fn test_study_record_serializes_all_fields() {
        let record = StudyRecord {
            study_id: 101,
            title: "Airway transcriptome".into(),
            description: "Expression profiling".into(),
            data_type: None,
            submitted: None,
            organism_name: Some("Homo sapiens".into()),
            organism_id: Some(9606),
            external_db: Some("GEO".into()),
            external_db_id: Some("GSE101".into()),
            organization: None,
            accession_number: Some("PRJNA101".into()),
            n_samples: Some(18),
            gds_type: None,
            has_data: 1,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["external_db_id"], "GSE101");
        assert_eq!(json["has_data"], 1);
    }
}
