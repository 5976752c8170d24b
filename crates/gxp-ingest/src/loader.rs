//! Bulk loader
//!
//! Executes one batch as one atomic insert: a single `INSERT .. SELECT
//! FROM UNNEST(..)` statement inside its own transaction. Array binds
//! keep the statement at one bind parameter per column, so batch size
//! is not limited by the protocol's parameter budget.
//!
//! Atomicity is per batch only: a failing batch rolls itself back, but
//! batches already committed by the same job stay committed.

use gxp_common::IngestError;
use sqlx::{Connection, PgConnection};
use tracing::debug;

use crate::models::{ExpressionRow, SampleRow, Study};

/// Map a sqlx failure onto the pipeline taxonomy: store rejections
/// (constraint violations and friends) are insert errors, everything
/// else is a lost connection.
pub fn classify_db_error(e: sqlx::Error) -> IngestError {
    match e {
        sqlx::Error::Database(db) => IngestError::Insert(db.to_string()),
        sqlx::Error::Io(io) => IngestError::Connection(io.to_string()),
        other => IngestError::Connection(other.to_string()),
    }
}

/// Insert one batch of expression rows. All rows commit or none do.
pub async fn insert_expression(
    conn: &mut PgConnection,
    batch: &[ExpressionRow],
) -> Result<u64, IngestError> {
    if batch.is_empty() {
        return Ok(0);
    }

    let mut accessions = Vec::with_capacity(batch.len());
    let mut genes = Vec::with_capacity(batch.len());
    let mut sample_accessions = Vec::with_capacity(batch.len());
    let mut values = Vec::with_capacity(batch.len());
    for row in batch {
        accessions.push(row.accession_number.clone());
        genes.push(row.gene.clone());
        sample_accessions.push(row.sample_accession.clone());
        values.push(row.value.clone());
    }

    let mut tx = conn.begin().await.map_err(classify_db_error)?;

    let result = sqlx::query(
        r#"
        INSERT INTO gene_expression (accession_number, gene, sample_accession, value)
        SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[])
        "#,
    )
    .bind(&accessions)
    .bind(&genes)
    .bind(&sample_accessions)
    .bind(&values)
    .execute(&mut *tx)
    .await
    .map_err(classify_db_error)?;

    tx.commit().await.map_err(classify_db_error)?;

    debug!(rows = result.rows_affected(), "Expression batch committed");
    Ok(result.rows_affected())
}

/// Insert one batch of study rows (has_data stays at its default 0).
pub async fn insert_studies(
    conn: &mut PgConnection,
    batch: &[Study],
) -> Result<u64, IngestError> {
    if batch.is_empty() {
        return Ok(0);
    }

    let mut study_ids = Vec::with_capacity(batch.len());
    let mut titles = Vec::with_capacity(batch.len());
    let mut descriptions = Vec::with_capacity(batch.len());
    let mut data_types = Vec::with_capacity(batch.len());
    let mut submitted = Vec::with_capacity(batch.len());
    let mut organism_names = Vec::with_capacity(batch.len());
    let mut organism_ids = Vec::with_capacity(batch.len());
    let mut external_dbs = Vec::with_capacity(batch.len());
    let mut external_db_ids = Vec::with_capacity(batch.len());
    let mut organizations = Vec::with_capacity(batch.len());
    let mut accession_numbers = Vec::with_capacity(batch.len());
    let mut n_samples = Vec::with_capacity(batch.len());
    let mut gds_types = Vec::with_capacity(batch.len());
    for study in batch {
        study_ids.push(study.study_id);
        titles.push(study.title.clone());
        descriptions.push(study.description.clone());
        data_types.push(study.data_type.clone());
        submitted.push(study.submitted.clone());
        organism_names.push(study.organism_name.clone());
        organism_ids.push(study.organism_id);
        external_dbs.push(study.external_db.clone());
        external_db_ids.push(study.external_db_id.clone());
        organizations.push(study.organization.clone());
        accession_numbers.push(study.accession_number.clone());
        n_samples.push(study.n_samples);
        gds_types.push(study.gds_type.clone());
    }

    let mut tx = conn.begin().await.map_err(classify_db_error)?;

    let result = sqlx::query(
        r#"
        INSERT INTO studies (
            study_id, title, description, data_type, submitted,
            organism_name, organism_id, external_db, external_db_id,
            organization, accession_number, n_samples, gds_type
        )
        SELECT * FROM UNNEST(
            $1::bigint[], $2::text[], $3::text[], $4::text[], $5::text[],
            $6::text[], $7::bigint[], $8::text[], $9::text[],
            $10::text[], $11::text[], $12::int[], $13::text[]
        )
        "#,
    )
    .bind(&study_ids)
    .bind(&titles)
    .bind(&descriptions)
    .bind(&data_types)
    .bind(&submitted)
    .bind(&organism_names)
    .bind(&organism_ids)
    .bind(&external_dbs)
    .bind(&external_db_ids)
    .bind(&organizations)
    .bind(&accession_numbers)
    .bind(&n_samples)
    .bind(&gds_types)
    .execute(&mut *tx)
    .await
    .map_err(classify_db_error)?;

    tx.commit().await.map_err(classify_db_error)?;

    debug!(rows = result.rows_affected(), "Study batch committed");
    Ok(result.rows_affected())
}

/// Insert one batch of long-format sample metadata rows.
pub async fn insert_samples(
    conn: &mut PgConnection,
    batch: &[SampleRow],
) -> Result<u64, IngestError> {
    if batch.is_empty() {
        return Ok(0);
    }

    let mut accessions = Vec::with_capacity(batch.len());
    let mut sample_accessions = Vec::with_capacity(batch.len());
    let mut variables = Vec::with_capacity(batch.len());
    let mut values = Vec::with_capacity(batch.len());
    for row in batch {
        accessions.push(row.accession_number.clone());
        sample_accessions.push(row.sample_accession.clone());
        variables.push(row.variable.clone());
        values.push(row.value.clone());
    }

    let mut tx = conn.begin().await.map_err(classify_db_error)?;

    let result = sqlx::query(
        r#"
        INSERT INTO samples (accession_number, sample_accession, variable, value)
        SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[])
        "#,
    )
    .bind(&accessions)
    .bind(&sample_accessions)
    .bind(&variables)
    .bind(&values)
    .execute(&mut *tx)
    .await
    .map_err(classify_db_error)?;

    tx.commit().await.map_err(classify_db_error)?;

    debug!(rows = result.rows_affected(), "Sample batch committed");
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_failures_classify_as_connection() {
        let err = classify_db_error(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        )));
        assert!(matches!(err, IngestError::Connection(_)));

        let err = classify_db_error(sqlx::Error::PoolClosed);
        assert!(matches!(err, IngestError::Connection(_)));
    }

    #[test]
    fn test_decode_failures_are_not_insert_errors() {
        let err = classify_db_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, IngestError::Connection(_)));
    }
}
