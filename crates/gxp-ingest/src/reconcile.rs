//! Derived-state reconciler
//!
//! Recomputes the `has_data` flag on studies from the contents of the
//! expression table. One set-membership update, not row-by-row, so it
//! stays correct and cheap at full-table scale.

use gxp_common::IngestError;
use sqlx::PgConnection;
use tracing::info;

use crate::loader::classify_db_error;

/// Flip `has_data` to 1 on every study whose external id appears in at
/// least one expression row. Studies already flagged are untouched and
/// the flag is never cleared, so running this twice is a no-op the
/// second time. Returns the number of studies newly flagged.
pub async fn mark_studies_with_data(conn: &mut PgConnection) -> Result<u64, IngestError> {
    let result = sqlx::query(
        r#"
        UPDATE studies
        SET has_data = 1
        WHERE has_data = 0
          AND external_db_id IN (SELECT DISTINCT accession_number FROM gene_expression)
        "#,
    )
    .execute(&mut *conn)
    .await
    .map_err(classify_db_error)?;

    info!(
        studies_flagged = result.rows_affected(),
        "Reconciled has_data flags"
    );
    Ok(result.rows_affected())
}
