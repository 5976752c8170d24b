//! Object-source reader
//!
//! Streams a remote delimited-text object record-by-record. The first
//! row is a header naming the fields; every following row decodes into
//! a typed [`ExpressionRow`] or fails the job with a decode error.
//! Rows are never skipped, so a committed dataset is never silently
//! incomplete.

use std::time::Duration;

use csv_async::AsyncReaderBuilder;
use futures::{Stream, StreamExt};
use gxp_common::IngestError;
use tokio::io::AsyncRead;
use tracing::debug;

use crate::models::ExpressionRow;
use crate::storage::Storage;

/// Decode a header-delimited CSV byte stream into expression rows.
///
/// Field names are resolved from the header at decode time; a row
/// missing a required field yields `Decode` without consuming the
/// remaining input.
pub fn decode_rows<R>(reader: R) -> impl Stream<Item = Result<ExpressionRow, IngestError>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    AsyncReaderBuilder::new()
        .trim(csv_async::Trim::All)
        .create_deserializer(reader)
        .into_deserialize::<ExpressionRow>()
        .map(|record| record.map_err(|e| IngestError::Decode(e.to_string())))
}

/// Reader over remote expression-matrix objects.
pub struct ExpressionSource {
    storage: Storage,
    open_timeout: Duration,
}

impl ExpressionSource {
    pub fn new(storage: Storage, open_timeout: Duration) -> Self {
        Self {
            storage,
            open_timeout,
        }
    }

    /// Open the object and return a lazy row stream.
    ///
    /// Restartable only by calling this again: there is no seek or
    /// resume on the underlying stream.
    pub async fn rows(
        &self,
        key: &str,
    ) -> Result<impl Stream<Item = Result<ExpressionRow, IngestError>> + Send, IngestError> {
        debug!(key = %key, "Opening expression object");

        let body = tokio::time::timeout(self.open_timeout, self.storage.open(key))
            .await
            .map_err(|_| {
                IngestError::SourceUnavailable(format!(
                    "timed out after {:?} opening object {}",
                    self.open_timeout, key
                ))
            })??;

        Ok(decode_rows(body.into_async_read()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    async fn collect(input: &'static str) -> Result<Vec<ExpressionRow>, IngestError> {
        decode_rows(input.as_bytes()).try_collect().await
    }

    #[tokio::test]
    async fn test_decodes_rows_in_order() {
        let rows = collect(
            "accession_number,gene,sample_accession,value\n\
             GSE1,G1,S1,0.5\n\
             GSE1,G1,S2,1.5\n\
             GSE1,G1,S3,2.5\n",
        )
        .await
        .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].sample_accession, "S1");
        assert_eq!(rows[2].sample_accession, "S3");
        assert!(rows.iter().all(|r| r.accession_number == "GSE1"));
    }

    #[tokio::test]
    async fn test_header_only_object_is_empty() {
        let rows = collect("accession_number,gene,sample_accession,value\n")
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_missing_field_is_decode_error() {
        // Header lacks the value column entirely.
        let result = collect("accession_number,gene,sample_accession\nGSE1,G1,S1\n").await;

        match result {
            Err(IngestError::Decode(_)) => {}
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ragged_row_is_decode_error() {
        let result = collect(
            "accession_number,gene,sample_accession,value\n\
             GSE1,G1,S1,0.5\n\
             GSE1,G1\n",
        )
        .await;

        match result {
            Err(IngestError::Decode(_)) => {}
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_surfaces_after_valid_prefix() {
        // The stream yields good rows first, then the failure; the
        // caller aborts without consuming further input.
        let mut stream = Box::pin(decode_rows(
            "accession_number,gene,sample_accession,value\n\
             GSE1,G1,S1,0.5\n\
             GSE1,G1\n\
             GSE1,G1,S3,2.5\n"
                .as_bytes(),
        ));

        let first = stream.next().await.unwrap();
        assert!(first.is_ok());

        let second = stream.next().await.unwrap();
        assert!(matches!(second, Err(IngestError::Decode(_))));
    }
}
