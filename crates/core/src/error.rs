use std::path::PathBuf;

/// Errors raised by the consolidation pipeline.
///
/// Only [`ObdsError::Configuration`] and the I/O variants ever leave this crate as `Err`; the
/// per-record and per-field-group variants are built, logged and dropped so that one bad record
/// never aborts a batch.
#[derive(Debug, thiserror::Error)]
pub enum ObdsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("malformed ledger record (sequence id {}): {reason}", display_sequence_id(.sequence_id))]
    MalformedRecord {
        sequence_id: Option<i64>,
        reason: String,
    },

    #[error("record {sequence_id} of patient {patient_ref} could not be parsed: {source}")]
    Parse {
        sequence_id: i64,
        patient_ref: String,
        #[source]
        source: adt::ParseError,
    },

    #[error("{field_group} of tumor {tumor_id} (patient {patient_ref}) has no effective date")]
    MissingEffectiveDate {
        patient_ref: String,
        tumor_id: String,
        field_group: &'static str,
    },

    #[error("configuration error: {0}")]
    Configuration(#[from] fhir::FhirError),

    #[error("failed to read {path}: {source}", path = path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid ledger: {0}")]
    InvalidLedger(String),
}

fn display_sequence_id(sequence_id: &Option<i64>) -> String {
    sequence_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "unknown".into())
}

pub type ObdsResult<T> = std::result::Result<T, ObdsError>;
