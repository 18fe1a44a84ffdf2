//! Report Export Ledger.
//!
//! A ledger is the ordered set of report export records of one processing batch. Records are
//! appended in arrival order and never reordered, deduplicated or mutated; resolution decides
//! later which of them matter.
//!
//! Ledger files are JSON arrays. Each entry is deserialised on its own so that a broken entry
//! only costs that entry (see [`ReportLedger::from_json`]).

use crate::validation::validate_patient_ref;
use crate::{ObdsError, ObdsResult};
use obds_types::NonEmptyText;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// One versioned report export. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportExportRecord {
    sequence_id: i64,
    patient_ref: NonEmptyText,
    report_id: NonEmptyText,
    version: u32,
    payload: String,
}

impl ReportExportRecord {
    /// Build a record, checking that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns [`ObdsError::MalformedRecord`] if the patient reference is blank or unsafe, the
    /// report id is blank, or the payload is empty.
    pub fn new(
        sequence_id: i64,
        patient_ref: &str,
        report_id: &str,
        version: u32,
        payload: impl Into<String>,
    ) -> ObdsResult<Self> {
        let malformed = |reason: String| ObdsError::MalformedRecord {
            sequence_id: Some(sequence_id),
            reason,
        };

        validate_patient_ref(patient_ref.trim()).map_err(|e| malformed(e.to_string()))?;
        let patient_ref =
            NonEmptyText::new(patient_ref).map_err(|_| malformed("patient reference is empty".into()))?;
        let report_id =
            NonEmptyText::new(report_id).map_err(|_| malformed("report id is empty".into()))?;

        let payload = payload.into();
        if payload.trim().is_empty() {
            return Err(malformed("payload is empty".into()));
        }

        Ok(Self {
            sequence_id,
            patient_ref,
            report_id,
            version,
            payload,
        })
    }

    pub fn sequence_id(&self) -> i64 {
        self.sequence_id
    }

    pub fn patient_ref(&self) -> &NonEmptyText {
        &self.patient_ref
    }

    pub fn report_id(&self) -> &NonEmptyText {
        &self.report_id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// The ordered records of one batch.
#[derive(Clone, Debug, Default)]
pub struct ReportLedger {
    records: Vec<ReportExportRecord>,
    rejected: usize,
}

impl ReportLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. No reordering and no deduplication.
    pub fn add_record(&mut self, record: ReportExportRecord) {
        self.records.push(record);
    }

    /// Every record in arrival order.
    pub fn records(&self) -> &[ReportExportRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of entries rejected while ingesting.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Ingest one JSON ledger entry.
    ///
    /// Entries accept either snake_case keys or the registry export column names (`ID`,
    /// `REFERENZ_NUMMER`, `LKR_MELDUNG`, `VERSIONSNUMMER`, `XML_DATEN`).
    ///
    /// # Errors
    ///
    /// Returns [`ObdsError::MalformedRecord`] when the entry does not have the expected shape or
    /// fails the required-field checks. The ledger is left unchanged in that case.
    pub fn ingest(&mut self, entry: Value) -> ObdsResult<()> {
        let sequence_id = ["sequence_id", "ID"]
            .iter()
            .find_map(|key| entry.get(key).and_then(Value::as_i64));

        let wire = match serde_path_to_error::deserialize::<_, LedgerEntryWire>(entry) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let path = if path.is_empty() || path == "." {
                    "<root>".to_string()
                } else {
                    path
                };
                return Err(ObdsError::MalformedRecord {
                    sequence_id,
                    reason: format!("ledger entry schema mismatch at {path}: {}", err.into_inner()),
                });
            }
        };

        let report_id = match wire.report_id {
            ReportIdWire::Text(text) => text,
            ReportIdWire::Number(number) => number.to_string(),
        };

        let record = ReportExportRecord::new(
            wire.sequence_id,
            &wire.patient_ref,
            &report_id,
            wire.version,
            wire.payload,
        )?;
        self.add_record(record);
        Ok(())
    }

    /// Build a ledger from a JSON array of entries.
    ///
    /// Malformed entries are logged and skipped; see [`ReportLedger::rejected`].
    ///
    /// # Errors
    ///
    /// Returns [`ObdsError::InvalidLedger`] if the text is not a JSON array at all.
    pub fn from_json(json: &str) -> ObdsResult<Self> {
        let entries: Vec<Value> = serde_json::from_str(json)
            .map_err(|e| ObdsError::InvalidLedger(format!("expected a JSON array of entries: {e}")))?;

        let mut ledger = Self::new();
        for (index, entry) in entries.into_iter().enumerate() {
            if let Err(err) = ledger.ingest(entry) {
                ledger.rejected += 1;
                tracing::warn!(index, error = %err, "rejected ledger entry");
            }
        }

        tracing::debug!(
            records = ledger.len(),
            rejected = ledger.rejected,
            "ledger ingested"
        );
        Ok(ledger)
    }

    /// Read a ledger file. See [`ReportLedger::from_json`].
    ///
    /// # Errors
    ///
    /// Returns [`ObdsError::FileRead`] if the file cannot be read, otherwise as
    /// [`ReportLedger::from_json`].
    pub fn from_file(path: &Path) -> ObdsResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| ObdsError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
struct LedgerEntryWire {
    #[serde(alias = "ID")]
    sequence_id: i64,

    #[serde(alias = "REFERENZ_NUMMER")]
    patient_ref: String,

    #[serde(alias = "LKR_MELDUNG")]
    report_id: ReportIdWire,

    #[serde(alias = "VERSIONSNUMMER")]
    version: u32,

    #[serde(alias = "XML_DATEN")]
    payload: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReportIdWire {
    Text(String),
    Number(i64),
}
