//! ADT/GEKID wire/boundary support.
//!
//! This crate translates raw registry report payloads (ADT/GEKID XML exports) into the flat
//! [`ParsedReport`] model consumed by the consolidation pipeline in `obds-core`.
//!
//! The nested report hierarchy (patient → report → diagnosis → histology/TNM/surgery sub-trees)
//! is flattened here into optional field groups. Downstream resolution never sees where in the
//! source tree a value was found.

pub mod model;
mod wire;
mod xml;

pub use model::{
    Histology, MetastasisSite, ParsedReport, StagingContext, Tnm, TnmComponent, VitalStatus,
};
pub use xml::AdtXmlParser;

use thiserror::Error;

/// Errors returned while turning a raw payload into a [`ParsedReport`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("payload is empty")]
    EmptyPayload,

    #[error("report schema mismatch at {path}: {message}")]
    InvalidXml { path: String, message: String },

    #[error("payload contains no report (Meldung)")]
    MissingReport,

    #[error("report {report_id} carries no tumor case id")]
    MissingTumorId { report_id: String },

    #[error("invalid date in {field}: {source}")]
    InvalidDate {
        field: &'static str,
        #[source]
        source: obds_types::DateError,
    },
}

/// Result alias for parser operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Turns one raw report payload into a [`ParsedReport`].
///
/// Implementations must be deterministic and must not depend on anything but the payload.
pub trait ReportParser: Send + Sync {
    fn parse(&self, payload: &str) -> ParseResult<ParsedReport>;
}
