//! # oBDS Core
//!
//! Core consolidation and mapping logic for registry report batches.
//!
//! This crate turns a batch of versioned report exports into FHIR observations:
//! - [`ReportLedger`]: the ordered, validated records of one batch
//! - [`ConsolidationResolver`]: one authoritative value per field group and tumor case
//! - [`ObservationMapper`]: consolidated state to coded observations
//! - [`ObservationProcessor`]: the whole pipeline, ending in a transaction bundle
//!
//! **No transport concerns**: how ledgers arrive and where bundles go belongs in the runner and
//! the CLI.

pub mod config;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod mapping;
pub mod processor;
pub mod resolver;
pub mod validation;

pub use config::CoreConfig;
pub use error::{ObdsError, ObdsResult};
pub use ledger::{ReportExportRecord, ReportLedger};
pub use mapping::ObservationMapper;
pub use processor::ObservationProcessor;
pub use resolver::{
    ConsolidatedTumorState, ConsolidationResolver, DistantMetastasis, Grading, Provenance,
    Selected,
};
