//! FHIR R4 boundary for the oBDS observation pipeline.
//!
//! This crate provides **domain models**, **wire models** and **rendering helpers** for the
//! resources the pipeline emits:
//! - code/display configuration loaded from YAML ([`FhirConfig`])
//! - Observation resources ([`ObservationData`], rendered by [`Observation`])
//! - transaction bundles ([`BundleAssembler`], rendered by [`Bundle`])
//!
//! This crate focuses on:
//! - FHIR semantic alignment (profiles, code systems, components)
//! - serialisation to FHIR JSON
//! - deterministic resource identifiers
//!
//! It knows nothing about registry reports; callers hand it already-resolved values.

pub mod bundle;
pub mod config;
pub mod ids;
pub mod observation;

// Re-export facades
pub use bundle::{Bundle, BundleAssembler};
pub use observation::Observation;

// Re-export public domain-level types
pub use bundle::BundleData;
pub use config::{
    CategoryMapping, CodeDisplay, CodeSystems, FhirConfig, StagingComponents, StagingMapping,
};
pub use ids::ResourceId;
pub use observation::{
    CodeableConcept, Coding, Extension, Identifier, ObservationCategory, ObservationComponent,
    ObservationData, ObservationStatus,
};

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialisation error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
