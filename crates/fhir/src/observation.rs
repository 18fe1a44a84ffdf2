//! FHIR Observation domain model and JSON rendering.
//!
//! This module provides both domain-level types and wire models for Observation resources.
//!
//! Responsibilities:
//! - Define public domain-level types the mapping layer fills in
//! - Define the FHIR R4 JSON wire model (camelCase, absent values omitted)
//! - Render domain values to the wire model
//!
//! Notes:
//! - Observations are write-only from the pipeline's point of view; there is no parse path

use crate::{FhirResult, ResourceId};
use obds_types::ReportDate;
use serde::Serialize;

// ============================================================================
// Public domain-level types
// ============================================================================

/// The observation categories the pipeline emits, in bundle order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObservationCategory {
    Histology,
    Grading,
    DistantMetastasis,
    ClinicalStaging,
    PathologicalStaging,
    VitalStatus,
}

impl ObservationCategory {
    pub const ALL: [ObservationCategory; 6] = [
        ObservationCategory::Histology,
        ObservationCategory::Grading,
        ObservationCategory::DistantMetastasis,
        ObservationCategory::ClinicalStaging,
        ObservationCategory::PathologicalStaging,
        ObservationCategory::VitalStatus,
    ];

    /// Stable name used in identifier values and logs.
    pub fn slug(self) -> &'static str {
        match self {
            ObservationCategory::Histology => "histology",
            ObservationCategory::Grading => "grading",
            ObservationCategory::DistantMetastasis => "distant-metastasis",
            ObservationCategory::ClinicalStaging => "tnm-clinical",
            ObservationCategory::PathologicalStaging => "tnm-pathological",
            ObservationCategory::VitalStatus => "vital-status",
        }
    }

    /// Code in the HL7 observation-category system.
    pub fn fhir_category(self) -> &'static str {
        match self {
            ObservationCategory::Histology | ObservationCategory::Grading => "laboratory",
            _ => "exam",
        }
    }
}

/// Observation `status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObservationStatus {
    Final,
    Amended,
}

impl ObservationStatus {
    fn to_wire(self) -> &'static str {
        match self {
            ObservationStatus::Final => "final",
            ObservationStatus::Amended => "amended",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Coding {
    pub system: String,
    pub code: String,
    pub display: Option<String>,
    pub version: Option<String>,
}

impl Coding {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            code: code.into(),
            display: None,
            version: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn with_version(mut self, version: Option<impl Into<String>>) -> Self {
        self.version = version.map(Into::into);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeableConcept {
    pub codings: Vec<Coding>,
    pub text: Option<String>,
}

impl CodeableConcept {
    pub fn coding(coding: Coding) -> Self {
        Self {
            codings: vec![coding],
            text: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.codings.is_empty() && self.text.is_none()
    }
}

/// A coded extension (`valueCodeableConcept`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extension {
    pub url: String,
    pub value: CodeableConcept,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identifier {
    pub system: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservationComponent {
    pub code: Coding,
    pub value: CodeableConcept,
    pub extensions: Vec<Extension>,
}

/// Domain-level carrier for one Observation resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservationData {
    pub id: ResourceId,
    pub identifier: Identifier,
    pub profile: String,
    pub status: ObservationStatus,
    pub category: ObservationCategory,
    /// Resolved HL7 observation-category coding.
    pub category_coding: Coding,
    pub code: Coding,
    pub subject: ResourceId,
    pub effective: ReportDate,
    pub value: CodeableConcept,
    pub body_site: Option<CodeableConcept>,
    pub components: Vec<ObservationComponent>,
}

// ============================================================================
// Public Observation operations
// ============================================================================

/// Observation resource operations.
pub struct Observation;

impl Observation {
    /// Render an observation as FHIR JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError::Serialization`] if JSON serialisation fails.
    pub fn render(data: &ObservationData) -> FhirResult<String> {
        let wire = domain_to_wire(data);
        Ok(serde_json::to_string_pretty(&wire)?)
    }

    pub(crate) fn to_wire(data: &ObservationData) -> ObservationWire {
        domain_to_wire(data)
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ObservationWire {
    resource_type: &'static str,
    id: String,
    meta: MetaWire,
    identifier: Vec<IdentifierWire>,
    status: &'static str,
    category: Vec<CodeableConceptWire>,
    code: CodeableConceptWire,
    subject: ReferenceWire,
    effective_date_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_codeable_concept: Option<CodeableConceptWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body_site: Option<CodeableConceptWire>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    component: Vec<ComponentWire>,
}

#[derive(Debug, Serialize)]
struct MetaWire {
    profile: Vec<String>,
}

#[derive(Debug, Serialize)]
struct IdentifierWire {
    system: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct ReferenceWire {
    reference: String,
}

#[derive(Debug, Serialize)]
struct CodingWire {
    system: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    display: Option<String>,
}

#[derive(Debug, Serialize)]
struct CodeableConceptWire {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    coding: Vec<CodingWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtensionWire {
    url: String,
    value_codeable_concept: CodeableConceptWire,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ComponentWire {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    extension: Vec<ExtensionWire>,
    code: CodeableConceptWire,
    value_codeable_concept: CodeableConceptWire,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn coding_to_wire(coding: &Coding) -> CodingWire {
    CodingWire {
        system: coding.system.clone(),
        version: coding.version.clone(),
        code: coding.code.clone(),
        display: coding.display.clone(),
    }
}

fn concept_to_wire(concept: &CodeableConcept) -> CodeableConceptWire {
    CodeableConceptWire {
        coding: concept.codings.iter().map(coding_to_wire).collect(),
        text: concept.text.clone(),
    }
}

fn single_coding(coding: &Coding) -> CodeableConceptWire {
    CodeableConceptWire {
        coding: vec![coding_to_wire(coding)],
        text: None,
    }
}

fn domain_to_wire(data: &ObservationData) -> ObservationWire {
    ObservationWire {
        resource_type: "Observation",
        id: data.id.to_string(),
        meta: MetaWire {
            profile: vec![data.profile.clone()],
        },
        identifier: vec![IdentifierWire {
            system: data.identifier.system.clone(),
            value: data.identifier.value.clone(),
        }],
        status: data.status.to_wire(),
        category: vec![single_coding(&data.category_coding)],
        code: single_coding(&data.code),
        subject: ReferenceWire {
            reference: format!("Patient/{}", data.subject),
        },
        effective_date_time: data.effective.to_fhir(),
        value_codeable_concept: Some(&data.value)
            .filter(|v| !v.is_empty())
            .map(concept_to_wire),
        body_site: data.body_site.as_ref().map(concept_to_wire),
        component: data
            .components
            .iter()
            .map(|c| ComponentWire {
                extension: c
                    .extensions
                    .iter()
                    .map(|e| ExtensionWire {
                        url: e.url.clone(),
                        value_codeable_concept: concept_to_wire(&e.value),
                    })
                    .collect(),
                code: single_coding(&c.code),
                value_codeable_concept: concept_to_wire(&c.value),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample() -> ObservationData {
        ObservationData {
            id: ResourceId::for_identifier("https://example.org/obs", "P1T1-tnm-pathological"),
            identifier: Identifier {
                system: "https://example.org/obs".into(),
                value: "P1T1-tnm-pathological".into(),
            },
            profile: "https://example.org/StructureDefinition/TNMp".into(),
            status: ObservationStatus::Amended,
            category: ObservationCategory::PathologicalStaging,
            category_coding: Coding::new("http://hl7.org/obs-category", "exam"),
            code: Coding::new("http://loinc.org", "21902-2").with_display("Stage group.pathology"),
            subject: ResourceId::for_identifier("https://example.org/pid", "P1"),
            effective: ReportDate::parse("00.03.2021").expect("valid date"),
            value: CodeableConcept {
                codings: Vec::new(),
                text: Some("pN2a".into()),
            },
            body_site: None,
            components: vec![ObservationComponent {
                code: Coding::new("http://loinc.org", "21900-6"),
                value: CodeableConcept::coding(Coding::new("https://example.org/tnm-n", "2a")),
                extensions: vec![Extension {
                    url: "https://example.org/ext/prefix".into(),
                    value: CodeableConcept::coding(Coding::new("https://example.org/prefix", "p")),
                }],
            }],
        }
    }

    #[test]
    fn renders_fhir_json() {
        let data = sample();
        let json = Observation::render(&data).expect("render");
        let value: Value = serde_json::from_str(&json).expect("valid json");

        assert_eq!(value["resourceType"], "Observation");
        assert_eq!(value["id"], data.id.to_string());
        assert_eq!(value["status"], "amended");
        assert_eq!(value["effectiveDateTime"], "2021-03");
        assert_eq!(value["subject"]["reference"], format!("Patient/{}", data.subject));
        assert_eq!(value["valueCodeableConcept"]["text"], "pN2a");
        assert!(value["valueCodeableConcept"].get("coding").is_none());
        assert!(value.get("bodySite").is_none());

        let component = &value["component"][0];
        assert_eq!(component["code"]["coding"][0]["code"], "21900-6");
        assert_eq!(component["valueCodeableConcept"]["coding"][0]["code"], "2a");
        assert_eq!(
            component["extension"][0]["valueCodeableConcept"]["coding"][0]["code"],
            "p"
        );
    }

    #[test]
    fn omits_empty_value_and_components() {
        let data = ObservationData {
            value: CodeableConcept::default(),
            components: Vec::new(),
            ..sample()
        };
        let value: Value =
            serde_json::from_str(&Observation::render(&data).expect("render")).expect("json");
        assert!(value.get("valueCodeableConcept").is_none());
        assert!(value.get("component").is_none());
    }

    #[test]
    fn coding_version_is_rendered_when_present() {
        let data = ObservationData {
            value: CodeableConcept::coding(
                Coding::new("urn:oid:2.16.840.1.113883.6.43.1", "9391/3")
                    .with_version(Some("31")),
            ),
            ..sample()
        };
        let value: Value =
            serde_json::from_str(&Observation::render(&data).expect("render")).expect("json");
        assert_eq!(value["valueCodeableConcept"]["coding"][0]["version"], "31");
    }

    #[test]
    fn category_slugs_are_distinct() {
        let mut slugs: Vec<_> = ObservationCategory::ALL.iter().map(|c| c.slug()).collect();
        slugs.sort_unstable();
        slugs.dedup();
        assert_eq!(slugs.len(), ObservationCategory::ALL.len());
        assert_eq!(ObservationCategory::Grading.fhir_category(), "laboratory");
        assert_eq!(ObservationCategory::VitalStatus.fhir_category(), "exam");
    }
}
