//! Transaction bundle assembly and rendering.
//!
//! The assembler is the last step of a batch: it takes the ordered observations of every tumor
//! case and wraps them into one FHIR R4 `transaction` bundle with an idempotent `PUT` per entry.
//! An empty input produces no bundle at all, which callers must treat as "nothing to send".

use crate::observation::ObservationWire;
use crate::{FhirResult, Observation, ObservationData, ResourceId};
use serde::Serialize;

const BUNDLE_ID_SYSTEM: &str = "urn:obds:bundle";

/// Domain-level carrier for an assembled bundle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundleData {
    pub id: ResourceId,
    pub entries: Vec<ObservationData>,
}

impl BundleData {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false` for a bundle produced by [`BundleAssembler::assemble`].
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Wraps observation records into a bundle.
pub struct BundleAssembler;

impl BundleAssembler {
    /// Assemble observations into a bundle, keeping their order.
    ///
    /// Returns `None` when `entries` is empty. The bundle id is derived from the entry ids, so
    /// the same observations always give the same bundle id.
    pub fn assemble(entries: Vec<ObservationData>) -> Option<BundleData> {
        if entries.is_empty() {
            return None;
        }

        let name = entries
            .iter()
            .map(|entry| entry.id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        Some(BundleData {
            id: ResourceId::for_identifier(BUNDLE_ID_SYSTEM, &name),
            entries,
        })
    }
}

/// Bundle resource operations.
pub struct Bundle;

impl Bundle {
    /// Render a bundle as FHIR JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError::Serialization`] if JSON serialisation fails.
    pub fn render(data: &BundleData) -> FhirResult<String> {
        let wire = BundleWire {
            resource_type: "Bundle",
            id: data.id.to_string(),
            bundle_type: "transaction",
            entry: data
                .entries
                .iter()
                .map(|observation| EntryWire {
                    full_url: observation.id.urn(),
                    resource: Observation::to_wire(observation),
                    request: RequestWire {
                        method: "PUT",
                        url: format!("Observation/{}", observation.id),
                    },
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&wire)?)
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BundleWire {
    resource_type: &'static str,
    id: String,
    #[serde(rename = "type")]
    bundle_type: &'static str,
    entry: Vec<EntryWire>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EntryWire {
    full_url: String,
    resource: ObservationWire,
    request: RequestWire,
}

#[derive(Debug, Serialize)]
struct RequestWire {
    method: &'static str,
    url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Coding, CodeableConcept, Identifier, ObservationCategory, ObservationStatus};
    use obds_types::ReportDate;
    use serde_json::Value;

    fn observation(value: &str) -> ObservationData {
        let identifier = format!("P1T1-{value}");
        ObservationData {
            id: ResourceId::for_identifier("https://example.org/obs", &identifier),
            identifier: Identifier {
                system: "https://example.org/obs".into(),
                value: identifier,
            },
            profile: "https://example.org/StructureDefinition/Grading".into(),
            status: ObservationStatus::Final,
            category: ObservationCategory::Grading,
            category_coding: Coding::new("http://hl7.org/obs-category", "laboratory"),
            code: Coding::new("http://loinc.org", "59542-1"),
            subject: ResourceId::for_identifier("https://example.org/pid", "P1"),
            effective: ReportDate::from_ymd(2021, 3, 18).expect("valid date"),
            value: CodeableConcept::coding(Coding::new("https://example.org/grading", value)),
            body_site: None,
            components: Vec::new(),
        }
    }

    #[test]
    fn empty_input_yields_no_bundle() {
        assert!(BundleAssembler::assemble(Vec::new()).is_none());
    }

    #[test]
    fn keeps_entry_order_and_derives_stable_id() {
        let first = BundleAssembler::assemble(vec![observation("T"), observation("G2")])
            .expect("bundle");
        let again = BundleAssembler::assemble(vec![observation("T"), observation("G2")])
            .expect("bundle");
        let reordered = BundleAssembler::assemble(vec![observation("G2"), observation("T")])
            .expect("bundle");

        assert_eq!(first.len(), 2);
        assert_eq!(first.entries[0].value.codings[0].code, "T");
        assert_eq!(first.id, again.id);
        assert_ne!(first.id, reordered.id);
    }

    #[test]
    fn renders_transaction_with_put_requests() {
        let bundle = BundleAssembler::assemble(vec![observation("T")]).expect("bundle");
        let json = Bundle::render(&bundle).expect("render");
        let value: Value = serde_json::from_str(&json).expect("valid json");

        assert_eq!(value["resourceType"], "Bundle");
        assert_eq!(value["type"], "transaction");

        let entry = &value["entry"][0];
        let id = bundle.entries[0].id;
        assert_eq!(entry["fullUrl"], id.urn());
        assert_eq!(entry["request"]["method"], "PUT");
        assert_eq!(entry["request"]["url"], format!("Observation/{id}"));
        assert_eq!(entry["resource"]["id"], id.to_string());
    }
}
