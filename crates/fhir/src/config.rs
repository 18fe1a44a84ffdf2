//! Code/display configuration for the observation mapping.
//!
//! This module provides both the validated domain-level configuration and its YAML wire model.
//!
//! Responsibilities:
//! - Define the strict YAML wire model (`deny_unknown_fields`) with every key optional, so that
//!   validation can report *all* missing keys at once instead of the first one serde trips over
//! - Validate that every observation category and every required code system is configured
//! - Expose infallible accessors once validated, so the mapping never hits a missing entry
//!   mid-batch
//!
//! Notes:
//! - A complete default configuration is bundled with the crate ([`FhirConfig::bundled`])

use crate::{FhirError, FhirResult, ObservationCategory};
use serde::Deserialize;

const BUNDLED_CONFIG: &str = include_str!("../config/fhir.yaml");

// ============================================================================
// Public domain-level types
// ============================================================================

/// Identifier and code system URLs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeSystems {
    pub patient_id: String,
    pub observation_id: String,
    pub observation_category: String,
    pub loinc: String,
    pub icd_o_3_morphology: String,
    pub grading: String,
    pub uicc: String,
    pub tnm_t: String,
    pub tnm_n: String,
    pub tnm_m: String,
    pub tnm_prefix: String,
    pub tnm_y_symbol: String,
    pub tnm_r_symbol: String,
    pub tnm_m_symbol: String,
    pub metastasis_localisation: String,
    pub yes_no_unknown: String,
    pub icd_10_gm: String,
}

/// A LOINC code with its display text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeDisplay {
    pub code: String,
    pub display: String,
}

/// Profile and primary code of one observation category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryMapping {
    pub profile: String,
    pub code: CodeDisplay,
}

/// Component codes of a staging category.
///
/// T, N and M are required. The symbol components are optional; when not configured the
/// corresponding symbols are only carried in the formula text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagingComponents {
    pub t: CodeDisplay,
    pub n: CodeDisplay,
    pub m: CodeDisplay,
    pub y_symbol: Option<CodeDisplay>,
    pub r_symbol: Option<CodeDisplay>,
    pub m_symbol: Option<CodeDisplay>,
}

/// A staging category: primary mapping plus component codes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagingMapping {
    pub category: CategoryMapping,
    pub components: StagingComponents,
}

/// Validated code/display configuration.
///
/// Construct via [`FhirConfig::parse`] or [`FhirConfig::bundled`]; both guarantee that every
/// [`ObservationCategory`] has a complete mapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FhirConfig {
    systems: CodeSystems,
    tnm_prefix_extension: String,
    histology: CategoryMapping,
    grading: CategoryMapping,
    distant_metastasis: CategoryMapping,
    clinical_staging: StagingMapping,
    pathological_staging: StagingMapping,
    vital_status: CategoryMapping,
}

impl FhirConfig {
    /// Parse and validate a configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Configuration`] if:
    /// - the YAML does not match the configuration schema (the message names the failing path),
    /// - unknown keys are present,
    /// - any required system, extension or category entry is missing or blank (the message lists
    ///   every missing key).
    pub fn parse(yaml_text: &str) -> FhirResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let wire = match serde_path_to_error::deserialize::<_, FhirConfigWire>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(FhirError::Configuration(format!(
                    "configuration schema mismatch at {path}: {source}"
                )));
            }
        };

        wire_to_domain(wire)
    }

    /// The configuration shipped with this crate.
    ///
    /// # Errors
    ///
    /// Only fails if the bundled file itself is broken, which the crate's tests rule out.
    pub fn bundled() -> FhirResult<Self> {
        Self::parse(BUNDLED_CONFIG)
    }

    pub fn systems(&self) -> &CodeSystems {
        &self.systems
    }

    pub fn tnm_prefix_extension(&self) -> &str {
        &self.tnm_prefix_extension
    }

    /// Profile and code for any category.
    pub fn category(&self, category: ObservationCategory) -> &CategoryMapping {
        match category {
            ObservationCategory::Histology => &self.histology,
            ObservationCategory::Grading => &self.grading,
            ObservationCategory::DistantMetastasis => &self.distant_metastasis,
            ObservationCategory::ClinicalStaging => &self.clinical_staging.category,
            ObservationCategory::PathologicalStaging => &self.pathological_staging.category,
            ObservationCategory::VitalStatus => &self.vital_status,
        }
    }

    pub fn clinical_staging(&self) -> &StagingMapping {
        &self.clinical_staging
    }

    pub fn pathological_staging(&self) -> &StagingMapping {
        &self.pathological_staging
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FhirConfigWire {
    #[serde(default)]
    systems: Option<SystemsWire>,
    #[serde(default)]
    extensions: Option<ExtensionsWire>,
    #[serde(default)]
    categories: Option<CategoriesWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SystemsWire {
    patient_id: Option<String>,
    observation_id: Option<String>,
    observation_category: Option<String>,
    loinc: Option<String>,
    icd_o_3_morphology: Option<String>,
    grading: Option<String>,
    uicc: Option<String>,
    tnm_t: Option<String>,
    tnm_n: Option<String>,
    tnm_m: Option<String>,
    tnm_prefix: Option<String>,
    tnm_y_symbol: Option<String>,
    tnm_r_symbol: Option<String>,
    tnm_m_symbol: Option<String>,
    metastasis_localisation: Option<String>,
    yes_no_unknown: Option<String>,
    icd_10_gm: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExtensionsWire {
    tnm_prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CategoriesWire {
    histology: Option<CategoryWire>,
    grading: Option<CategoryWire>,
    distant_metastasis: Option<CategoryWire>,
    clinical_staging: Option<CategoryWire>,
    pathological_staging: Option<CategoryWire>,
    vital_status: Option<CategoryWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CategoryWire {
    profile: Option<String>,
    code: Option<String>,
    display: Option<String>,
    #[serde(default)]
    components: Option<ComponentsWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ComponentsWire {
    t: Option<CodeDisplayWire>,
    n: Option<CodeDisplayWire>,
    m: Option<CodeDisplayWire>,
    y_symbol: Option<CodeDisplayWire>,
    r_symbol: Option<CodeDisplayWire>,
    m_symbol: Option<CodeDisplayWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CodeDisplayWire {
    code: Option<String>,
    display: Option<String>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

/// Collects the dotted paths of every missing key while translating.
#[derive(Default)]
struct Missing(Vec<String>);

impl Missing {
    fn require(&mut self, path: &str, value: Option<String>) -> String {
        match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            Some(v) => v,
            None => {
                self.0.push(path.to_string());
                String::new()
            }
        }
    }

    fn code_display(&mut self, path: &str, wire: Option<CodeDisplayWire>) -> CodeDisplay {
        let wire = wire.unwrap_or_default();
        CodeDisplay {
            code: self.require(&format!("{path}.code"), wire.code),
            display: self.require(&format!("{path}.display"), wire.display),
        }
    }

    fn optional_code_display(
        &mut self,
        path: &str,
        wire: Option<CodeDisplayWire>,
    ) -> Option<CodeDisplay> {
        wire.map(|w| self.code_display(path, Some(w)))
    }

    fn category(&mut self, path: &str, wire: Option<&CategoryWire>) -> CategoryMapping {
        let (profile, code, display) = match wire {
            Some(w) => (w.profile.clone(), w.code.clone(), w.display.clone()),
            None => (None, None, None),
        };
        CategoryMapping {
            profile: self.require(&format!("{path}.profile"), profile),
            code: CodeDisplay {
                code: self.require(&format!("{path}.code"), code),
                display: self.require(&format!("{path}.display"), display),
            },
        }
    }

    fn staging(&mut self, path: &str, wire: Option<CategoryWire>) -> StagingMapping {
        let category = self.category(path, wire.as_ref());
        let components = wire.and_then(|w| w.components).unwrap_or_default();
        let path = format!("{path}.components");
        StagingMapping {
            category,
            components: StagingComponents {
                t: self.code_display(&format!("{path}.t"), components.t),
                n: self.code_display(&format!("{path}.n"), components.n),
                m: self.code_display(&format!("{path}.m"), components.m),
                y_symbol: self.optional_code_display(&format!("{path}.y_symbol"), components.y_symbol),
                r_symbol: self.optional_code_display(&format!("{path}.r_symbol"), components.r_symbol),
                m_symbol: self.optional_code_display(&format!("{path}.m_symbol"), components.m_symbol),
            },
        }
    }
}

fn wire_to_domain(wire: FhirConfigWire) -> FhirResult<FhirConfig> {
    let mut missing = Missing::default();

    let s = wire.systems.unwrap_or_default();
    let systems = CodeSystems {
        patient_id: missing.require("systems.patient_id", s.patient_id),
        observation_id: missing.require("systems.observation_id", s.observation_id),
        observation_category: missing
            .require("systems.observation_category", s.observation_category),
        loinc: missing.require("systems.loinc", s.loinc),
        icd_o_3_morphology: missing.require("systems.icd_o_3_morphology", s.icd_o_3_morphology),
        grading: missing.require("systems.grading", s.grading),
        uicc: missing.require("systems.uicc", s.uicc),
        tnm_t: missing.require("systems.tnm_t", s.tnm_t),
        tnm_n: missing.require("systems.tnm_n", s.tnm_n),
        tnm_m: missing.require("systems.tnm_m", s.tnm_m),
        tnm_prefix: missing.require("systems.tnm_prefix", s.tnm_prefix),
        tnm_y_symbol: missing.require("systems.tnm_y_symbol", s.tnm_y_symbol),
        tnm_r_symbol: missing.require("systems.tnm_r_symbol", s.tnm_r_symbol),
        tnm_m_symbol: missing.require("systems.tnm_m_symbol", s.tnm_m_symbol),
        metastasis_localisation: missing
            .require("systems.metastasis_localisation", s.metastasis_localisation),
        yes_no_unknown: missing.require("systems.yes_no_unknown", s.yes_no_unknown),
        icd_10_gm: missing.require("systems.icd_10_gm", s.icd_10_gm),
    };

    let tnm_prefix_extension = missing.require(
        "extensions.tnm_prefix",
        wire.extensions.unwrap_or_default().tnm_prefix,
    );

    let c = wire.categories.unwrap_or_default();
    let config = FhirConfig {
        systems,
        tnm_prefix_extension,
        histology: missing.category("categories.histology", c.histology.as_ref()),
        grading: missing.category("categories.grading", c.grading.as_ref()),
        distant_metastasis: missing
            .category("categories.distant_metastasis", c.distant_metastasis.as_ref()),
        clinical_staging: missing.staging("categories.clinical_staging", c.clinical_staging),
        pathological_staging: missing
            .staging("categories.pathological_staging", c.pathological_staging),
        vital_status: missing.category("categories.vital_status", c.vital_status.as_ref()),
    };

    if !missing.0.is_empty() {
        return Err(FhirError::Configuration(format!(
            "missing configuration entries: {}",
            missing.0.join(", ")
        )));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_config_is_complete() {
        let config = FhirConfig::bundled().expect("bundled config must validate");
        assert_eq!(config.category(ObservationCategory::Histology).code.code, "59847-4");
        assert_eq!(config.category(ObservationCategory::Grading).code.code, "59542-1");
        assert_eq!(config.clinical_staging().components.n.code, "21906-3");
        assert_eq!(config.pathological_staging().components.t.code, "21899-0");
        assert_eq!(config.systems().loinc, "http://loinc.org");
        for category in ObservationCategory::ALL {
            assert!(!config.category(category).profile.is_empty());
        }
    }

    #[test]
    fn reports_every_missing_category() {
        let yaml = BUNDLED_CONFIG
            .split("categories:")
            .next()
            .expect("systems section")
            .to_string();

        let err = FhirConfig::parse(&yaml).expect_err("categories missing");
        match err {
            FhirError::Configuration(msg) => {
                assert!(msg.contains("categories.histology.code"));
                assert!(msg.contains("categories.vital_status.profile"));
                assert!(msg.contains("categories.clinical_staging.components.t.code"));
                assert!(!msg.contains("systems."));
            }
            other => panic!("expected Configuration error, got {other:?}"),
        }
    }

    #[test]
    fn blank_values_count_as_missing() {
        let yaml = BUNDLED_CONFIG.replace("  loinc: http://loinc.org", "  loinc: \"  \"");
        let err = FhirConfig::parse(&yaml).expect_err("blank loinc");
        assert!(matches!(err, FhirError::Configuration(msg) if msg.contains("systems.loinc")));
    }

    #[test]
    fn optional_symbol_components_may_be_omitted() {
        let yaml: String = BUNDLED_CONFIG
            .lines()
            .filter(|line| !line.contains("_symbol: {"))
            .map(|line| format!("{line}\n"))
            .collect();

        let config = FhirConfig::parse(&yaml).expect("symbols are optional");
        assert!(config.clinical_staging().components.y_symbol.is_none());
        assert!(config.pathological_staging().components.m_symbol.is_none());
    }

    #[test]
    fn rejects_unknown_keys() {
        let yaml = format!("{BUNDLED_CONFIG}\nunexpected_key: true\n");
        let err = FhirConfig::parse(&yaml).expect_err("unknown key");
        assert!(
            matches!(err, FhirError::Configuration(msg) if msg.contains("unexpected_key"))
        );
    }

    #[test]
    fn rejects_wrong_types_with_path() {
        let yaml = "systems:\n  loinc: [not, a, string]\n";
        let err = FhirConfig::parse(yaml).expect_err("wrong type");
        assert!(matches!(err, FhirError::Configuration(msg) if msg.contains("systems.loinc")));
    }
}
