//! Mapping Engine: consolidated tumor state to FHIR observations.
//!
//! The mapping is pure. All codes, displays, profiles and systems come from the injected
//! [`FhirConfig`], which is validated before the mapper can be built, so a missing code mapping
//! cannot surface while a batch is being mapped.
//!
//! Per tumor case the observations are emitted in a fixed order: histology, grading, distant
//! metastasis sites, clinical staging, pathological staging, vital status.

use crate::constants::{IDENTIFIER_SEPARATOR, METASTASIS_PRESENT_CODE};
use crate::resolver::{ConsolidatedTumorState, Provenance, Selected};
use crate::{ObdsError, ObdsResult};
use adt::{Tnm, TnmComponent};
use fhir::{
    CodeDisplay, CodeableConcept, Coding, Extension, FhirConfig, Identifier, ObservationCategory,
    ObservationComponent, ObservationData, ObservationStatus, ResourceId, StagingMapping,
};
use obds_types::{NonEmptyText, ReportDate};
use std::sync::Arc;

/// Maps consolidated tumor states to observation records.
#[derive(Clone, Debug)]
pub struct ObservationMapper {
    config: Arc<FhirConfig>,
}

impl ObservationMapper {
    pub fn new(config: Arc<FhirConfig>) -> Self {
        Self { config }
    }

    /// Map every state of a batch.
    ///
    /// Returns `None` when the whole batch produces no observation, which is a valid outcome
    /// distinct from an error.
    pub fn map_batch(&self, states: &[ConsolidatedTumorState]) -> Option<Vec<ObservationData>> {
        let observations: Vec<ObservationData> =
            states.iter().flat_map(|state| self.map_state(state)).collect();

        tracing::info!(
            tumor_cases = states.len(),
            observations = observations.len(),
            "mapped batch"
        );
        (!observations.is_empty()).then_some(observations)
    }

    /// Map one tumor case. Field groups without an effective date are logged and skipped.
    pub fn map_state(&self, state: &ConsolidatedTumorState) -> Vec<ObservationData> {
        let mut observations = Vec::new();
        let context = StateContext {
            mapper: self,
            state,
        };

        if let Some(histology) = &state.histology {
            let value = &histology.value;
            let mut concept = CodeableConcept::default();
            if let Some(morphology) = &value.morphology_code {
                concept.codings.push(
                    Coding::new(&self.config.systems().icd_o_3_morphology, morphology.as_str())
                        .with_version(value.morphology_version.as_ref().map(NonEmptyText::as_str)),
                );
            }
            concept.text = value.free_text.as_ref().map(NonEmptyText::to_string);
            context.push(
                &mut observations,
                ObservationCategory::Histology,
                None,
                value.date,
                &histology.provenance,
                |draft| draft.value = concept,
            );
        }

        if let Some(grading) = &state.grading {
            let concept = CodeableConcept::coding(Coding::new(
                &self.config.systems().grading,
                grading.value.code.as_str(),
            ));
            context.push(
                &mut observations,
                ObservationCategory::Grading,
                None,
                grading.value.date,
                &grading.provenance,
                |draft| draft.value = concept,
            );
        }

        if let Some(metastasis) = &state.distant_metastasis {
            let systems = self.config.systems();
            for (index, site) in metastasis.value.sites.iter().enumerate() {
                let body_site = site.localisation.as_ref().map(|localisation| {
                    CodeableConcept::coding(Coding::new(
                        &systems.metastasis_localisation,
                        localisation.as_str(),
                    ))
                });
                let qualifier = index.to_string();
                context.push(
                    &mut observations,
                    ObservationCategory::DistantMetastasis,
                    Some(qualifier.as_str()),
                    site.date,
                    &metastasis.provenance,
                    |draft| {
                        draft.value = CodeableConcept::coding(Coding::new(
                            &systems.yes_no_unknown,
                            METASTASIS_PRESENT_CODE,
                        ));
                        draft.body_site = body_site;
                    },
                );
            }
        }

        if let Some(staging) = &state.clinical_tnm {
            context.push_staging(
                &mut observations,
                ObservationCategory::ClinicalStaging,
                self.config.clinical_staging(),
                staging,
            );
        }

        if let Some(staging) = &state.pathological_tnm {
            context.push_staging(
                &mut observations,
                ObservationCategory::PathologicalStaging,
                self.config.pathological_staging(),
                staging,
            );
        }

        if let Some(vital_status) = &state.vital_status {
            let value = &vital_status.value;
            let concept = value
                .cause_icd
                .as_ref()
                .map(|cause| {
                    CodeableConcept::coding(
                        Coding::new(&self.config.systems().icd_10_gm, cause.as_str()).with_version(
                            value.cause_icd_version.as_ref().map(NonEmptyText::as_str),
                        ),
                    )
                })
                .unwrap_or_default();
            context.push(
                &mut observations,
                ObservationCategory::VitalStatus,
                None,
                value.death_date,
                &vital_status.provenance,
                |draft| draft.value = concept,
            );
        }

        observations
    }

    /// Value and components of a staging observation.
    fn staging_content(
        &self,
        mapping: &StagingMapping,
        tnm: &Tnm,
    ) -> (CodeableConcept, Vec<ObservationComponent>) {
        let systems = self.config.systems();

        let mut value = CodeableConcept::default();
        if let Some(stage) = &tnm.uicc_stage {
            value.codings.push(
                Coding::new(&systems.uicc, stage.as_str())
                    .with_version(tnm.version.as_ref().map(NonEmptyText::as_str)),
            );
        }
        let formula = tnm.formula();
        value.text = (!formula.is_empty()).then_some(formula);

        let components = &mapping.components;
        let mut parts = Vec::new();
        for (component, code, system) in [
            (&tnm.t, &components.t, &systems.tnm_t),
            (&tnm.n, &components.n, &systems.tnm_n),
            (&tnm.m, &components.m, &systems.tnm_m),
        ] {
            if let Some(component) = component {
                parts.push(self.tnm_component(component, code, system, tnm));
            }
        }

        for (symbol, code, system) in [
            (&tnm.y_symbol, &components.y_symbol, &systems.tnm_y_symbol),
            (&tnm.r_symbol, &components.r_symbol, &systems.tnm_r_symbol),
            (&tnm.m_symbol, &components.m_symbol, &systems.tnm_m_symbol),
        ] {
            if let (Some(symbol), Some(code)) = (symbol, code) {
                parts.push(ObservationComponent {
                    code: loinc(&systems.loinc, code),
                    value: CodeableConcept::coding(Coding::new(system, symbol.as_str())),
                    extensions: Vec::new(),
                });
            }
        }

        (value, parts)
    }

    fn tnm_component(
        &self,
        component: &TnmComponent,
        code: &CodeDisplay,
        system: &str,
        tnm: &Tnm,
    ) -> ObservationComponent {
        let systems = self.config.systems();
        ObservationComponent {
            code: loinc(&systems.loinc, code),
            value: CodeableConcept::coding(
                Coding::new(system, component.value.as_str())
                    .with_version(tnm.version.as_ref().map(NonEmptyText::as_str)),
            ),
            extensions: component
                .prefix
                .iter()
                .map(|prefix| Extension {
                    url: self.config.tnm_prefix_extension().to_string(),
                    value: CodeableConcept::coding(Coding::new(
                        &systems.tnm_prefix,
                        prefix.as_str(),
                    )),
                })
                .collect(),
        }
    }
}

/// The parts of an observation that differ between categories.
#[derive(Default)]
struct Draft {
    value: CodeableConcept,
    body_site: Option<CodeableConcept>,
    components: Vec<ObservationComponent>,
}

struct StateContext<'a> {
    mapper: &'a ObservationMapper,
    state: &'a ConsolidatedTumorState,
}

impl StateContext<'_> {
    fn push(
        &self,
        observations: &mut Vec<ObservationData>,
        category: ObservationCategory,
        qualifier: Option<&str>,
        effective: Option<ReportDate>,
        provenance: &Provenance,
        fill: impl FnOnce(&mut Draft),
    ) {
        match self.build(category, qualifier, effective, provenance, fill) {
            Ok(observation) => observations.push(observation),
            Err(err) => tracing::warn!(
                patient_ref = %self.state.patient_ref,
                tumor_id = %self.state.tumor_id,
                field_group = category.slug(),
                sequence_id = provenance.sequence_id,
                error = %err,
                "skipping observation"
            ),
        }
    }

    fn push_staging(
        &self,
        observations: &mut Vec<ObservationData>,
        category: ObservationCategory,
        mapping: &StagingMapping,
        staging: &Selected<Tnm>,
    ) {
        let (value, components) = self.mapper.staging_content(mapping, &staging.value);
        self.push(
            observations,
            category,
            None,
            staging.value.date,
            &staging.provenance,
            |draft| {
                draft.value = value;
                draft.components = components;
            },
        );
    }

    fn build(
        &self,
        category: ObservationCategory,
        qualifier: Option<&str>,
        effective: Option<ReportDate>,
        provenance: &Provenance,
        fill: impl FnOnce(&mut Draft),
    ) -> ObdsResult<ObservationData> {
        let effective = effective.ok_or_else(|| ObdsError::MissingEffectiveDate {
            patient_ref: self.state.patient_ref.to_string(),
            tumor_id: self.state.tumor_id.to_string(),
            field_group: category.slug(),
        })?;

        let config = &self.mapper.config;
        let systems = config.systems();
        let mapping = config.category(category);

        let mut identifier_value = format!(
            "{}{}{}-{}",
            self.state.patient_ref,
            IDENTIFIER_SEPARATOR,
            self.state.tumor_id,
            category.slug()
        );
        if let Some(qualifier) = qualifier {
            identifier_value.push('-');
            identifier_value.push_str(qualifier);
        }

        let mut draft = Draft::default();
        fill(&mut draft);

        Ok(ObservationData {
            id: ResourceId::for_identifier(&systems.observation_id, &identifier_value),
            identifier: Identifier {
                system: systems.observation_id.clone(),
                value: identifier_value,
            },
            profile: mapping.profile.clone(),
            status: if provenance.version > 1 {
                ObservationStatus::Amended
            } else {
                ObservationStatus::Final
            },
            category,
            category_coding: Coding::new(&systems.observation_category, category.fhir_category()),
            code: loinc(&systems.loinc, &mapping.code),
            subject: ResourceId::for_identifier(
                &systems.patient_id,
                self.state.patient_ref.as_str(),
            ),
            effective,
            value: draft.value,
            body_site: draft.body_site,
            components: draft.components,
        })
    }
}

fn loinc(system: &str, code: &CodeDisplay) -> Coding {
    Coding::new(system, &code.code).with_display(&code.display)
}
