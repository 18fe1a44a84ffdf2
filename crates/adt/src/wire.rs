//! ADT/GEKID XML wire structs.
//!
//! Only the elements the pipeline reads are declared; everything else in the export is skipped
//! by serde. Attributes use the `@` prefix understood by `quick-xml`.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AdtGekidWire {
    #[serde(rename = "Menge_Patient", default)]
    pub patients: Option<PatientSetWire>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PatientSetWire {
    #[serde(rename = "Patient", default)]
    pub patients: Vec<PatientWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PatientWire {
    #[serde(rename = "Patienten_Stammdaten", default)]
    pub master_data: Option<PatientMasterDataWire>,

    #[serde(rename = "Menge_Meldung", default)]
    pub reports: Option<ReportSetWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PatientMasterDataWire {
    #[serde(rename = "@Patient_ID", default)]
    pub patient_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReportSetWire {
    #[serde(rename = "Meldung", default)]
    pub reports: Vec<ReportWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportWire {
    #[serde(rename = "@Meldung_ID", default)]
    pub report_id: Option<String>,

    #[serde(rename = "Meldedatum", default)]
    pub report_date: Option<String>,

    #[serde(rename = "Tumorzuordnung", default)]
    pub tumor_assignment: Option<TumorAssignmentWire>,

    #[serde(rename = "Diagnose", default)]
    pub diagnosis: Option<DiagnosisWire>,

    #[serde(rename = "Menge_OP", default)]
    pub surgeries: Option<SurgerySetWire>,

    #[serde(rename = "Menge_Verlauf", default)]
    pub progressions: Option<ProgressionSetWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TumorAssignmentWire {
    #[serde(rename = "@Tumor_ID", default)]
    pub tumor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DiagnosisWire {
    #[serde(rename = "@Tumor_ID", default)]
    pub tumor_id: Option<String>,

    #[serde(rename = "Menge_Histologie", default)]
    pub histologies: Option<HistologySetWire>,

    #[serde(rename = "Menge_FM", default)]
    pub metastases: Option<MetastasisSetWire>,

    #[serde(rename = "cTNM", default)]
    pub clinical_tnm: Option<TnmWire>,

    #[serde(rename = "pTNM", default)]
    pub pathological_tnm: Option<TnmWire>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct HistologySetWire {
    #[serde(rename = "Histologie", default)]
    pub histologies: Vec<HistologyWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistologyWire {
    #[serde(rename = "Tumor_Histologiedatum", default)]
    pub date: Option<String>,

    #[serde(rename = "Morphologie_Code", default)]
    pub morphology_code: Option<String>,

    #[serde(rename = "Morphologie_ICD_O_Version", default)]
    pub morphology_version: Option<String>,

    #[serde(rename = "Grading", default)]
    pub grading: Option<String>,

    #[serde(rename = "Morphologie_Freitext", default)]
    pub free_text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MetastasisSetWire {
    #[serde(rename = "Fernmetastase", default)]
    pub metastases: Vec<MetastasisWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetastasisWire {
    #[serde(rename = "FM_Diagnosedatum", default)]
    pub date: Option<String>,

    #[serde(rename = "FM_Lokalisation", default)]
    pub localisation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TnmWire {
    #[serde(rename = "TNM_Datum", default)]
    pub date: Option<String>,

    #[serde(rename = "TNM_Version", default)]
    pub version: Option<String>,

    #[serde(rename = "TNM_y_Symbol", default)]
    pub y_symbol: Option<String>,

    #[serde(rename = "TNM_r_Symbol", default)]
    pub r_symbol: Option<String>,

    #[serde(rename = "TNM_c_p_u_Praefix_T", default)]
    pub t_prefix: Option<String>,

    #[serde(rename = "TNM_T", default)]
    pub t: Option<String>,

    #[serde(rename = "TNM_m_Symbol", default)]
    pub m_symbol: Option<String>,

    #[serde(rename = "TNM_c_p_u_Praefix_N", default)]
    pub n_prefix: Option<String>,

    #[serde(rename = "TNM_N", default)]
    pub n: Option<String>,

    #[serde(rename = "TNM_c_p_u_Praefix_M", default)]
    pub m_prefix: Option<String>,

    #[serde(rename = "TNM_M", default)]
    pub m: Option<String>,

    #[serde(rename = "UICC_Stadium", default)]
    pub uicc_stage: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SurgerySetWire {
    #[serde(rename = "OP", default)]
    pub surgeries: Vec<SurgeryWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SurgeryWire {
    #[serde(rename = "Histologie", default)]
    pub histology: Option<HistologyWire>,

    #[serde(rename = "TNM", default)]
    pub tnm: Option<TnmWire>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProgressionSetWire {
    #[serde(rename = "Verlauf", default)]
    pub progressions: Vec<ProgressionWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProgressionWire {
    #[serde(rename = "Tod", default)]
    pub death: Option<DeathWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeathWire {
    #[serde(rename = "Sterbedatum", default)]
    pub death_date: Option<String>,

    #[serde(rename = "Menge_Todesursache", default)]
    pub causes: Option<DeathCauseSetWire>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeathCauseSetWire {
    #[serde(rename = "Todesursache_ICD", default)]
    pub icd_codes: Vec<String>,

    #[serde(rename = "Todesursache_ICD_Version", default)]
    pub icd_version: Option<String>,
}
