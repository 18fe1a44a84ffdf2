//! Parsed report model.
//!
//! One [`ParsedReport`] per ingested payload. Every field group is optional and is only present
//! when the source report populated at least one of its values.

use obds_types::{NonEmptyText, ReportDate};

/// The staging context a TNM field group belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StagingContext {
    Clinical,
    Pathological,
}

/// Histology (morphology, grading) as reported by a diagnosis or a surgical report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Histology {
    pub date: Option<ReportDate>,
    pub morphology_code: Option<NonEmptyText>,
    pub morphology_version: Option<NonEmptyText>,
    pub grading: Option<NonEmptyText>,
    pub free_text: Option<NonEmptyText>,
}

impl Histology {
    /// A histology without morphology and grading carries nothing worth mapping.
    pub fn is_populated(&self) -> bool {
        self.morphology_code.is_some() || self.grading.is_some()
    }
}

/// One of the T, N or M values of a TNM classification with its `c`/`p`/`u` prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TnmComponent {
    pub prefix: Option<NonEmptyText>,
    pub value: NonEmptyText,
}

impl TnmComponent {
    fn formula_part(&self, letter: char) -> String {
        let prefix = self.prefix.as_ref().map(NonEmptyText::as_str).unwrap_or("");
        format!("{prefix}{letter}{}", self.value)
    }
}

/// A TNM classification.
///
/// The same shape serves clinical, pathological and surgical (operative) staging. Any of T, N and
/// M may be missing on its own; a pathology finding that only reports N is a valid TNM.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tnm {
    pub date: Option<ReportDate>,
    pub version: Option<NonEmptyText>,
    pub t: Option<TnmComponent>,
    pub n: Option<TnmComponent>,
    pub m: Option<TnmComponent>,
    pub y_symbol: Option<NonEmptyText>,
    pub r_symbol: Option<NonEmptyText>,
    pub m_symbol: Option<NonEmptyText>,
    pub uicc_stage: Option<NonEmptyText>,
}

impl Tnm {
    pub fn is_populated(&self) -> bool {
        self.t.is_some() || self.n.is_some() || self.m.is_some() || self.uicc_stage.is_some()
    }

    /// Context of a TNM taken from a surgical report.
    ///
    /// The first present component prefix decides: `c` means clinical, anything else
    /// (including no prefix at all) means pathological.
    pub fn operative_context(&self) -> StagingContext {
        let first_prefix = [&self.t, &self.n, &self.m]
            .into_iter()
            .flatten()
            .find_map(|component| component.prefix.as_ref());

        match first_prefix {
            Some(prefix) if prefix.as_str().eq_ignore_ascii_case("c") => StagingContext::Clinical,
            _ => StagingContext::Pathological,
        }
    }

    /// Whether the M value indicates distant metastasis (`M1`, `1a`, `1c`, ...).
    ///
    /// Returns `None` when M was not reported at all.
    pub fn is_metastatic(&self) -> Option<bool> {
        self.m.as_ref().map(|m| {
            let value = m.value.as_str();
            let value = value
                .strip_prefix('M')
                .or_else(|| value.strip_prefix('m'))
                .unwrap_or(value);
            value.starts_with('1')
        })
    }

    /// The TNM formula as written in clinical documents, e.g. `ypTis N0 M0`.
    pub fn formula(&self) -> String {
        let mut parts = Vec::new();
        if let Some(t) = &self.t {
            parts.push(t.formula_part('T'));
        }
        if let Some(n) = &self.n {
            parts.push(n.formula_part('N'));
        }
        if let Some(m) = &self.m {
            parts.push(m.formula_part('M'));
        }

        let symbols: String = [&self.y_symbol, &self.r_symbol]
            .into_iter()
            .flatten()
            .map(NonEmptyText::as_str)
            .collect();

        match parts.first_mut() {
            Some(first) => first.insert_str(0, &symbols),
            None => return String::new(),
        }
        parts.join(" ")
    }
}

/// One distant metastasis localisation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetastasisSite {
    pub date: Option<ReportDate>,
    pub localisation: Option<NonEmptyText>,
}

/// Death information.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VitalStatus {
    pub death_date: Option<ReportDate>,
    pub cause_icd: Option<NonEmptyText>,
    pub cause_icd_version: Option<NonEmptyText>,
}

impl VitalStatus {
    pub fn is_populated(&self) -> bool {
        self.death_date.is_some() || self.cause_icd.is_some()
    }
}

/// The clinical content of a single report, flattened into optional field groups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedReport {
    pub report_id: Option<NonEmptyText>,
    pub patient_id: Option<NonEmptyText>,
    pub tumor_id: NonEmptyText,
    pub report_date: Option<ReportDate>,
    pub histology: Option<Histology>,
    pub clinical_tnm: Option<Tnm>,
    pub pathological_tnm: Option<Tnm>,
    pub operative_histology: Option<Histology>,
    pub operative_tnm: Option<Tnm>,
    pub distant_metastases: Vec<MetastasisSite>,
    pub vital_status: Option<VitalStatus>,
}

impl ParsedReport {
    /// An empty report for a tumor case; field groups are filled in by the parser.
    pub fn new(tumor_id: NonEmptyText) -> Self {
        Self {
            report_id: None,
            patient_id: None,
            tumor_id,
            report_date: None,
            histology: None,
            clinical_tnm: None,
            pathological_tnm: None,
            operative_histology: None,
            operative_tnm: None,
            distant_metastases: Vec::new(),
            vital_status: None,
        }
    }
}
