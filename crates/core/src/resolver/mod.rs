//! Consolidation Resolver.
//!
//! Turns the records of a ledger into one [`ConsolidatedTumorState`] per (patient, tumor case):
//!
//! 1. drop superseded report versions (optional, see [`CoreConfig::supersede_versions`])
//! 2. parse every remaining record; records that fail are logged and dropped
//! 3. group parsed reports by (patient reference, tumor case id)
//! 4. select each field group independently from exactly one report
//!
//! Selection for a field group walks its extractor list in priority order. The first extractor
//! with any candidate decides the source; among its candidates the latest field-group date wins
//! (an undated candidate is older than any dated one), then the higher sequence id. Values are
//! never merged across reports.
//!
//! [`CoreConfig::supersede_versions`]: crate::CoreConfig::supersede_versions

mod extractors;

use crate::ledger::{ReportExportRecord, ReportLedger};
use crate::ObdsError;
use adt::{Histology, MetastasisSite, ParsedReport, ReportParser, Tnm, VitalStatus};
use extractors::{Dated, Extractor};
use obds_types::{NonEmptyText, ReportDate};
use std::collections::{BTreeMap, HashMap};

/// Where a selected field group came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Provenance {
    pub sequence_id: i64,
    pub report_id: NonEmptyText,
    pub version: u32,
    /// Name of the extractor that produced the value, or of the derivation.
    pub source: &'static str,
}

impl Provenance {
    fn of(record: &ReportExportRecord, source: &'static str) -> Self {
        Self {
            sequence_id: record.sequence_id(),
            report_id: record.report_id().clone(),
            version: record.version(),
            source,
        }
    }
}

/// A resolved field group together with its provenance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selected<T> {
    pub value: T,
    pub provenance: Provenance,
}

/// Grading resolved on its own; dated by the histology it was reported with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grading {
    pub code: NonEmptyText,
    pub date: Option<ReportDate>,
}

/// Distant metastasis sites, either reported explicitly or derived from an `M1` staging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistantMetastasis {
    pub sites: Vec<MetastasisSite>,
    pub derived: bool,
}

/// The resolved view of one tumor case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsolidatedTumorState {
    pub patient_ref: NonEmptyText,
    pub tumor_id: NonEmptyText,
    pub histology: Option<Selected<Histology>>,
    pub grading: Option<Selected<Grading>>,
    pub clinical_tnm: Option<Selected<Tnm>>,
    pub pathological_tnm: Option<Selected<Tnm>>,
    pub distant_metastasis: Option<Selected<DistantMetastasis>>,
    pub vital_status: Option<Selected<VitalStatus>>,
}

impl ConsolidatedTumorState {
    fn has_field_groups(&self) -> bool {
        self.histology.is_some()
            || self.grading.is_some()
            || self.clinical_tnm.is_some()
            || self.pathological_tnm.is_some()
            || self.distant_metastasis.is_some()
            || self.vital_status.is_some()
    }
}

/// A parsed report paired with the ledger record it came from.
struct Candidate<'a> {
    record: &'a ReportExportRecord,
    report: ParsedReport,
}

/// Resolves ledgers into consolidated tumor states.
#[derive(Clone, Debug)]
pub struct ConsolidationResolver<P> {
    parser: P,
    supersede_versions: bool,
}

impl<P: ReportParser> ConsolidationResolver<P> {
    pub fn new(parser: P, supersede_versions: bool) -> Self {
        Self {
            parser,
            supersede_versions,
        }
    }

    /// Resolve every tumor case found in `ledger`.
    ///
    /// States are ordered by (patient reference, tumor case id). Tumor cases without any usable
    /// field group are left out.
    pub fn resolve(&self, ledger: &ReportLedger) -> Vec<ConsolidatedTumorState> {
        let records: Vec<&ReportExportRecord> = if self.supersede_versions {
            latest_versions(ledger.records())
        } else {
            ledger.records().iter().collect()
        };

        let mut groups: BTreeMap<(NonEmptyText, NonEmptyText), Vec<Candidate<'_>>> =
            BTreeMap::new();

        for record in records {
            match self.parser.parse(record.payload()) {
                Ok(report) => {
                    if let Some(payload_patient) = &report.patient_id {
                        if payload_patient != record.patient_ref() {
                            tracing::debug!(
                                sequence_id = record.sequence_id(),
                                patient_ref = %record.patient_ref(),
                                payload_patient = %payload_patient,
                                "payload patient id differs from ledger reference; using the ledger"
                            );
                        }
                    }
                    let key = (record.patient_ref().clone(), report.tumor_id.clone());
                    groups.entry(key).or_default().push(Candidate { record, report });
                }
                Err(source) => {
                    let err = ObdsError::Parse {
                        sequence_id: record.sequence_id(),
                        patient_ref: record.patient_ref().to_string(),
                        source,
                    };
                    tracing::warn!(
                        sequence_id = record.sequence_id(),
                        patient_ref = %record.patient_ref(),
                        report_id = %record.report_id(),
                        error = %err,
                        "dropping record"
                    );
                }
            }
        }

        groups
            .into_iter()
            .filter_map(|((patient_ref, tumor_id), candidates)| {
                let state = consolidate(patient_ref, tumor_id, &candidates);
                if !state.has_field_groups() {
                    tracing::debug!(
                        patient_ref = %state.patient_ref,
                        tumor_id = %state.tumor_id,
                        reports = candidates.len(),
                        "tumor case has no usable field groups"
                    );
                    return None;
                }
                Some(state)
            })
            .collect()
    }
}

/// Keep only the highest version per (patient, report id); equal versions keep the later record.
fn latest_versions(records: &[ReportExportRecord]) -> Vec<&ReportExportRecord> {
    let mut latest: HashMap<(&NonEmptyText, &NonEmptyText), &ReportExportRecord> = HashMap::new();
    for record in records {
        let key = (record.patient_ref(), record.report_id());
        match latest.get(&key) {
            Some(current)
                if (current.version(), current.sequence_id())
                    >= (record.version(), record.sequence_id()) =>
            {
                tracing::debug!(
                    sequence_id = record.sequence_id(),
                    patient_ref = %record.patient_ref(),
                    report_id = %record.report_id(),
                    version = record.version(),
                    "superseded report version"
                );
            }
            Some(current) => {
                tracing::debug!(
                    sequence_id = current.sequence_id(),
                    patient_ref = %current.patient_ref(),
                    report_id = %current.report_id(),
                    version = current.version(),
                    "superseded report version"
                );
                latest.insert(key, record);
            }
            None => {
                latest.insert(key, record);
            }
        }
    }

    // Preserve ledger order for the survivors.
    records
        .iter()
        .filter(|record| {
            latest
                .get(&(record.patient_ref(), record.report_id()))
                .is_some_and(|kept| std::ptr::eq(*kept, *record))
        })
        .collect()
}

fn consolidate(
    patient_ref: NonEmptyText,
    tumor_id: NonEmptyText,
    candidates: &[Candidate<'_>],
) -> ConsolidatedTumorState {
    let pathological_tnm = select(candidates, extractors::PATHOLOGICAL_TNM);
    let clinical_tnm = select(candidates, extractors::CLINICAL_TNM);

    let distant_metastasis = select(candidates, extractors::DISTANT_METASTASIS)
        .or_else(|| derive_distant_metastasis(pathological_tnm.as_ref()))
        .or_else(|| derive_distant_metastasis(clinical_tnm.as_ref()));

    let state = ConsolidatedTumorState {
        histology: select(candidates, extractors::HISTOLOGY),
        grading: select(candidates, extractors::GRADING),
        clinical_tnm,
        pathological_tnm,
        distant_metastasis,
        vital_status: select(candidates, extractors::VITAL_STATUS),
        patient_ref,
        tumor_id,
    };

    log_selection("histology", &state, state.histology.as_ref().map(|s| &s.provenance));
    log_selection("grading", &state, state.grading.as_ref().map(|s| &s.provenance));
    log_selection("clinical_tnm", &state, state.clinical_tnm.as_ref().map(|s| &s.provenance));
    log_selection(
        "pathological_tnm",
        &state,
        state.pathological_tnm.as_ref().map(|s| &s.provenance),
    );
    log_selection(
        "distant_metastasis",
        &state,
        state.distant_metastasis.as_ref().map(|s| &s.provenance),
    );
    log_selection("vital_status", &state, state.vital_status.as_ref().map(|s| &s.provenance));

    state
}

fn select<T: Dated>(candidates: &[Candidate<'_>], extractors: &[Extractor<T>]) -> Option<Selected<T>> {
    extractors.iter().find_map(|extractor| {
        candidates
            .iter()
            .filter_map(|candidate| {
                (extractor.extract)(&candidate.report).map(|value| (candidate.record, value))
            })
            .max_by_key(|(record, value)| (value.date(), record.sequence_id()))
            .map(|(record, value)| Selected {
                value,
                provenance: Provenance::of(record, extractor.name),
            })
    })
}

/// An `M1` staging implies distant metastasis even without an explicit site list.
fn derive_distant_metastasis(staging: Option<&Selected<Tnm>>) -> Option<Selected<DistantMetastasis>> {
    let staging = staging?;
    if staging.value.is_metastatic() != Some(true) {
        return None;
    }

    Some(Selected {
        value: DistantMetastasis {
            sites: vec![MetastasisSite {
                date: staging.value.date,
                localisation: None,
            }],
            derived: true,
        },
        provenance: Provenance {
            source: "derived_from_tnm",
            ..staging.provenance.clone()
        },
    })
}

fn log_selection(field_group: &'static str, state: &ConsolidatedTumorState, provenance: Option<&Provenance>) {
    if let Some(provenance) = provenance {
        tracing::debug!(
            patient_ref = %state.patient_ref,
            tumor_id = %state.tumor_id,
            field_group,
            sequence_id = provenance.sequence_id,
            report_id = %provenance.report_id,
            source = provenance.source,
            "selected field group"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adt::{ParseError, ParseResult, TnmComponent};

    /// Serves prebuilt reports keyed by payload text.
    struct FixedParser(HashMap<String, ParsedReport>);

    impl ReportParser for FixedParser {
        fn parse(&self, payload: &str) -> ParseResult<ParsedReport> {
            self.0.get(payload).cloned().ok_or(ParseError::MissingReport)
        }
    }

    fn text(value: &str) -> NonEmptyText {
        NonEmptyText::new(value).expect("non-empty")
    }

    fn date(value: &str) -> Option<ReportDate> {
        Some(ReportDate::parse(value).expect("valid date"))
    }

    fn histology(morphology: &str, grading: Option<&str>, on: &str) -> Histology {
        Histology {
            date: date(on),
            morphology_code: Some(text(morphology)),
            morphology_version: None,
            grading: grading.map(text),
            free_text: None,
        }
    }

    fn tnm(prefix: &str, t: &str, m: Option<&str>, on: Option<&str>) -> Tnm {
        Tnm {
            date: on.and_then(date),
            version: None,
            t: Some(TnmComponent {
                prefix: Some(text(prefix)),
                value: text(t),
            }),
            n: None,
            m: m.map(|m| TnmComponent {
                prefix: None,
                value: text(m),
            }),
            y_symbol: None,
            r_symbol: None,
            m_symbol: None,
            uicc_stage: None,
        }
    }

    struct Batch {
        ledger: ReportLedger,
        reports: HashMap<String, ParsedReport>,
    }

    impl Batch {
        fn new() -> Self {
            Self {
                ledger: ReportLedger::new(),
                reports: HashMap::new(),
            }
        }

        fn add(&mut self, sequence_id: i64, report_id: &str, version: u32, report: ParsedReport) {
            let payload = format!("payload-{sequence_id}");
            self.ledger.add_record(
                ReportExportRecord::new(sequence_id, "P1", report_id, version, payload.clone())
                    .expect("record"),
            );
            self.reports.insert(payload, report);
        }

        fn resolve(self) -> Vec<ConsolidatedTumorState> {
            ConsolidationResolver::new(FixedParser(self.reports), true).resolve(&self.ledger)
        }
    }

    #[test]
    fn operative_source_beats_later_diagnosis() {
        let mut surgery = ParsedReport::new(text("1"));
        surgery.operative_histology = Some(histology("9391/8", Some("U"), "20.03.2021"));
        surgery.operative_tnm = Some(tnm("p", "is", Some("0"), Some("20.03.2021")));

        let mut diagnosis = ParsedReport::new(text("1"));
        diagnosis.histology = Some(histology("9391/3", Some("T"), "01.06.2021"));
        diagnosis.pathological_tnm = Some(tnm("p", "2", None, Some("01.06.2021")));

        let mut batch = Batch::new();
        batch.add(1, "R1", 1, surgery);
        batch.add(2, "R2", 1, diagnosis);
        let states = batch.resolve();

        assert_eq!(states.len(), 1);
        let state = &states[0];
        let histology = state.histology.as_ref().expect("histology");
        assert_eq!(histology.provenance.source, "operative_histology");
        assert_eq!(histology.value.morphology_code.as_ref().map(|c| c.as_str()), Some("9391/8"));
        assert_eq!(state.grading.as_ref().map(|g| g.value.code.as_str()), Some("U"));

        let staging = state.pathological_tnm.as_ref().expect("pTNM");
        assert_eq!(staging.provenance.sequence_id, 1);
        assert_eq!(staging.value.formula(), "pTis M0");
    }

    #[test]
    fn equal_dates_go_to_the_higher_sequence_id() {
        let mut first = ParsedReport::new(text("1"));
        first.histology = Some(histology("8000/3", None, "18.03.2021"));
        let mut second = ParsedReport::new(text("1"));
        second.histology = Some(histology("8140/3", None, "18.03.2021"));

        let mut batch = Batch::new();
        batch.add(7, "R1", 1, second);
        batch.add(3, "R2", 1, first);
        let states = batch.resolve();

        let histology = states[0].histology.as_ref().expect("histology");
        assert_eq!(histology.provenance.sequence_id, 7);
        assert_eq!(histology.value.morphology_code.as_ref().map(|c| c.as_str()), Some("8140/3"));
    }

    #[test]
    fn later_date_beats_higher_sequence_id() {
        let mut earlier = ParsedReport::new(text("1"));
        earlier.histology = Some(histology("8000/3", Some("1"), "01.03.2021"));
        earlier.clinical_tnm = Some(tnm("c", "1", None, Some("01.03.2021")));
        let mut later = ParsedReport::new(text("1"));
        later.histology = Some(histology("8140/3", Some("2"), "01.06.2021"));
        later.clinical_tnm = Some(tnm("c", "3", None, Some("01.06.2021")));

        let mut batch = Batch::new();
        batch.add(5, "R1", 1, earlier);
        batch.add(2, "R2", 1, later);
        let states = batch.resolve();

        let state = &states[0];
        let histology = state.histology.as_ref().expect("histology");
        assert_eq!(histology.provenance.sequence_id, 2);
        assert_eq!(histology.value.morphology_code.as_ref().map(|c| c.as_str()), Some("8140/3"));
        let grading = state.grading.as_ref().expect("grading");
        assert_eq!(grading.provenance.sequence_id, 2);
        assert_eq!(grading.value.code.as_str(), "2");
        let staging = state.clinical_tnm.as_ref().expect("cTNM");
        assert_eq!(staging.provenance.sequence_id, 2);
        assert_eq!(staging.value.formula(), "cT3");
    }

    #[test]
    fn undated_candidates_lose_to_dated_ones() {
        let mut undated = ParsedReport::new(text("1"));
        undated.clinical_tnm = Some(tnm("c", "3", None, None));
        let mut dated = ParsedReport::new(text("1"));
        dated.clinical_tnm = Some(tnm("c", "1", None, Some("00.00.2019")));

        let mut batch = Batch::new();
        batch.add(1, "R1", 1, dated);
        batch.add(2, "R2", 1, undated);
        let states = batch.resolve();

        let staging = states[0].clinical_tnm.as_ref().expect("cTNM");
        assert_eq!(staging.provenance.sequence_id, 1);
    }

    #[test]
    fn older_versions_are_superseded() {
        let mut original = ParsedReport::new(text("1"));
        original.histology = Some(histology("8000/3", None, "18.03.2022"));
        let mut correction = ParsedReport::new(text("1"));
        correction.histology = Some(histology("8140/3", None, "18.03.2021"));

        let mut batch = Batch::new();
        batch.add(5, "R1", 1, original);
        batch.add(4, "R1", 2, correction);
        let states = batch.resolve();

        let histology = states[0].histology.as_ref().expect("histology");
        assert_eq!(histology.provenance.version, 2);
        assert_eq!(histology.value.morphology_code.as_ref().map(|c| c.as_str()), Some("8140/3"));
    }

    #[test]
    fn explicit_sites_win_over_derived_metastasis() {
        let mut report = ParsedReport::new(text("1"));
        report.pathological_tnm = Some(tnm("p", "2", Some("1"), Some("18.03.2021")));

        let mut batch = Batch::new();
        batch.add(1, "R1", 1, report.clone());
        let derived = batch.resolve();
        let metastasis = derived[0].distant_metastasis.as_ref().expect("derived");
        assert!(metastasis.value.derived);
        assert_eq!(metastasis.value.sites.len(), 1);
        assert_eq!(metastasis.value.sites[0].date, date("18.03.2021"));

        report.distant_metastases = vec![MetastasisSite {
            date: date("19.03.2021"),
            localisation: Some(text("HEP")),
        }];
        let mut batch = Batch::new();
        batch.add(1, "R1", 1, report);
        let explicit = batch.resolve();
        let metastasis = explicit[0].distant_metastasis.as_ref().expect("explicit");
        assert!(!metastasis.value.derived);
        assert_eq!(metastasis.value.sites[0].localisation.as_ref().map(|l| l.as_str()), Some("HEP"));
    }

    #[test]
    fn missing_m_yields_no_metastasis_entry() {
        let mut report = ParsedReport::new(text("1"));
        report.clinical_tnm = Some(tnm("c", "2", None, Some("18.03.2021")));
        let mut batch = Batch::new();
        batch.add(1, "R1", 1, report);
        assert!(batch.resolve()[0].distant_metastasis.is_none());
    }

    #[test]
    fn unparseable_records_and_empty_cases_are_dropped() {
        let mut batch = Batch::new();
        batch.add(1, "R1", 1, ParsedReport::new(text("1")));
        batch
            .ledger
            .add_record(ReportExportRecord::new(2, "P1", "R2", 1, "garbage").expect("record"));

        assert!(batch.resolve().is_empty());
    }

    #[test]
    fn states_are_grouped_and_ordered_by_patient_and_tumor() {
        let mut reports = HashMap::new();
        let mut ledger = ReportLedger::new();
        for (sequence_id, patient, tumor) in [(1, "P2", "1"), (2, "P1", "2"), (3, "P1", "1")] {
            let mut report = ParsedReport::new(text(tumor));
            report.histology = Some(histology("8000/3", None, "18.03.2021"));
            let payload = format!("payload-{sequence_id}");
            ledger.add_record(
                ReportExportRecord::new(sequence_id, patient, &format!("R{sequence_id}"), 1, payload.clone())
                    .expect("record"),
            );
            reports.insert(payload, report);
        }

        let states = ConsolidationResolver::new(FixedParser(reports), true).resolve(&ledger);
        let keys: Vec<(&str, &str)> = states
            .iter()
            .map(|s| (s.patient_ref.as_str(), s.tumor_id.as_str()))
            .collect();
        assert_eq!(keys, vec![("P1", "1"), ("P1", "2"), ("P2", "1")]);
    }
}
