//! ADT/GEKID XML parser.

use crate::model::{Histology, MetastasisSite, ParsedReport, Tnm, TnmComponent, VitalStatus};
use crate::wire::{
    AdtGekidWire, DeathWire, DiagnosisWire, HistologyWire, ReportWire, SurgeryWire, TnmWire,
};
use crate::{ParseError, ParseResult, ReportParser};
use obds_types::{NonEmptyText, ReportDate};

/// Parser for ADT/GEKID XML report exports.
///
/// A payload is expected to hold exactly one report (`Meldung`). Payloads that bundle more
/// than one report are parsed using the first one; the rest are logged and ignored, because one
/// ledger record stands for exactly one reporting event.
#[derive(Clone, Copy, Debug, Default)]
pub struct AdtXmlParser;

impl AdtXmlParser {
    pub fn new() -> Self {
        Self
    }
}

impl ReportParser for AdtXmlParser {
    fn parse(&self, payload: &str) -> ParseResult<ParsedReport> {
        let payload = payload.strip_prefix('\u{feff}').unwrap_or(payload);
        if payload.trim().is_empty() {
            return Err(ParseError::EmptyPayload);
        }

        let mut deserializer = quick_xml::de::Deserializer::from_str(payload);
        let wire: AdtGekidWire = match serde_path_to_error::deserialize(&mut deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let path = if path.is_empty() || path == "." {
                    "<root>".to_string()
                } else {
                    path
                };
                return Err(ParseError::InvalidXml {
                    path,
                    message: err.into_inner().to_string(),
                });
            }
        };

        let mut located = wire
            .patients
            .unwrap_or_default()
            .patients
            .into_iter()
            .flat_map(|patient| {
                let patient_id = patient.master_data.and_then(|m| m.patient_id);
                patient
                    .reports
                    .unwrap_or_default()
                    .reports
                    .into_iter()
                    .map(move |report| (patient_id.clone(), report))
            });

        let (patient_id, report) = located.next().ok_or(ParseError::MissingReport)?;
        let ignored = located.count();
        if ignored > 0 {
            tracing::warn!(
                report_id = report.report_id.as_deref().unwrap_or(""),
                ignored,
                "payload carries more than one report; only the first is used"
            );
        }

        report_to_model(patient_id, report)
    }
}

fn report_to_model(patient_id: Option<String>, wire: ReportWire) -> ParseResult<ParsedReport> {
    let report_id = NonEmptyText::optional(wire.report_id);

    let tumor_id = wire
        .diagnosis
        .as_ref()
        .and_then(|d| NonEmptyText::optional(d.tumor_id.as_deref()))
        .or_else(|| {
            wire.tumor_assignment
                .as_ref()
                .and_then(|a| NonEmptyText::optional(a.tumor_id.as_deref()))
        })
        .ok_or_else(|| ParseError::MissingTumorId {
            report_id: report_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "<unknown>".into()),
        })?;

    let mut report = ParsedReport::new(tumor_id);
    report.report_id = report_id;
    report.patient_id = NonEmptyText::optional(patient_id);
    report.report_date = parse_date("Meldedatum", wire.report_date.as_deref())?;

    if let Some(diagnosis) = wire.diagnosis {
        apply_diagnosis(&mut report, diagnosis)?;
    }

    let surgeries = wire.surgeries.unwrap_or_default().surgeries;
    apply_surgeries(&mut report, surgeries)?;

    let deaths = wire
        .progressions
        .unwrap_or_default()
        .progressions
        .into_iter()
        .filter_map(|p| p.death)
        .map(death_to_model)
        .collect::<ParseResult<Vec<_>>>()?;
    report.vital_status = latest(deaths, |d| d.death_date);

    Ok(report)
}

fn apply_diagnosis(report: &mut ParsedReport, diagnosis: DiagnosisWire) -> ParseResult<()> {
    let histologies = diagnosis
        .histologies
        .unwrap_or_default()
        .histologies
        .into_iter()
        .map(|h| histology_to_model("Tumor_Histologiedatum", h))
        .collect::<ParseResult<Vec<_>>>()?;
    report.histology = latest(histologies, |h| h.date);

    report.clinical_tnm = diagnosis
        .clinical_tnm
        .map(|t| tnm_to_model("cTNM/TNM_Datum", t))
        .transpose()?
        .flatten();
    report.pathological_tnm = diagnosis
        .pathological_tnm
        .map(|t| tnm_to_model("pTNM/TNM_Datum", t))
        .transpose()?
        .flatten();

    report.distant_metastases = diagnosis
        .metastases
        .unwrap_or_default()
        .metastases
        .into_iter()
        .map(|m| {
            Ok(MetastasisSite {
                date: parse_date("FM_Diagnosedatum", m.date.as_deref())?,
                localisation: NonEmptyText::optional(m.localisation),
            })
        })
        .filter(|site: &ParseResult<MetastasisSite>| {
            !matches!(site, Ok(MetastasisSite { date: None, localisation: None }))
        })
        .collect::<ParseResult<Vec<_>>>()?;

    Ok(())
}

fn apply_surgeries(report: &mut ParsedReport, surgeries: Vec<SurgeryWire>) -> ParseResult<()> {
    let mut histologies = Vec::new();
    let mut stagings = Vec::new();

    for surgery in surgeries {
        if let Some(h) = surgery.histology {
            histologies.push(histology_to_model("OP/Histologie", h)?);
        }
        if let Some(t) = surgery.tnm {
            stagings.push(tnm_to_model("OP/TNM_Datum", t)?);
        }
    }

    report.operative_histology = latest(histologies, |h| h.date);
    report.operative_tnm = latest(stagings, |t| t.date);
    Ok(())
}

fn histology_to_model(field: &'static str, wire: HistologyWire) -> ParseResult<Option<Histology>> {
    let histology = Histology {
        date: parse_date(field, wire.date.as_deref())?,
        morphology_code: NonEmptyText::optional(wire.morphology_code),
        morphology_version: NonEmptyText::optional(wire.morphology_version),
        grading: NonEmptyText::optional(wire.grading),
        free_text: NonEmptyText::optional(wire.free_text),
    };
    Ok(histology.is_populated().then_some(histology))
}

fn tnm_to_model(field: &'static str, wire: TnmWire) -> ParseResult<Option<Tnm>> {
    let component = |prefix: Option<String>, value: Option<String>| {
        NonEmptyText::optional(value).map(|value| TnmComponent {
            prefix: NonEmptyText::optional(prefix),
            value,
        })
    };

    let tnm = Tnm {
        date: parse_date(field, wire.date.as_deref())?,
        version: NonEmptyText::optional(wire.version),
        t: component(wire.t_prefix, wire.t),
        n: component(wire.n_prefix, wire.n),
        m: component(wire.m_prefix, wire.m),
        y_symbol: NonEmptyText::optional(wire.y_symbol),
        r_symbol: NonEmptyText::optional(wire.r_symbol),
        m_symbol: NonEmptyText::optional(wire.m_symbol),
        uicc_stage: NonEmptyText::optional(wire.uicc_stage),
    };
    Ok(tnm.is_populated().then_some(tnm))
}

fn death_to_model(wire: DeathWire) -> ParseResult<Option<VitalStatus>> {
    let causes = wire.causes.unwrap_or_default();
    let status = VitalStatus {
        death_date: parse_date("Sterbedatum", wire.death_date.as_deref())?,
        cause_icd: causes
            .icd_codes
            .into_iter()
            .find_map(|code| NonEmptyText::new(code).ok()),
        cause_icd_version: NonEmptyText::optional(causes.icd_version),
    };
    Ok(status.is_populated().then_some(status))
}

/// Pick the latest-dated populated item; later document position wins ties.
fn latest<T>(items: Vec<Option<T>>, date: impl Fn(&T) -> Option<ReportDate>) -> Option<T> {
    items
        .into_iter()
        .flatten()
        .enumerate()
        .max_by_key(|(position, item)| (date(item), *position))
        .map(|(_, item)| item)
}

fn parse_date(field: &'static str, value: Option<&str>) -> ParseResult<Option<ReportDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => ReportDate::parse(v)
            .map(Some)
            .map_err(|source| ParseError::InvalidDate { field, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StagingContext;

    const DIAGNOSIS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ADT_GEKID Schema_Version="2.2.1" xmlns="http://www.gekid.de/namespace">
  <Absender Absender_ID="999" Software_ID="test"/>
  <Menge_Patient>
    <Patient>
      <Patienten_Stammdaten Patient_ID="P-1"><Patienten_Geschlecht>W</Patienten_Geschlecht></Patienten_Stammdaten>
      <Menge_Meldung>
        <Meldung Meldung_ID="M1" Melder_ID="9">
          <Meldedatum>19.03.2021</Meldedatum>
          <Diagnose Tumor_ID="1">
            <Primaertumor_ICD_Code>C72.0</Primaertumor_ICD_Code>
            <Menge_Histologie>
              <Histologie Histologie_ID="H1">
                <Tumor_Histologiedatum>10.03.2021</Tumor_Histologiedatum>
                <Morphologie_Code>9391/1</Morphologie_Code>
                <Grading>1</Grading>
              </Histologie>
              <Histologie Histologie_ID="H2">
                <Tumor_Histologiedatum>18.03.2021</Tumor_Histologiedatum>
                <Morphologie_Code>9391/3</Morphologie_Code>
                <Morphologie_ICD_O_Version>32</Morphologie_ICD_O_Version>
                <Grading>T</Grading>
              </Histologie>
            </Menge_Histologie>
            <Menge_FM>
              <Fernmetastase><FM_Diagnosedatum>18.03.2021</FM_Diagnosedatum><FM_Lokalisation>PUL</FM_Lokalisation></Fernmetastase>
              <Fernmetastase><FM_Diagnosedatum>00.03.2021</FM_Diagnosedatum><FM_Lokalisation>OSS</FM_Lokalisation></Fernmetastase>
            </Menge_FM>
            <cTNM TNM_ID="T1">
              <TNM_Datum>18.03.2021</TNM_Datum>
              <TNM_Version>8</TNM_Version>
              <TNM_c_p_u_Praefix_T>c</TNM_c_p_u_Praefix_T>
              <TNM_T>0</TNM_T>
              <TNM_N>1</TNM_N>
              <TNM_M>0</TNM_M>
            </cTNM>
            <pTNM TNM_ID="T2">
              <TNM_Datum>18.03.2021</TNM_Datum>
              <TNM_T></TNM_T>
              <TNM_N>2a</TNM_N>
              <TNM_M/>
            </pTNM>
          </Diagnose>
        </Meldung>
      </Menge_Meldung>
    </Patient>
  </Menge_Patient>
</ADT_GEKID>"#;

    #[test]
    fn parses_diagnosis_report() {
        let report = AdtXmlParser.parse(DIAGNOSIS).expect("parse");
        assert_eq!(report.tumor_id.as_str(), "1");
        assert_eq!(report.patient_id.as_ref().map(|p| p.as_str()), Some("P-1"));
        assert_eq!(report.report_id.as_ref().map(|p| p.as_str()), Some("M1"));

        let histology = report.histology.expect("histology");
        assert_eq!(
            histology.morphology_code.as_ref().map(|c| c.as_str()),
            Some("9391/3")
        );
        assert_eq!(histology.grading.as_ref().map(|c| c.as_str()), Some("T"));
        assert_eq!(histology.date.map(|d| d.to_fhir()).as_deref(), Some("2021-03-18"));

        let clinical = report.clinical_tnm.expect("cTNM");
        assert_eq!(clinical.formula(), "cT0 N1 M0");

        let pathological = report.pathological_tnm.expect("pTNM");
        assert!(pathological.t.is_none());
        assert!(pathological.m.is_none());
        assert_eq!(pathological.n.as_ref().map(|n| n.value.as_str()), Some("2a"));

        assert_eq!(report.distant_metastases.len(), 2);
        assert!(report.operative_tnm.is_none());
        assert!(report.vital_status.is_none());
    }

    #[test]
    fn parses_surgery_and_death() {
        let payload = r#"<ADT_GEKID>
  <Menge_Patient><Patient>
    <Patienten_Stammdaten Patient_ID="P-2"/>
    <Menge_Meldung><Meldung Meldung_ID="M7">
      <Tumorzuordnung Tumor_ID="4"/>
      <Menge_OP>
        <OP OP_ID="1">
          <Histologie>
            <Tumor_Histologiedatum>20.03.2021</Tumor_Histologiedatum>
            <Morphologie_Code>9391/8</Morphologie_Code>
            <Grading>U</Grading>
          </Histologie>
          <TNM>
            <TNM_Datum>20.03.2021</TNM_Datum>
            <TNM_y_Symbol>y</TNM_y_Symbol>
            <TNM_c_p_u_Praefix_T>p</TNM_c_p_u_Praefix_T>
            <TNM_T>is</TNM_T>
            <TNM_N>0</TNM_N>
            <TNM_M>0</TNM_M>
          </TNM>
        </OP>
      </Menge_OP>
      <Menge_Verlauf><Verlauf>
        <Tod>
          <Sterbedatum>10.04.2021</Sterbedatum>
          <Tod_tumorbedingt>J</Tod_tumorbedingt>
          <Menge_Todesursache>
            <Todesursache_ICD>R68.8</Todesursache_ICD>
            <Todesursache_ICD_Version>10 2021 GM</Todesursache_ICD_Version>
          </Menge_Todesursache>
        </Tod>
      </Verlauf></Menge_Verlauf>
    </Meldung></Menge_Meldung>
  </Patient></Menge_Patient>
</ADT_GEKID>"#;

        let report = AdtXmlParser.parse(payload).expect("parse");
        assert_eq!(report.tumor_id.as_str(), "4");
        assert!(report.histology.is_none());

        let operative = report.operative_tnm.expect("operative TNM");
        assert_eq!(operative.operative_context(), StagingContext::Pathological);
        assert_eq!(operative.formula(), "ypTis N0 M0");

        let death = report.vital_status.expect("death");
        assert_eq!(death.cause_icd.as_ref().map(|c| c.as_str()), Some("R68.8"));
        assert_eq!(death.death_date.map(|d| d.to_fhir()).as_deref(), Some("2021-04-10"));
    }

    #[test]
    fn rejects_report_without_tumor_id() {
        let payload = r#"<ADT_GEKID><Menge_Patient><Patient><Menge_Meldung>
            <Meldung Meldung_ID="M9"><Meldedatum>01.01.2021</Meldedatum></Meldung>
        </Menge_Meldung></Patient></Menge_Patient></ADT_GEKID>"#;

        let err = AdtXmlParser.parse(payload).expect_err("missing tumor id");
        assert!(matches!(err, ParseError::MissingTumorId { report_id } if report_id == "M9"));
    }

    #[test]
    fn rejects_payload_without_report() {
        let err = AdtXmlParser
            .parse("<ADT_GEKID><Menge_Patient/></ADT_GEKID>")
            .expect_err("no report");
        assert!(matches!(err, ParseError::MissingReport));
    }

    #[test]
    fn rejects_empty_payload() {
        assert!(matches!(
            AdtXmlParser.parse("  \n"),
            Err(ParseError::EmptyPayload)
        ));
    }

    #[test]
    fn rejects_malformed_xml() {
        let err = AdtXmlParser
            .parse("<ADT_GEKID><Menge_Patient>")
            .expect_err("malformed");
        assert!(matches!(err, ParseError::InvalidXml { .. }));
    }

    #[test]
    fn rejects_invalid_dates() {
        let payload = DIAGNOSIS.replace("19.03.2021", "2021/03/19");
        let err = AdtXmlParser.parse(&payload).expect_err("bad date");
        assert!(matches!(err, ParseError::InvalidDate { field: "Meldedatum", .. }));
    }
}
