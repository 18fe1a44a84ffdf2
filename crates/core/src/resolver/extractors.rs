//! Named field-group extractors, in priority order.
//!
//! Each field group has a small list of extractors. The first extractor that yields at least one
//! candidate for a tumor case decides the source; recency and arrival order only break ties
//! between candidates of that same extractor.

use super::{DistantMetastasis, Grading};
use adt::{Histology, ParsedReport, StagingContext, Tnm, VitalStatus};
use obds_types::ReportDate;

/// A named way of pulling one field group out of a parsed report.
pub(crate) struct Extractor<T> {
    pub name: &'static str,
    pub extract: fn(&ParsedReport) -> Option<T>,
}

/// Values that carry the date used for recency ordering.
pub(crate) trait Dated {
    fn date(&self) -> Option<ReportDate>;
}

impl Dated for Histology {
    fn date(&self) -> Option<ReportDate> {
        self.date
    }
}

impl Dated for Grading {
    fn date(&self) -> Option<ReportDate> {
        self.date
    }
}

impl Dated for Tnm {
    fn date(&self) -> Option<ReportDate> {
        self.date
    }
}

impl Dated for VitalStatus {
    fn date(&self) -> Option<ReportDate> {
        self.death_date
    }
}

impl Dated for DistantMetastasis {
    fn date(&self) -> Option<ReportDate> {
        self.sites.iter().filter_map(|site| site.date).max()
    }
}

pub(crate) const HISTOLOGY: &[Extractor<Histology>] = &[
    Extractor {
        name: "operative_histology",
        extract: |r| with_morphology(r.operative_histology.as_ref()),
    },
    Extractor {
        name: "histology",
        extract: |r| with_morphology(r.histology.as_ref()),
    },
];

pub(crate) const GRADING: &[Extractor<Grading>] = &[
    Extractor {
        name: "operative_histology",
        extract: |r| grading_of(r.operative_histology.as_ref()),
    },
    Extractor {
        name: "histology",
        extract: |r| grading_of(r.histology.as_ref()),
    },
];

pub(crate) const CLINICAL_TNM: &[Extractor<Tnm>] = &[
    Extractor {
        name: "operative_tnm",
        extract: |r| operative_in(r, StagingContext::Clinical),
    },
    Extractor {
        name: "clinical_tnm",
        extract: |r| r.clinical_tnm.clone(),
    },
];

pub(crate) const PATHOLOGICAL_TNM: &[Extractor<Tnm>] = &[
    Extractor {
        name: "operative_tnm",
        extract: |r| operative_in(r, StagingContext::Pathological),
    },
    Extractor {
        name: "pathological_tnm",
        extract: |r| r.pathological_tnm.clone(),
    },
];

pub(crate) const VITAL_STATUS: &[Extractor<VitalStatus>] = &[Extractor {
    name: "vital_status",
    extract: |r| r.vital_status.clone(),
}];

pub(crate) const DISTANT_METASTASIS: &[Extractor<DistantMetastasis>] = &[Extractor {
    name: "distant_metastases",
    extract: |r| {
        (!r.distant_metastases.is_empty()).then(|| DistantMetastasis {
            sites: r.distant_metastases.clone(),
            derived: false,
        })
    },
}];

fn with_morphology(histology: Option<&Histology>) -> Option<Histology> {
    histology
        .filter(|h| h.morphology_code.is_some())
        .cloned()
}

fn grading_of(histology: Option<&Histology>) -> Option<Grading> {
    histology.and_then(|h| {
        h.grading.clone().map(|code| Grading {
            code,
            date: h.date,
        })
    })
}

fn operative_in(report: &ParsedReport, context: StagingContext) -> Option<Tnm> {
    report
        .operative_tnm
        .as_ref()
        .filter(|tnm| tnm.operative_context() == context)
        .cloned()
}
