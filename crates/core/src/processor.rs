//! Batch pipeline: ledger in, bundle out.

use crate::mapping::ObservationMapper;
use crate::resolver::{ConsolidatedTumorState, ConsolidationResolver};
use crate::{CoreConfig, ReportLedger};
use adt::{AdtXmlParser, ReportParser};
use fhir::{BundleAssembler, BundleData};

/// Runs one ledger through resolution, mapping and bundle assembly.
///
/// The processor holds no per-batch state. Clones share the configuration, so one processor can
/// be handed to any number of concurrent batch workers.
#[derive(Clone, Debug)]
pub struct ObservationProcessor<P = AdtXmlParser> {
    resolver: ConsolidationResolver<P>,
    mapper: ObservationMapper,
}

impl ObservationProcessor<AdtXmlParser> {
    /// A processor for ADT/GEKID XML payloads.
    pub fn new(config: &CoreConfig) -> Self {
        Self::with_parser(config, AdtXmlParser::new())
    }
}

impl<P: ReportParser> ObservationProcessor<P> {
    pub fn with_parser(config: &CoreConfig, parser: P) -> Self {
        Self {
            resolver: ConsolidationResolver::new(parser, config.supersede_versions()),
            mapper: ObservationMapper::new(config.fhir().clone()),
        }
    }

    /// Consolidated tumor states of a ledger, ordered by patient and tumor case.
    pub fn resolve(&self, ledger: &ReportLedger) -> Vec<ConsolidatedTumorState> {
        self.resolver.resolve(ledger)
    }

    /// Process a ledger into a bundle.
    ///
    /// Returns `None` when the batch yields no observation at all. Per-record and
    /// per-observation failures are logged and never abort the batch.
    pub fn process(&self, ledger: &ReportLedger) -> Option<BundleData> {
        let states = self.resolve(ledger);
        let bundle = self
            .mapper
            .map_batch(&states)
            .and_then(BundleAssembler::assemble);

        match &bundle {
            Some(bundle) => tracing::info!(
                records = ledger.len(),
                tumor_cases = states.len(),
                entries = bundle.len(),
                "assembled bundle"
            ),
            None => tracing::info!(
                records = ledger.len(),
                "batch produced no observations"
            ),
        }
        bundle
    }
}
