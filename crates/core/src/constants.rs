//! Constants used throughout the obds core crate.

/// Whether older versions of a report are dropped before resolution unless configured otherwise.
pub const DEFAULT_SUPERSEDE_VERSIONS: bool = true;

/// Code for "yes" in the yes/no/unknown code system; every emitted metastasis site is present.
pub const METASTASIS_PRESENT_CODE: &str = "J";

/// Upper bound for patient references, which end up inside identifier values.
pub const MAX_PATIENT_REF_LEN: usize = 64;

/// Joins patient reference and tumor id in identifier values; never valid in a patient reference.
pub const IDENTIFIER_SEPARATOR: char = '|';

/// Extension of ledger files picked up when scanning a directory.
pub const LEDGER_FILE_EXTENSION: &str = "json";

/// Suffix of bundle files written next to their ledger name.
pub const BUNDLE_FILE_SUFFIX: &str = ".bundle.json";
