//! Input validation utilities.
//!
//! This module contains functions for validating ledger inputs before they are used to build
//! grouping keys and resource identifiers.

use crate::constants::MAX_PATIENT_REF_LEN;
use crate::{ObdsError, ObdsResult};

/// Validates that a patient reference is safe for embedding in identifier values.
///
/// The reference becomes part of observation identifiers (`<patient_ref>|<tumor_id>-histology`)
/// and the name of the patient's resource id, so it is restricted to:
/// - non-blank input
/// - at most [`MAX_PATIENT_REF_LEN`] characters
/// - ASCII alphanumerics plus `.`, `-` and `_`
///
/// # Errors
///
/// Returns [`ObdsError::InvalidInput`] if the reference is invalid.
pub fn validate_patient_ref(patient_ref: &str) -> ObdsResult<()> {
    if patient_ref.trim().is_empty() {
        return Err(ObdsError::InvalidInput(
            "patient reference cannot be empty".into(),
        ));
    }

    if patient_ref.len() > MAX_PATIENT_REF_LEN {
        return Err(ObdsError::InvalidInput(format!(
            "patient reference exceeds maximum length of {MAX_PATIENT_REF_LEN} characters"
        )));
    }

    let ok = patient_ref
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-' | b'_'));

    if !ok {
        return Err(ObdsError::InvalidInput(
            "patient reference contains invalid characters (only alphanumeric, '.', '-', '_' allowed)"
                .into(),
        ));
    }

    Ok(())
}
