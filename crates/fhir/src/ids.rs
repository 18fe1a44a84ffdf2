//! Deterministic resource identifiers.
//!
//! Resource ids are name-based (v5) UUIDs over `<system>|<value>`, so re-processing the same
//! reports always produces the same ids and a transaction `PUT` overwrites instead of
//! duplicating.

use std::fmt;
use uuid::Uuid;

/// A FHIR logical id.
///
/// Displays in the canonical 32-character lowercase hex form used for resource ids; [`urn`]
/// gives the hyphenated `urn:uuid:` form used for bundle `fullUrl`s.
///
/// [`urn`]: ResourceId::urn
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(Uuid);

impl ResourceId {
    /// Derive the id of a resource identified by `value` within identifier `system`.
    pub fn for_identifier(system: &str, value: &str) -> Self {
        let name = format!("{system}|{value}");
        Self(Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()))
    }

    /// `urn:uuid:` form for bundle entry `fullUrl`s.
    pub fn urn(&self) -> String {
        format!("urn:uuid:{}", self.0.hyphenated())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}
