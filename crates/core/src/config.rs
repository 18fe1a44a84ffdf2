//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the processor. Nothing
//! in this crate reads environment variables or configuration files while a batch is running,
//! so a configuration problem can only ever surface before the first batch is accepted.

use crate::constants::DEFAULT_SUPERSEDE_VERSIONS;
use crate::{ObdsError, ObdsResult};
use fhir::FhirConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    fhir: Arc<FhirConfig>,
    supersede_versions: bool,
}

impl CoreConfig {
    /// Create a new `CoreConfig` from an already validated code/display configuration.
    pub fn new(fhir: FhirConfig) -> Self {
        Self {
            fhir: Arc::new(fhir),
            supersede_versions: DEFAULT_SUPERSEDE_VERSIONS,
        }
    }

    /// Load the code/display configuration from `fhir_config_path`, or use the bundled one.
    ///
    /// # Errors
    ///
    /// Returns [`ObdsError::FileRead`] if the file cannot be read and
    /// [`ObdsError::Configuration`] if it does not validate.
    pub fn load(fhir_config_path: Option<PathBuf>) -> ObdsResult<Self> {
        let fhir = match fhir_config_path {
            Some(path) => load_fhir_config(&path)?,
            None => FhirConfig::bundled()?,
        };
        Ok(Self::new(fhir))
    }

    /// Turn dropping of superseded report versions on or off.
    pub fn with_version_supersession(mut self, enabled: bool) -> Self {
        self.supersede_versions = enabled;
        self
    }

    pub fn fhir(&self) -> &Arc<FhirConfig> {
        &self.fhir
    }

    pub fn supersede_versions(&self) -> bool {
        self.supersede_versions
    }
}

fn load_fhir_config(path: &Path) -> ObdsResult<FhirConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| ObdsError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let config = FhirConfig::parse(&text)?;
    tracing::info!(path = %path.display(), "loaded FHIR code configuration");
    Ok(config)
}
