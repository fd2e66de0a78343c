//! Solve settings document.
//!
//! Settings are read from JSON. Every field is optional and falls back to its default, so an
//! empty object `{}` is a complete document.

use carbspec_components::{SensitivityEngine, SensitivitySettings};
use carbspec_core::{
    EquilibriumSolver, ModelKind, ModelResources, SolubilityInputs, SolveResult, SolverOptions,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings from {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveSettings {
    pub solver: SolverOptions,
    /// Activity model used for every solve.
    /// default: debye_huckel_full
    pub model: ModelKind,
    /// Substitute the default model when `model` cannot be resolved, instead of failing.
    /// default: false
    pub fallback_to_default_model: bool,
    pub sensitivity: SensitivitySettings,
    /// Explicit location of the Pitzer parameter table.
    pub pitzer_path: Option<PathBuf>,
    /// Background workers; zero picks one per core.
    /// default: 0
    pub worker_threads: usize,
}

impl Default for SolveSettings {
    fn default() -> Self {
        Self {
            solver: SolverOptions::default(),
            model: ModelKind::DEFAULT,
            fallback_to_default_model: false,
            sensitivity: SensitivitySettings::default(),
            pitzer_path: None,
            worker_threads: 0,
        }
    }
}

impl SolveSettings {
    pub fn from_json_str(contents: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Settings from `path`, or the defaults if the file is missing or malformed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::from_path(path) {
            Ok(settings) => {
                info!("Loaded solve settings from {:?}", path);
                settings
            }
            Err(SettingsError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("Settings file {:?} not found, using defaults", path);
                Self::default()
            }
            Err(e) => {
                warn!("{e}, using defaults");
                Self::default()
            }
        }
    }

    pub fn to_json_string(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn resources(&self) -> ModelResources {
        match &self.pitzer_path {
            Some(path) => ModelResources::with_pitzer_path(path),
            None => ModelResources::default(),
        }
    }

    /// Solver for the configured model.
    pub fn solver(&self) -> SolveResult<EquilibriumSolver> {
        let resources = self.resources();
        if self.fallback_to_default_model {
            Ok(EquilibriumSolver::resolve_or_fallback(self.model, &resources))
        } else {
            EquilibriumSolver::resolve(self.model, &resources)
        }
    }

    pub fn sensitivity_engine(&self) -> SolveResult<SensitivityEngine> {
        Ok(SensitivityEngine::new(self.solver()?, self.sensitivity.clone()))
    }

    /// Copy of `inputs` using the configured model and solver options.
    pub fn apply(&self, inputs: &SolubilityInputs) -> SolubilityInputs {
        inputs
            .clone()
            .with_model(self.model)
            .with_solver(self.solver)
    }
}
