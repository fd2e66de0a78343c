//! Ionic activity corrections.
//!
//! [`ModelKind`] names a model and is what inputs and configuration carry.
//! [`ActivityModel`] is the resolved form: any external resources it needs are already
//! loaded, so evaluating it inside the solver loops never touches the filesystem.

pub mod debye_huckel;
pub mod pitzer;
pub mod pitzer_table;

use crate::constants::{ACTIVITY_EXTRAPOLATION_LIMIT, DAVIES_LIMIT};
use crate::errors::{SolveError, SolveResult};
use crate::species::SpeciesValues;
use log::warn;
use pitzer::PitzerParameters;
use pitzer_table::{PitzerTable, PITZER_FILE_NAME};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Name of an activity-correction model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Extended Debye-Hückel with ion-size parameters.
    #[default]
    DebyeHuckelFull,
    /// Extended Debye-Hückel evaluated at an ionic strength capped to the extrapolation limit.
    DebyeHuckelCapped,
    /// Davies equation, switching to extended Debye-Hückel above 0.5 mol/L.
    Davies,
    /// Pitzer with built-in binary coefficients and no mixing terms.
    PitzerLite,
    /// Ideal solution of carbonic acid in water, without the sodium counter-ion.
    ClosedSystemNoSodium,
    /// Pitzer (HMW) with coefficients read from an external `pitzer.dat`.
    #[serde(rename = "external_pitzer_hmw")]
    ExternalPitzerHmw,
}

impl ModelKind {
    /// Model used when a requested model is unavailable.
    pub const DEFAULT: ModelKind = ModelKind::DebyeHuckelFull;

    pub const ALL: [ModelKind; 6] = [
        ModelKind::DebyeHuckelFull,
        ModelKind::DebyeHuckelCapped,
        ModelKind::Davies,
        ModelKind::PitzerLite,
        ModelKind::ClosedSystemNoSodium,
        ModelKind::ExternalPitzerHmw,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ModelKind::DebyeHuckelFull => "debye_huckel_full",
            ModelKind::DebyeHuckelCapped => "debye_huckel_capped",
            ModelKind::Davies => "davies",
            ModelKind::PitzerLite => "pitzer_lite",
            ModelKind::ClosedSystemNoSodium => "closed_system_no_sodium",
            ModelKind::ExternalPitzerHmw => "external_pitzer_hmw",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = SolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                SolveError::invalid_input("model", format!("unknown activity model `{s}`"))
            })
    }
}

/// Where to look for external model resources.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelResources {
    /// Explicit Pitzer database path. When set, no other location is searched.
    pub pitzer_path: Option<PathBuf>,
}

impl ModelResources {
    pub fn with_pitzer_path(path: impl Into<PathBuf>) -> Self {
        Self {
            pitzer_path: Some(path.into()),
        }
    }

    /// Candidate locations for the Pitzer database: the override, otherwise the working
    /// directory followed by the executable's directory.
    pub fn pitzer_candidates(&self) -> Vec<PathBuf> {
        if let Some(path) = &self.pitzer_path {
            return vec![path.clone()];
        }
        let mut candidates = Vec::new();
        if let Ok(dir) = std::env::current_dir() {
            candidates.push(dir.join(PITZER_FILE_NAME));
        }
        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        {
            candidates.push(dir.join(PITZER_FILE_NAME));
        }
        candidates
    }
}

/// A resolved activity model.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityModel {
    DebyeHuckelFull,
    DebyeHuckelCapped { cap: f64 },
    Davies,
    PitzerLite,
    ClosedSystemNoSodium,
    ExternalPitzerHmw(Arc<PitzerTable>),
}

impl ActivityModel {
    /// Resolve `kind`, loading any external resource it needs.
    ///
    /// Fails with [`SolveError::ModelUnavailable`] when the resource cannot be found or
    /// parsed. No other model is substituted.
    pub fn resolve(kind: ModelKind, resources: &ModelResources) -> SolveResult<Self> {
        let model = match kind {
            ModelKind::DebyeHuckelFull => ActivityModel::DebyeHuckelFull,
            ModelKind::DebyeHuckelCapped => ActivityModel::DebyeHuckelCapped {
                cap: ACTIVITY_EXTRAPOLATION_LIMIT,
            },
            ModelKind::Davies => ActivityModel::Davies,
            ModelKind::PitzerLite => ActivityModel::PitzerLite,
            ModelKind::ClosedSystemNoSodium => ActivityModel::ClosedSystemNoSodium,
            ModelKind::ExternalPitzerHmw => {
                ActivityModel::ExternalPitzerHmw(Self::load_pitzer_table(resources)?)
            }
        };
        Ok(model)
    }

    /// Resolve `kind`, falling back to [`ModelKind::DEFAULT`] when it is unavailable.
    ///
    /// The second element carries the warning to surface to the user when a fallback
    /// happened.
    pub fn resolve_or_fallback(
        kind: ModelKind,
        resources: &ModelResources,
    ) -> (Self, Option<String>) {
        match Self::resolve(kind, resources) {
            Ok(model) => (model, None),
            Err(error) => {
                let message = format!("{error}; falling back to {}", ModelKind::DEFAULT);
                warn!("{message}");
                (ActivityModel::DebyeHuckelFull, Some(message))
            }
        }
    }

    fn load_pitzer_table(resources: &ModelResources) -> SolveResult<Arc<PitzerTable>> {
        let unavailable = |reason: String| SolveError::ModelUnavailable {
            model: ModelKind::ExternalPitzerHmw,
            reason,
        };
        let candidates = resources.pitzer_candidates();
        let path = match &resources.pitzer_path {
            Some(path) => path.clone(),
            None => candidates
                .iter()
                .find(|p| p.is_file())
                .cloned()
                .ok_or_else(|| {
                    let searched: Vec<String> =
                        candidates.iter().map(|p| p.display().to_string()).collect();
                    unavailable(format!(
                        "{PITZER_FILE_NAME} not found (searched: {})",
                        searched.join(", ")
                    ))
                })?,
        };
        PitzerTable::load_cached(&path).map_err(|e| unavailable(e.to_string()))
    }

    /// Override the ionic strength cap of the capped Debye-Hückel model.
    ///
    /// Other models are returned unchanged.
    pub fn with_ionic_strength_cap(self, cap: Option<f64>) -> Self {
        match (self, cap) {
            (ActivityModel::DebyeHuckelCapped { .. }, Some(cap)) => {
                ActivityModel::DebyeHuckelCapped { cap }
            }
            (model, _) => model,
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ActivityModel::DebyeHuckelFull => ModelKind::DebyeHuckelFull,
            ActivityModel::DebyeHuckelCapped { .. } => ModelKind::DebyeHuckelCapped,
            ActivityModel::Davies => ModelKind::Davies,
            ActivityModel::PitzerLite => ModelKind::PitzerLite,
            ActivityModel::ClosedSystemNoSodium => ModelKind::ClosedSystemNoSodium,
            ActivityModel::ExternalPitzerHmw(_) => ModelKind::ExternalPitzerHmw,
        }
    }

    /// Activity coefficients for every species.
    ///
    /// `composition` is only consulted by the Pitzer variants.
    pub fn compute_gamma(
        &self,
        ionic_strength: f64,
        composition: &SpeciesValues,
        temperature_c: f64,
    ) -> SpeciesValues {
        match self {
            ActivityModel::DebyeHuckelFull => {
                debye_huckel::extended(ionic_strength, temperature_c)
            }
            ActivityModel::DebyeHuckelCapped { cap } => {
                debye_huckel::extended(ionic_strength.min(*cap), temperature_c)
            }
            ActivityModel::Davies => debye_huckel::davies(ionic_strength, temperature_c),
            ActivityModel::PitzerLite => pitzer::activity_coefficients(
                &PitzerParameters::hmw_binaries(),
                ionic_strength,
                composition,
                temperature_c,
            ),
            ActivityModel::ClosedSystemNoSodium => SpeciesValues::ideal(),
            ActivityModel::ExternalPitzerHmw(table) => pitzer::activity_coefficients(
                &table.parameters,
                ionic_strength,
                composition,
                temperature_c,
            ),
        }
    }

    /// Whether the dosed sodium enters the charge balance.
    pub fn includes_counter_ion(&self) -> bool {
        !matches!(self, ActivityModel::ClosedSystemNoSodium)
    }

    /// Whether γ is independent of composition at fixed ionic strength, so that the
    /// charge balance reduces to a quartic in [H+].
    pub fn supports_closed_form(&self) -> bool {
        !matches!(
            self,
            ActivityModel::PitzerLite | ActivityModel::ExternalPitzerHmw(_)
        )
    }

    /// Ionic strength above which the model is extrapolating.
    pub fn validity_limit(&self) -> Option<f64> {
        match self {
            ActivityModel::Davies => Some(DAVIES_LIMIT),
            _ => None,
        }
    }

    pub fn ionic_strength_cap(&self) -> Option<f64> {
        match self {
            ActivityModel::DebyeHuckelCapped { cap } => Some(*cap),
            _ => None,
        }
    }
}
