//! External Pitzer (HMW) parameter table.
//!
//! Reads the `PITZER` keyword block of a PHREEQC-style `pitzer.dat` database and keeps the
//! coefficients relevant to the sodium/carbonate system. Loaded tables are cached per path
//! and shared read-only between solves.

use crate::activity::pitzer::{BinaryParameters, PitzerParameters};
use crate::species::Species;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};
use thiserror::Error;

/// File name searched for when no explicit path is configured.
pub const PITZER_FILE_NAME: &str = "pitzer.dat";

/// Error type for a Pitzer parameter file that cannot be used.
#[derive(Error, Debug)]
pub enum PitzerTableError {
    #[error("Unable to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("No PITZER keyword block found")]
    MissingSection,
    #[error("Missing {block} coefficient for {species}")]
    MissingCoefficient { block: String, species: String },
    #[error("Line {line}: cannot parse coefficient from `{text}`")]
    InvalidNumber { line: usize, text: String },
}

/// Coefficients read from an external Pitzer database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitzerTable {
    pub source: Option<PathBuf>,
    pub parameters: PitzerParameters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Block {
    B0,
    B1,
    C0,
    Theta,
    Psi,
    Other,
}

impl Block {
    fn from_marker(marker: &str) -> Self {
        match marker.to_ascii_uppercase().as_str() {
            "-B0" => Block::B0,
            "-B1" => Block::B1,
            "-C0" => Block::C0,
            "-THETA" => Block::Theta,
            "-PSI" => Block::Psi,
            _ => Block::Other,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Block::B0 => "B0",
            Block::B1 => "B1",
            Block::C0 => "C0",
            Block::Theta => "THETA",
            Block::Psi => "PSI",
            Block::Other => "other",
        }
    }
}

fn parse_species(token: &str) -> Option<Species> {
    match token {
        "Na+" => Some(Species::Sodium),
        "H+" => Some(Species::Hydrogen),
        "OH-" => Some(Species::Hydroxide),
        "HCO3-" => Some(Species::Bicarbonate),
        "CO3-2" | "CO3--" | "CO3^2-" => Some(Species::Carbonate),
        _ => None,
    }
}

/// Keyword lines (e.g. `SOLUTION_SPECIES`, `END`) start in column 0 and are upper case.
fn is_keyword(line: &str) -> bool {
    let first = match line.split_whitespace().next() {
        Some(token) => token,
        None => return false,
    };
    !line.starts_with(char::is_whitespace)
        && first
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[derive(Default)]
struct RawCoefficients {
    binary: HashMap<(Block, Species), f64>,
    theta_co3_oh: Option<f64>,
    psi_co3_na_oh: Option<f64>,
    psi_co3_hco3_na: Option<f64>,
}

impl PitzerTable {
    /// Parse a PHREEQC-style database.
    ///
    /// Entries for species outside the Na–CO2–H2O system are ignored. Only the first
    /// coefficient (the 25 °C value) of each entry is used.
    pub fn parse(contents: &str) -> Result<Self, PitzerTableError> {
        let mut in_section = false;
        let mut found_section = false;
        let mut block = Block::Other;
        let mut raw = RawCoefficients::default();

        for (index, raw_line) in contents.lines().enumerate() {
            let line = match raw_line.find('#') {
                Some(pos) => &raw_line[..pos],
                None => raw_line,
            };
            if line.trim().is_empty() {
                continue;
            }

            if is_keyword(line) {
                in_section = line.trim() == "PITZER";
                found_section |= in_section;
                block = Block::Other;
                continue;
            }
            if !in_section {
                continue;
            }

            let trimmed = line.trim();
            if trimmed.starts_with('-') {
                block = Block::from_marker(trimmed.split_whitespace().next().unwrap_or(""));
                continue;
            }
            if block == Block::Other {
                continue;
            }

            let tokens: Vec<&str> = trimmed.split_whitespace().collect();
            let n_species = if block == Block::Psi { 3 } else { 2 };
            if tokens.len() <= n_species {
                continue;
            }
            let species: Option<Vec<Species>> =
                tokens[..n_species].iter().map(|t| parse_species(t)).collect();
            let species = match species {
                Some(species) => species,
                None => continue,
            };
            let value: f64 =
                tokens[n_species]
                    .parse()
                    .map_err(|_| PitzerTableError::InvalidNumber {
                        line: index + 1,
                        text: trimmed.to_string(),
                    })?;

            raw.record(block, &species, value);
        }

        if !found_section {
            return Err(PitzerTableError::MissingSection);
        }
        raw.into_parameters().map(|parameters| Self {
            source: None,
            parameters,
        })
    }

    /// Read and parse the database at `path`.
    pub fn from_path(path: &Path) -> Result<Self, PitzerTableError> {
        let contents = std::fs::read_to_string(path).map_err(|source| PitzerTableError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut table = Self::parse(&contents)?;
        table.source = Some(path.to_path_buf());
        Ok(table)
    }

    /// Load `path`, reusing a previously parsed table when available.
    pub fn load_cached(path: &Path) -> Result<Arc<Self>, PitzerTableError> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        {
            let cache = TABLE_CACHE.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(table) = cache.get(&key) {
                return Ok(Arc::clone(table));
            }
        }

        let table = Arc::new(Self::from_path(path)?);
        debug!("Loaded Pitzer parameters from {}", path.display());
        let mut cache = TABLE_CACHE.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(key).or_insert(table)))
    }
}

impl RawCoefficients {
    fn record(&mut self, block: Block, species: &[Species], value: f64) {
        let has = |s: Species| species.contains(&s);
        match block {
            Block::B0 | Block::B1 | Block::C0 => {
                if !has(Species::Sodium) {
                    return;
                }
                if let Some(anion) = species.iter().find(|s| s.charge() < 0) {
                    self.binary.insert((block, *anion), value);
                }
            }
            Block::Theta => {
                if has(Species::Carbonate) && has(Species::Hydroxide) {
                    self.theta_co3_oh = Some(value);
                }
            }
            Block::Psi => {
                if has(Species::Carbonate) && has(Species::Sodium) {
                    if has(Species::Hydroxide) {
                        self.psi_co3_na_oh = Some(value);
                    } else if has(Species::Bicarbonate) {
                        self.psi_co3_hco3_na = Some(value);
                    }
                }
            }
            Block::Other => {}
        }
    }

    fn binary_for(&self, anion: Species) -> Result<BinaryParameters, PitzerTableError> {
        let required = |block: Block| {
            self.binary
                .get(&(block, anion))
                .copied()
                .ok_or_else(|| PitzerTableError::MissingCoefficient {
                    block: block.name().to_string(),
                    species: format!("{}/{}", Species::Sodium, anion),
                })
        };
        Ok(BinaryParameters {
            beta0: required(Block::B0)?,
            beta1: required(Block::B1)?,
            c_phi: self
                .binary
                .get(&(Block::C0, anion))
                .copied()
                .unwrap_or(0.0),
        })
    }

    fn into_parameters(self) -> Result<PitzerParameters, PitzerTableError> {
        let missing = |block: Block, species: &str| PitzerTableError::MissingCoefficient {
            block: block.name().to_string(),
            species: species.to_string(),
        };
        Ok(PitzerParameters {
            na_oh: self.binary_for(Species::Hydroxide)?,
            na_hco3: self.binary_for(Species::Bicarbonate)?,
            na_co3: self.binary_for(Species::Carbonate)?,
            theta_co3_oh: self
                .theta_co3_oh
                .ok_or_else(|| missing(Block::Theta, "CO3-2/OH-"))?,
            psi_co3_na_oh: self
                .psi_co3_na_oh
                .ok_or_else(|| missing(Block::Psi, "CO3-2/Na+/OH-"))?,
            psi_co3_hco3_na: self
                .psi_co3_hco3_na
                .ok_or_else(|| missing(Block::Psi, "CO3-2/HCO3-/Na+"))?,
        })
    }
}

static TABLE_CACHE: LazyLock<RwLock<HashMap<PathBuf, Arc<PitzerTable>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

#[cfg(test)]
pub(crate) const SAMPLE_DATABASE: &str = r#"
SOLUTION_MASTER_SPECIES
Na       Na+    0.0     Na       22.9898
PITZER
-B0
  Na+       OH-       0.0864     0         0        7.00E-04
  Na+       HCO3-     0.0277     0         0        1.00E-03
  Na+       CO3-2     0.0399     0         0        1.79E-03
  K+        Cl-       0.04808    -758.48
-B1
  Na+       OH-       0.253      # temperature terms omitted
  Na+       HCO3-     0.0411
  Na+       CO3-2     1.389
-C0
  Na+       OH-       0.0044
  Na+       CO3-2     0.0044
-THETA
  CO3-2     OH-       0.1
  Cl-       OH-       -0.05
-PSI
  CO3-2     Na+       OH-       -0.017
  CO3-2     HCO3-     Na+       0.002
-LAMDA
  Na+       CO2       0.1
END
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_sample_database() {
        let table = PitzerTable::parse(SAMPLE_DATABASE).unwrap();
        let p = table.parameters;

        assert_eq!(p.na_oh.beta0, 0.0864);
        assert_eq!(p.na_oh.beta1, 0.253);
        assert_eq!(p.na_oh.c_phi, 0.0044);
        assert_eq!(p.na_hco3.c_phi, 0.0);
        assert_eq!(p.na_co3.beta1, 1.389);
        assert_eq!(p.theta_co3_oh, 0.1);
        assert_eq!(p.psi_co3_na_oh, -0.017);
        assert_eq!(p.psi_co3_hco3_na, 0.002);
    }

    #[test]
    fn test_missing_section() {
        let result = PitzerTable::parse("SOLUTION_SPECIES\nNa+ = Na+\n");
        assert!(matches!(result, Err(PitzerTableError::MissingSection)));
    }

    #[test]
    fn test_missing_binary_coefficient() {
        let contents = SAMPLE_DATABASE.replace("  Na+       HCO3-     0.0411\n", "");
        let result = PitzerTable::parse(&contents);
        match result {
            Err(PitzerTableError::MissingCoefficient { block, species }) => {
                assert_eq!(block, "B1");
                assert_eq!(species, "Na+/HCO3-");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_number() {
        let contents = SAMPLE_DATABASE.replace("0.253", "abc");
        assert!(matches!(
            PitzerTable::parse(&contents),
            Err(PitzerTableError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_load_cached_returns_shared_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_DATABASE.as_bytes()).unwrap();

        let first = PitzerTable::load_cached(file.path()).unwrap();
        let second = PitzerTable::load_cached(file.path()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.source.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = PitzerTable::load_cached(&dir.path().join(PITZER_FILE_NAME));
        assert!(matches!(result, Err(PitzerTableError::Read { .. })));
    }
}
