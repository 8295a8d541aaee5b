//! The seven lattice systems.

use errors::EnvError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LatticeSystem {
    Cubic,
    Hexagonal,
    Monoclinic,
    Orthorhombic,
    Rhombohedral,
    Tetragonal,
    #[default]
    Triclinic
}

impl LatticeSystem {
    pub fn parse(name: &str) -> Result<Self, EnvError> {
        Self::from_str(name.trim()).map_err(|_| EnvError::InvalidLatticeSystem {
            name: name.to_string()
        })
    }

    pub fn all() -> Vec<Self> {
        Self::iter().collect()
    }
}
