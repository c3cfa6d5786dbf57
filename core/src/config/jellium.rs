use std::{fs::File, io::BufReader, path::Path};

use anyhow::{ensure, Context};
use serde::Deserialize;

use crate::jellium::JelliumSystem;

fn default_dimension() -> u32 {
    3
}

/// A jellium calculation as written in a config file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigJellium {
    /// Wigner-Seitz radius
    pub radius: f64,
    pub num_electrons: usize,
    pub num_orbitals: usize,
    #[serde(default = "default_dimension")]
    pub dimension: u32,
}

impl ConfigJellium {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing jellium config {}", path.display()))
    }
}

impl TryFrom<ConfigJellium> for JelliumSystem {
    type Error = anyhow::Error;

    fn try_from(value: ConfigJellium) -> Result<Self, Self::Error> {
        let ConfigJellium {
            radius,
            num_electrons,
            num_orbitals,
            dimension,
        } = value;

        ensure!(
            dimension == 3,
            "jellium is only defined in three dimensions, got {dimension}"
        );
        ensure!(num_electrons > 0, "the cell must hold at least one electron");
        ensure!(num_orbitals > 0, "at least one orbital is needed");
        ensure!(
            radius.is_finite() && radius > 0.0,
            "the Wigner-Seitz radius must be positive, got {radius}"
        );
        ensure!(
            num_electrons / 2 <= num_orbitals,
            "{} doubly occupied orbitals do not fit into {num_orbitals} orbitals",
            num_electrons / 2
        );

        Ok(Self {
            n_electrons: num_electrons,
            n_orbitals: num_orbitals,
            radius,
        })
    }
}
