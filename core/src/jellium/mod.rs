//! The uniform electron gas (jellium) in a periodic cubic cell.
//!
//! Orbitals are plane waves with integer lattice momenta. The Hartree-Fock reference, the
//! Fock and density matrices and the antisymmetrized two-electron operator are all known in
//! closed form, so no integral engine is involved.
use std::f64::consts::PI;

use serde::Serialize;
use smallvec::SmallVec;

use crate::{
    symmetry::two_electron_plan,
    tensor::{unravel, BlockClass, BlockKey, OrbitalSpace, Spin, TensorStore},
};

pub mod basis;

pub use basis::{PlaneWaveBasis, DEGENERACY_TOLERANCE};

/// Madelung constant of the simple cubic lattice in the convention of the self-interaction term.
const MADELUNG: f64 = 2.83729747948149;

/// Tolerance for momentum conservation `g_p - g_r = g_s - g_q`.
const MOMENTUM_TOLERANCE: f64 = 1e-12;

/// A validated jellium problem, built from [`crate::config::ConfigJellium`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JelliumSystem {
    pub(crate) n_electrons: usize,
    pub(crate) n_orbitals: usize,
    pub(crate) radius: f64,
}

impl JelliumSystem {
    pub fn n_electrons(&self) -> usize {
        self.n_electrons
    }

    pub fn n_orbitals(&self) -> usize {
        self.n_orbitals
    }

    /// Wigner-Seitz radius.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Doubly occupied orbitals; an odd electron is left out.
    pub fn n_occupied(&self) -> usize {
        self.n_electrons / 2
    }
}

/// Geometry of the simulation cell.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Cell {
    pub volume: f64,
    /// edge length
    pub length: f64,
    /// self-interaction of an electron with its periodic images
    pub madelung: f64,
}

impl Cell {
    pub fn new(system: &JelliumSystem) -> Self {
        let volume = system.n_electrons as f64 * (4.0 / 3.0) * PI * system.radius.powi(3);
        let length = volume.cbrt();

        Self {
            volume,
            length,
            madelung: MADELUNG / length,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct JelliumOutput {
    /// Hartree-Fock reference energy
    pub energy: f64,
    pub orbital_energies: Vec<f64>,
    pub n_occupied: usize,
    pub n_virtual: usize,
    pub cell: Cell,
}

#[derive(Clone, Debug)]
pub struct Jellium {
    system: JelliumSystem,
    basis: PlaneWaveBasis,
    cell: Cell,
    orbital_energies: Vec<f64>,
}

impl Jellium {
    pub fn new(system: JelliumSystem) -> anyhow::Result<Self> {
        let basis = PlaneWaveBasis::new(system.n_orbitals, system.n_occupied())?;
        let cell = Cell::new(&system);

        let mut jellium = Self {
            system,
            basis,
            cell,
            orbital_energies: Vec::new(),
        };

        let n_occupied = system.n_occupied();
        jellium.orbital_energies = (0..system.n_orbitals)
            .map(|i| {
                let kinetic =
                    2.0 * (PI / cell.length).powi(2) * jellium.basis.momentum(i).norm_squared();
                kinetic - (0..n_occupied).map(|j| jellium.interaction(i, j)).sum::<f64>()
            })
            .collect();

        log::debug!(
            "jellium cell of length {:.6} with {} occupied and {} virtual orbitals",
            cell.length,
            n_occupied,
            system.n_orbitals - n_occupied
        );

        Ok(jellium)
    }

    pub fn basis(&self) -> &PlaneWaveBasis {
        &self.basis
    }

    pub fn orbital_energies(&self) -> &[f64] {
        &self.orbital_energies
    }

    pub fn space(&self) -> OrbitalSpace {
        let n_occupied = self.system.n_occupied();
        OrbitalSpace {
            n_occupied,
            n_virtual: self.system.n_orbitals - n_occupied,
        }
    }

    /// Interaction of two orbitals whose momenta differ by `g_i - g_j`: the Madelung term on the
    /// diagonal, `1 / (pi L |g_i - g_j|^2)` otherwise.
    fn interaction(&self, i: usize, j: usize) -> f64 {
        if i == j {
            self.cell.madelung
        } else {
            let q = self.basis.momentum(i) - self.basis.momentum(j);
            1.0 / (PI * self.cell.length * q.norm_squared())
        }
    }

    /// The Coulomb integral `<pq|rs>` over global orbital indices. It vanishes unless momentum
    /// is conserved.
    pub fn coulomb(&self, p: usize, q: usize, r: usize, s: usize) -> f64 {
        let transfer_pr = self.basis.momentum(p) - self.basis.momentum(r);
        let transfer_sq = self.basis.momentum(s) - self.basis.momentum(q);

        if (transfer_pr - transfer_sq).norm_squared() < MOMENTUM_TOLERANCE {
            self.interaction(p, r)
        } else {
            0.0
        }
    }

    pub fn reference_energy(&self) -> f64 {
        let n_occupied = self.system.n_occupied();

        (0..n_occupied)
            .map(|i| {
                2.0 * self.orbital_energies[i]
                    + (0..n_occupied).map(|j| self.interaction(i, j)).sum::<f64>()
            })
            .sum()
    }

    /// Declares and fills the Fock and density matrices and every block of the two-electron
    /// operator. Only canonical blocks are evaluated; the rest is derived.
    pub fn populate<S: TensorStore>(&self, store: &mut S) {
        let space = self.space();
        let n = space.n_orbitals();
        let n_occupied = space.n_occupied;
        let n_virtual = space.n_virtual;

        let fock = (0..n)
            .map(|i| (i + i * n, self.orbital_energies[i]))
            .collect::<Vec<_>>();
        let density = (0..n_occupied)
            .map(|i| (i + i * n, 1.0))
            .collect::<Vec<_>>();
        let occupied = (0..n_occupied)
            .map(|i| (i + i * n_occupied, self.orbital_energies[i]))
            .collect::<Vec<_>>();
        let virtuals = (0..n_virtual)
            .map(|a| (a + a * n_virtual, self.orbital_energies[a + n_occupied]))
            .collect::<Vec<_>>();

        for spin in [Spin::Alpha, Spin::Beta] {
            for (class, pairs) in [
                (BlockClass::Fock, &fock),
                (BlockClass::Density, &density),
                (BlockClass::IJ, &occupied),
                (BlockClass::AB, &virtuals),
            ] {
                let key = BlockKey::with_spins(class, &[spin, spin]);
                store.declare(key.clone(), space.shape(class));
                store.write_local_data(&key, pairs);
            }
        }

        let plan = two_electron_plan();
        for key in plan.blocks() {
            store.declare(key.clone(), space.shape(key.class));
        }

        for key in plan.canonical() {
            let shape = space.shape(key.class);
            let pairs = self.canonical_block(&space, key.class, &shape);

            log::debug!("{key}: {} non-zero integrals", pairs.len());
            store.write_remote_data(key, &pairs);
        }

        plan.apply(store);
    }

    /// Plain Coulomb integrals of one class, keeping only the non-zero ones.
    fn canonical_block(
        &self,
        space: &OrbitalSpace,
        class: BlockClass,
        shape: &[usize],
    ) -> Vec<(usize, f64)> {
        let offsets = class
            .roles()
            .iter()
            .map(|&role| space.offset(role))
            .collect::<SmallVec<[usize; 4]>>();

        let element = |linear: usize| {
            let index = unravel(shape, linear);
            let [p, q, r, s] = [0, 1, 2, 3].map(|k| index[k] + offsets[k]);
            let value = self.coulomb(p, q, r, s);

            log::trace!("<{p}{q}|{r}{s}> = {value}");
            (linear, value)
        };

        let size = shape.iter().product::<usize>();

        #[cfg(feature = "rayon")]
        let pairs = {
            use rayon::iter::{IntoParallelIterator, ParallelIterator};

            (0..size)
                .into_par_iter()
                .map(element)
                .filter(|&(_, value)| value != 0.0)
                .collect::<Vec<_>>()
        };

        #[cfg(not(feature = "rayon"))]
        let pairs = (0..size)
            .map(element)
            .filter(|&(_, value)| value != 0.0)
            .collect::<Vec<_>>();

        pairs
    }
}

/// Builds the jellium model and loads all of its products into `store`.
pub fn run<S: TensorStore>(system: JelliumSystem, store: &mut S) -> anyhow::Result<JelliumOutput> {
    let jellium = Jellium::new(system)?;
    let energy = jellium.reference_energy();

    log::info!(
        "jellium reference energy for {} electrons in {} orbitals: {energy:.15}",
        system.n_electrons,
        system.n_orbitals
    );

    jellium.populate(store);

    let space = jellium.space();
    Ok(JelliumOutput {
        energy,
        orbital_energies: jellium.orbital_energies.clone(),
        n_occupied: space.n_occupied,
        n_virtual: space.n_virtual,
        cell: jellium.cell,
    })
}
