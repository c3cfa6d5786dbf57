//! Block-keyed tensor storage.
//!
//! Integral tensors are partitioned into blocks identified by a [`BlockKey`]: the integral class
//! (which fixes the occupied/virtual role of every index), the spin of every index and the
//! irreducible representation of every index. Storage itself lives behind the [`TensorStore`]
//! trait; [`MemoryStore`] is the in-process implementation.
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

mod memory;

pub use memory::{BlockSummary, MemoryStore, TensorBlock};

/// Extent of every index of a block.
pub type Shape = SmallVec<[usize; 4]>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Spin {
    Alpha,
    Beta,
}

/// The orbital space an index runs over.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// virtual orbitals
    Particle,
    /// occupied orbitals
    Hole,
    /// every orbital
    General,
}

impl Role {
    fn letters(self) -> &'static [u8; 4] {
        match self {
            Role::Particle => b"abcd",
            Role::Hole => b"ijkl",
            Role::General => b"pqrs",
        }
    }
}

/// The tensors that make up the one-electron products and the two-electron operator.
///
/// Two-electron classes are named after their index roles in physicist notation, e.g. `ABIJ`
/// holds `<ab||ij>` with two virtual and two occupied indices.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockClass {
    Overlap,
    Kinetic,
    NuclearAttraction,
    OneElectronHamiltonian,
    Fock,
    Density,
    AB,
    IJ,
    ABIJ,
    ABCI,
    AIJK,
    IJKL,
    ABCD,
    AIBJ,
    IJAK,
    AIBC,
    IJAB,
    /// Spin-free `<ai|jb>`, the exchange intermediate of the `AIBJ` blocks.
    AIJB,
}

impl BlockClass {
    pub fn roles(self) -> &'static [Role] {
        const P: Role = Role::Particle;
        const H: Role = Role::Hole;
        const G: Role = Role::General;

        match self {
            Self::Overlap
            | Self::Kinetic
            | Self::NuclearAttraction
            | Self::OneElectronHamiltonian
            | Self::Fock
            | Self::Density => &[G, G],
            Self::AB => &[P, P],
            Self::IJ => &[H, H],
            Self::ABIJ => &[P, P, H, H],
            Self::ABCI => &[P, P, P, H],
            Self::AIJK => &[P, H, H, H],
            Self::IJKL => &[H, H, H, H],
            Self::ABCD => &[P, P, P, P],
            Self::AIBJ => &[P, H, P, H],
            Self::IJAK => &[H, H, P, H],
            Self::AIBC => &[P, H, P, P],
            Self::IJAB => &[H, H, P, P],
            Self::AIJB => &[P, H, H, P],
        }
    }

    pub fn rank(self) -> usize {
        self.roles().len()
    }

    /// The conventional product name downstream solvers look tensors up by.
    pub fn name(self) -> &'static str {
        match self {
            Self::Overlap => "S",
            Self::Kinetic => "T",
            Self::NuclearAttraction => "G",
            Self::OneElectronHamiltonian => "H",
            Self::Fock => "F",
            Self::Density => "D",
            Self::AB => "H.AB",
            Self::IJ => "H.IJ",
            Self::ABIJ => "H.ABIJ",
            Self::ABCI => "H.ABCI",
            Self::AIJK => "H.AIJK",
            Self::IJKL => "H.IJKL",
            Self::ABCD => "H.ABCD",
            Self::AIBJ => "H.AIBJ",
            Self::IJAK => "H.IJAK",
            Self::AIBC => "H.AIBC",
            Self::IJAB => "H.IJAB",
            Self::AIJB => "aijb",
        }
    }
}

/// Identifies one block of a symmetry-blocked tensor.
///
/// Spatial tensors carry no spin labels; spin-orbital tensors carry one per index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockKey {
    pub class: BlockClass,
    pub spins: SmallVec<[Spin; 4]>,
    pub irreps: SmallVec<[u8; 4]>,
}

impl BlockKey {
    /// A spin-free block of the totally symmetric irrep.
    pub fn spatial(class: BlockClass) -> Self {
        Self {
            class,
            spins: SmallVec::new(),
            irreps: smallvec![0; class.rank()],
        }
    }

    /// A spin-orbital block of the totally symmetric irrep.
    pub fn with_spins(class: BlockClass, spins: &[Spin]) -> Self {
        assert_eq!(
            spins.len(),
            class.rank(),
            "{} needs one spin label per index",
            class.name()
        );

        Self {
            class,
            spins: SmallVec::from_slice(spins),
            irreps: smallvec![0; class.rank()],
        }
    }

    /// Index labels in the usual letter convention: upper case for alpha, lower case for beta
    /// and spatial indices.
    pub fn labels(&self) -> String {
        let mut used = [0usize; 3];

        self.class
            .roles()
            .iter()
            .enumerate()
            .map(|(position, &role)| {
                let slot = role as usize;
                let letter = role.letters()[used[slot] % 4] as char;
                used[slot] += 1;

                match self.spins.get(position) {
                    Some(Spin::Alpha) => letter.to_ascii_uppercase(),
                    _ => letter,
                }
            })
            .collect()
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.class.name(), self.labels())
    }
}

/// Sizes of the occupied and virtual orbital spaces.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrbitalSpace {
    pub n_occupied: usize,
    pub n_virtual: usize,
}

impl OrbitalSpace {
    pub fn n_orbitals(&self) -> usize {
        self.n_occupied + self.n_virtual
    }

    pub fn dimension(&self, role: Role) -> usize {
        match role {
            Role::Particle => self.n_virtual,
            Role::Hole => self.n_occupied,
            Role::General => self.n_orbitals(),
        }
    }

    /// Offset of the first orbital of a role in the global orbital ordering.
    pub fn offset(&self, role: Role) -> usize {
        match role {
            Role::Particle => self.n_occupied,
            Role::Hole | Role::General => 0,
        }
    }

    pub fn shape(&self, class: BlockClass) -> Shape {
        class
            .roles()
            .iter()
            .map(|&role| self.dimension(role))
            .collect()
    }
}

/// Linear position of a multi-index, first index running fastest.
#[inline(always)]
pub fn linear_index(shape: &[usize], index: &[usize]) -> usize {
    debug_assert_eq!(shape.len(), index.len());

    shape
        .iter()
        .zip(index)
        .rev()
        .fold(0, |linear, (&extent, &i)| linear * extent + i)
}

/// Inverse of [`linear_index`].
#[inline(always)]
pub fn unravel(shape: &[usize], mut linear: usize) -> Shape {
    shape
        .iter()
        .map(|&extent| {
            let i = linear % extent;
            linear /= extent;
            i
        })
        .collect()
}

/// The storage collaborator integral producers write into.
///
/// Writes are batched: a producer hands over every `(linear index, value)` pair of a batch in
/// one call. Writing a key overwrites the previous value at that key.
pub trait TensorStore {
    /// Allocates a zero-filled block.
    fn declare(&mut self, key: BlockKey, shape: Shape);

    fn shape(&self, key: &BlockKey) -> Option<Shape>;

    fn write_local_data(&mut self, key: &BlockKey, pairs: &[(usize, f64)]);

    /// Writes data that may be owned by another process. In-process stores treat it exactly
    /// like [`TensorStore::write_local_data`].
    fn write_remote_data(&mut self, key: &BlockKey, pairs: &[(usize, f64)]) {
        self.write_local_data(key, pairs)
    }

    /// Returns the dense contents of a block, or `None` if nothing was ever written to it.
    fn get_local_data(&self, key: &BlockKey) -> Option<Vec<f64>>;
}
