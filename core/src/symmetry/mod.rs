//! Derivation of tensor blocks from already populated blocks.
//!
//! A [`SymmetryRelation`] states that every element of a target block is a signed, permuted
//! combination of elements of source blocks:
//!
//!   target[i_0, i_1, ...] = scale * sum_terms sign * source[i_perm[0], i_perm[1], ...]
//!
//! A [`DerivationPlan`] is an ordered list of such relations together with the canonical blocks
//! that are computed directly. Applying a plan never evaluates any physics.
use std::collections::HashSet;

use anyhow::{bail, ensure};
use smallvec::SmallVec;

use crate::tensor::{linear_index, unravel, BlockClass, BlockKey, Shape, Spin, TensorStore};

mod relations;

pub use relations::{nuclear_attraction_plan, two_electron_plan};

/// Maps target positions onto source positions: source index `k` is target index
/// `permutation[k]`.
pub type Permutation = SmallVec<[usize; 4]>;

#[derive(Clone, Debug, PartialEq)]
pub struct Term {
    pub source: BlockKey,
    pub permutation: Permutation,
    pub sign: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SymmetryRelation {
    pub target: BlockKey,
    pub scale: f64,
    pub terms: SmallVec<[Term; 4]>,
}

impl SymmetryRelation {
    /// `target = source` after permuting indices.
    pub fn copy(target: BlockKey, source: BlockKey, permutation: &[usize]) -> Self {
        Self::signed(target, source, permutation, 1.0)
    }

    /// `target = -source` after permuting indices.
    pub fn negate(target: BlockKey, source: BlockKey, permutation: &[usize]) -> Self {
        Self::signed(target, source, permutation, -1.0)
    }

    fn signed(target: BlockKey, source: BlockKey, permutation: &[usize], sign: f64) -> Self {
        Self {
            target,
            scale: 1.0,
            terms: SmallVec::from_elem(
                Term {
                    source,
                    permutation: SmallVec::from_slice(permutation),
                    sign,
                },
                1,
            ),
        }
    }

    /// Antisymmetrizes `source` over each pair of index positions.
    ///
    /// The source must be symmetric under exchanging all pairs at once, as plain Coulomb
    /// integrals are, so with `n` pairs every distinct contribution appears `2^(n-1)` times
    /// among the `2^n` terms and the scale compensates for it.
    pub fn antisymmetrize(target: BlockKey, source: BlockKey, pairs: &[(usize, usize)]) -> Self {
        assert!(!pairs.is_empty(), "nothing to antisymmetrize {target} over");
        let rank = target.class.rank();

        let mut terms = SmallVec::new();
        for swaps in 0u32..1 << pairs.len() {
            let mut permutation = (0..rank).collect::<Permutation>();
            let mut sign = 1.0;

            for (bit, &(a, b)) in pairs.iter().enumerate() {
                if swaps & (1 << bit) != 0 {
                    permutation.swap(a, b);
                    sign = -sign;
                }
            }

            terms.push(Term {
                source: source.clone(),
                permutation,
                sign,
            });
        }

        Self {
            target,
            scale: 0.5f64.powi(pairs.len() as i32 - 1),
            terms,
        }
    }

    /// Adds another signed, permuted source.
    pub fn with_term(mut self, source: BlockKey, permutation: &[usize], sign: f64) -> Self {
        self.terms.push(Term {
            source,
            permutation: SmallVec::from_slice(permutation),
            sign,
        });
        self
    }

    /// Populates the target block from its sources with a single batched write.
    ///
    /// # Panics
    ///
    /// If the target was never declared, a source has not been populated yet, or the source
    /// and target shapes are inconsistent with the permutation. All of these can only come
    /// from a wrong derivation order or a wrong relation table.
    pub fn apply<S: TensorStore>(&self, store: &mut S) {
        let target_shape = store
            .shape(&self.target)
            .unwrap_or_else(|| panic!("derivation target {} was never declared", self.target));
        let rank = target_shape.len();

        let sources = self
            .terms
            .iter()
            .map(|term| {
                let data = store.get_local_data(&term.source).unwrap_or_else(|| {
                    panic!(
                        "{} is derived from {}, which has not been populated",
                        self.target, term.source
                    )
                });
                let shape = store
                    .shape(&term.source)
                    .expect("populated blocks are declared");

                assert_eq!(
                    term.permutation.len(),
                    rank,
                    "permutation of {} does not match the rank of {}",
                    term.source,
                    self.target
                );
                for (position, &axis) in term.permutation.iter().enumerate() {
                    assert_eq!(
                        shape[position], target_shape[axis],
                        "index {position} of {} does not match index {axis} of {}",
                        term.source, self.target
                    );
                }

                (term, shape, data)
            })
            .collect::<Vec<(&Term, Shape, Vec<f64>)>>();

        let size = target_shape.iter().product::<usize>();
        let mut pairs = Vec::with_capacity(size);
        let mut source_index: Shape = SmallVec::from_elem(0, rank);

        for linear in 0..size {
            let index = unravel(&target_shape, linear);

            let mut value = 0.0;
            for (term, shape, data) in &sources {
                for (position, &axis) in term.permutation.iter().enumerate() {
                    source_index[position] = index[axis];
                }
                value += term.sign * data[linear_index(shape, &source_index)];
            }

            pairs.push((linear, self.scale * value));
        }

        log::debug!(
            "derived {} from {}",
            self.target,
            itertools::join(self.terms.iter().map(|term| &term.source), ", ")
        );
        store.write_local_data(&self.target, &pairs);
    }
}

/// Canonical blocks plus the ordered relations that derive everything else from them.
#[derive(Clone, Debug)]
pub struct DerivationPlan {
    canonical: Vec<BlockKey>,
    relations: Vec<SymmetryRelation>,
}

impl DerivationPlan {
    pub fn new(canonical: Vec<BlockKey>, relations: Vec<SymmetryRelation>) -> Self {
        Self {
            canonical,
            relations,
        }
    }

    /// Blocks a producer has to compute directly.
    pub fn canonical(&self) -> &[BlockKey] {
        &self.canonical
    }

    pub fn relations(&self) -> &[SymmetryRelation] {
        &self.relations
    }

    /// Every block the plan touches: canonical blocks first, then derived ones in order.
    pub fn blocks(&self) -> impl Iterator<Item = &BlockKey> {
        self.canonical
            .iter()
            .chain(self.relations.iter().map(|relation| &relation.target))
    }

    /// Checks, without any storage, that every source is available when its relation runs and
    /// that no block is produced twice.
    pub fn check_order(&self) -> anyhow::Result<()> {
        let mut available = HashSet::new();

        for key in &self.canonical {
            ensure!(available.insert(key), "canonical block {key} is listed twice");
        }

        for relation in &self.relations {
            for term in &relation.terms {
                if !available.contains(&term.source) {
                    bail!(
                        "{} is derived from {} before it is available",
                        relation.target,
                        term.source
                    );
                }
            }
            ensure!(
                available.insert(&relation.target),
                "{} is produced more than once",
                relation.target
            );
        }

        Ok(())
    }

    /// Applies every relation in order. Canonical blocks must already be populated.
    pub fn apply<S: TensorStore>(&self, store: &mut S) {
        for relation in &self.relations {
            relation.apply(store);
        }
    }
}

/// Shorthand for a spin-orbital block key.
pub(crate) fn spin_block(class: BlockClass, spins: [Spin; 4]) -> BlockKey {
    BlockKey::with_spins(class, &spins)
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::*;
    use crate::tensor::{MemoryStore, Spin::Alpha as A, Spin::Beta as B};

    fn store_with(source: &BlockKey, shape: Shape, data: &[f64]) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.declare(source.clone(), shape);
        let pairs = data.iter().copied().enumerate().collect::<Vec<_>>();
        store.write_local_data(source, &pairs);
        store
    }

    #[test]
    fn negated_permutation_is_exact() {
        let source = spin_block(BlockClass::ABCI, [A, B, A, B]);
        let target = spin_block(BlockClass::ABCI, [A, B, B, A]);
        let shape: Shape = smallvec![2, 2, 2, 1];
        let data = (0..8).map(|i| 0.1 * i as f64 + 0.01).collect::<Vec<_>>();

        let mut store = store_with(&source, shape.clone(), &data);
        store.declare(target.clone(), shape);
        SymmetryRelation::negate(target.clone(), source.clone(), &[1, 0, 2, 3]).apply(&mut store);

        let source = store.block(&source).unwrap();
        let target = store.block(&target).unwrap();
        for (p, q, r) in itertools::iproduct!(0..2, 0..2, 0..2) {
            assert_eq!(target.get(&[p, q, r, 0]), -source.get(&[q, p, r, 0]));
        }
    }

    #[test]
    fn antisymmetrized_block_changes_sign_under_exchange() {
        let source = spin_block(BlockClass::IJKL, [A, B, A, B]);
        let target = spin_block(BlockClass::IJKL, [A, A, A, A]);
        let shape: Shape = smallvec![3, 3, 3, 3];

        // symmetric under the simultaneous exchange (p q)(r s)
        let coulomb = |p: usize, q: usize, r: usize, s: usize| {
            1.0 / (1.0 + (p * r) as f64 + (q * s) as f64) + 0.25 * (p + q) as f64
        };
        let mut data = vec![0.0; 81];
        for (p, q, r, s) in itertools::iproduct!(0..3, 0..3, 0..3, 0..3) {
            data[linear_index(&shape, &[p, q, r, s])] = coulomb(p, q, r, s);
        }

        let mut store = store_with(&source, shape.clone(), &data);
        store.declare(target.clone(), shape);

        let relation = SymmetryRelation::antisymmetrize(target.clone(), source, &[(0, 1), (2, 3)]);
        assert_eq!(relation.terms.len(), 4);
        assert_eq!(relation.scale, 0.5);
        relation.apply(&mut store);

        let block = store.block(&target).unwrap();
        for (p, q, r, s) in itertools::iproduct!(0..3, 0..3, 0..3, 0..3) {
            let expected = coulomb(p, q, r, s) - coulomb(p, q, s, r);
            approx::assert_abs_diff_eq!(block.get(&[p, q, r, s]), expected, epsilon = 1e-14);
            approx::assert_abs_diff_eq!(
                block.get(&[p, q, r, s]),
                -block.get(&[q, p, r, s]),
                epsilon = 1e-14
            );
        }
    }

    #[test]
    #[should_panic(expected = "has not been populated")]
    fn missing_source_is_fatal() {
        let source = spin_block(BlockClass::ABIJ, [A, B, A, B]);
        let target = spin_block(BlockClass::ABIJ, [A, A, A, A]);

        let mut store = MemoryStore::new();
        store.declare(source.clone(), smallvec![1, 1, 1, 1]);
        store.declare(target.clone(), smallvec![1, 1, 1, 1]);

        SymmetryRelation::antisymmetrize(target, source, &[(0, 1), (2, 3)]).apply(&mut store);
    }

    #[test]
    #[should_panic(expected = "does not match index")]
    fn inconsistent_shapes_are_fatal() {
        let source = spin_block(BlockClass::AIJK, [A, B, A, B]);
        let target = spin_block(BlockClass::IJAK, [A, B, A, B]);

        let mut store = store_with(&source, smallvec![2, 1, 1, 1], &[1.0, 2.0]);
        store.declare(target.clone(), smallvec![1, 1, 2, 1]);

        // the hermitian partner needs (r, s, p, q), not the identity
        SymmetryRelation::copy(target, source, &[0, 1, 2, 3]).apply(&mut store);
    }

    #[test]
    fn order_check_rejects_late_sources() {
        let canonical = spin_block(BlockClass::ABIJ, [A, B, A, B]);
        let same_spin = spin_block(BlockClass::ABIJ, [A, A, A, A]);
        let hermitian = spin_block(BlockClass::IJAB, [A, A, A, A]);

        let ordered = DerivationPlan::new(
            vec![canonical.clone()],
            vec![
                SymmetryRelation::antisymmetrize(
                    same_spin.clone(),
                    canonical.clone(),
                    &[(0, 1), (2, 3)],
                ),
                SymmetryRelation::copy(hermitian.clone(), same_spin.clone(), &[2, 3, 0, 1]),
            ],
        );
        assert!(ordered.check_order().is_ok());

        let reversed = DerivationPlan::new(
            vec![canonical.clone()],
            ordered.relations().iter().rev().cloned().collect(),
        );
        assert!(reversed.check_order().is_err());

        let duplicated = DerivationPlan::new(
            vec![canonical.clone()],
            vec![SymmetryRelation::copy(canonical.clone(), canonical, &[0, 1, 2, 3])],
        );
        assert!(duplicated.check_order().is_err());
    }
}
