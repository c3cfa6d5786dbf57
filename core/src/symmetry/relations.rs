use super::{spin_block, DerivationPlan, SymmetryRelation};
use crate::tensor::{
    BlockClass::{self, *},
    BlockKey,
    Spin::{Alpha as A, Beta as B},
};

const IDENTITY: [usize; 4] = [0, 1, 2, 3];
const SWAP_FIRST: [usize; 4] = [1, 0, 2, 3];
const SWAP_LAST: [usize; 4] = [0, 1, 3, 2];
const HERMITIAN: [usize; 4] = [2, 3, 0, 1];

/// Mixed-spin representative every spin-orbital class is built from.
fn mixed(class: BlockClass) -> BlockKey {
    spin_block(class, [A, B, A, B])
}

/// The antisymmetrized two-electron operator.
///
/// Canonical blocks are the `(α,β,α,β)` representatives of `ABIJ`, `ABCI`, `AIJK`, `IJKL` and
/// `ABCD`, the `(β,α,β,α)` representative of `AIBJ` and the spin-free exchange intermediate
/// `AIJB`. Spin-flip partners of the canonical mixed blocks are never stored twice.
pub fn two_electron_plan() -> DerivationPlan {
    let exchange = BlockKey::spatial(AIJB);
    let aibj = spin_block(AIBJ, [B, A, B, A]);

    let canonical = vec![
        mixed(ABIJ),
        mixed(ABCI),
        mixed(AIJK),
        mixed(IJKL),
        mixed(ABCD),
        aibj.clone(),
        exchange.clone(),
    ];

    let mut relations = Vec::new();

    for class in [ABIJ, IJKL, ABCD] {
        for spin in [A, B] {
            relations.push(SymmetryRelation::antisymmetrize(
                spin_block(class, [spin; 4]),
                mixed(class),
                &[(0, 1), (2, 3)],
            ));
        }
    }

    for spin in [A, B] {
        relations.push(SymmetryRelation::antisymmetrize(
            spin_block(ABCI, [spin; 4]),
            mixed(ABCI),
            &[(0, 1)],
        ));
    }
    relations.push(SymmetryRelation::negate(
        spin_block(ABCI, [A, B, B, A]),
        mixed(ABCI),
        &SWAP_FIRST,
    ));

    for spin in [A, B] {
        relations.push(SymmetryRelation::antisymmetrize(
            spin_block(AIJK, [spin; 4]),
            mixed(AIJK),
            &[(2, 3)],
        ));
    }
    relations.push(SymmetryRelation::negate(
        spin_block(AIJK, [B, A, A, B]),
        mixed(AIJK),
        &SWAP_LAST,
    ));

    relations.push(SymmetryRelation::copy(mixed(AIBJ), aibj, &IDENTITY));
    for spins in [[A, B, B, A], [B, A, A, B]] {
        relations.push(SymmetryRelation::negate(
            spin_block(AIBJ, spins),
            exchange.clone(),
            &SWAP_LAST,
        ));
    }
    for spin in [A, B] {
        relations.push(
            SymmetryRelation::copy(spin_block(AIBJ, [spin; 4]), mixed(AIBJ), &IDENTITY)
                .with_term(exchange.clone(), &SWAP_LAST, -1.0),
        );
    }

    // <rs||pq> = <pq||rs> for real orbitals
    let hermitian = [
        (IJAK, AIJK, [[A, A, A, A], [A, B, A, B], [A, B, B, A], [B, B, B, B]]),
        (AIBC, ABCI, [[A, A, A, A], [A, B, A, B], [B, A, A, B], [B, B, B, B]]),
    ];
    for (target, source, patterns) in hermitian {
        for spins in patterns {
            let source_spins = [spins[2], spins[3], spins[0], spins[1]];
            relations.push(SymmetryRelation::copy(
                spin_block(target, spins),
                spin_block(source, source_spins),
                &HERMITIAN,
            ));
        }
    }
    for spins in [[A, A, A, A], [A, B, A, B], [B, B, B, B]] {
        relations.push(SymmetryRelation::copy(
            spin_block(IJAB, spins),
            spin_block(ABIJ, spins),
            &HERMITIAN,
        ));
    }

    DerivationPlan::new(canonical, relations)
}

/// `G = H - T`: the nuclear attraction follows from the one-electron Hamiltonian and the kinetic
/// energy.
pub fn nuclear_attraction_plan() -> DerivationPlan {
    let hamiltonian = BlockKey::spatial(OneElectronHamiltonian);
    let kinetic = BlockKey::spatial(Kinetic);

    DerivationPlan::new(
        vec![hamiltonian.clone(), kinetic.clone()],
        vec![SymmetryRelation::copy(
            BlockKey::spatial(NuclearAttraction),
            hamiltonian,
            &[0, 1],
        )
        .with_term(kinetic, &[0, 1], -1.0)],
    )
}
