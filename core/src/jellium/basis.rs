use anyhow::bail;
use nalgebra::Vector3;

/// Energies closer than this are considered degenerate.
pub const DEGENERACY_TOLERANCE: f64 = 1e-12;

/// Plane waves `exp(2 pi i g . r / L)` for the shortest integer lattice vectors `g`, ordered by
/// `|g|`.
#[derive(Clone, Debug)]
pub struct PlaneWaveBasis {
    momenta: Vec<Vector3<f64>>,
    lengths: Vec<f64>,
}

impl PlaneWaveBasis {
    /// Picks the `n_orbitals` shortest lattice vectors.
    ///
    /// Fails if the cut at `n_orbitals` or at `n_occupied` would separate vectors of equal length,
    /// since the result would then depend on the sort order inside a shell.
    pub fn new(n_orbitals: usize, n_occupied: usize) -> anyhow::Result<Self> {
        let mut candidates = Vec::new();

        // grow a ball until it holds enough lattice points
        for radius in 0i32.. {
            candidates.clear();

            for (x, y, z) in itertools::iproduct!(-radius..=radius, -radius..=radius, -radius..=radius)
            {
                let g = Vector3::new(x as f64, y as f64, z as f64);
                let length = g.norm();
                if length < radius as f64 {
                    candidates.push((g, length));
                }
            }

            if candidates.len() >= n_orbitals {
                log::debug!(
                    "{} lattice vectors inside |g| < {radius} for {n_orbitals} orbitals",
                    candidates.len()
                );
                break;
            }
        }

        candidates.sort_by(|(_, a), (_, b)| a.total_cmp(b));
        let (momenta, lengths): (Vec<_>, Vec<_>) = candidates.into_iter().unzip();

        if let Some(&next) = lengths.get(n_orbitals) {
            if (lengths[n_orbitals - 1] - next).abs() <= DEGENERACY_TOLERANCE {
                bail!(
                    "{n_orbitals} orbitals would split the degenerate shell |g| = {next:.6}; \
                     choose a closed-shell orbital count"
                );
            }
        }

        if 0 < n_occupied
            && n_occupied < n_orbitals
            && (lengths[n_occupied - 1] - lengths[n_occupied]).abs() <= DEGENERACY_TOLERANCE
        {
            bail!(
                "{n_occupied} occupied orbitals would split the degenerate shell |g| = {:.6}",
                lengths[n_occupied]
            );
        }

        let mut basis = Self { momenta, lengths };
        basis.momenta.truncate(n_orbitals);
        basis.lengths.truncate(n_orbitals);
        Ok(basis)
    }

    pub fn len(&self) -> usize {
        self.momenta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.momenta.is_empty()
    }

    pub fn momentum(&self, orbital: usize) -> &Vector3<f64> {
        &self.momenta[orbital]
    }

    pub fn lengths(&self) -> &[f64] {
        &self.lengths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shells_are_ordered() {
        let basis = PlaneWaveBasis::new(27, 1).unwrap();

        assert_eq!(basis.len(), 27);
        assert_eq!(basis.momentum(0), &Vector3::zeros());
        assert!(basis.lengths()[1..7].iter().all(|&l| l == 1.0));
        assert!(basis.lengths()[7..19]
            .iter()
            .all(|&l| (l - 2f64.sqrt()).abs() < 1e-15));
        assert!(basis.lengths()[19..]
            .iter()
            .all(|&l| (l - 3f64.sqrt()).abs() < 1e-15));
        assert!(basis.lengths().windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn closed_shells_are_accepted() {
        for n in [1, 7, 19, 27, 33] {
            assert_eq!(PlaneWaveBasis::new(n, 0).unwrap().len(), n);
        }
    }

    #[test]
    fn open_shells_are_rejected() {
        assert!(PlaneWaveBasis::new(2, 1).is_err());
        assert!(PlaneWaveBasis::new(10, 1).is_err());
        // seven orbitals are a closed shell, but three occupied ones are not
        assert!(PlaneWaveBasis::new(7, 3).is_err());
        assert!(PlaneWaveBasis::new(7, 7).is_ok());
    }
}
