use std::fmt;

/// Lower-triangle index of an unordered orbital pair.
///
/// The pair `(p, q)` with `p >= q` is stored as `p (p + 1) / 2 + q`, which enumerates
/// `{(p, q) : 0 <= q <= p < N}` row by row.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PackedIndex(usize);

impl PackedIndex {
    /// Packs a pair, in either order.
    pub const fn new(p: usize, q: usize) -> Self {
        let (p, q) = if p >= q { (p, q) } else { (q, p) };
        Self(p * (p + 1) / 2 + q)
    }

    pub const fn from_linear(linear: usize) -> Self {
        Self(linear)
    }

    /// Converts the 1-based packed index found in integral files. Non-positive values don't
    /// address any pair.
    pub fn from_one_based(raw: i64) -> Option<Self> {
        (raw >= 1).then(|| Self(raw as usize - 1))
    }

    pub const fn linear(self) -> usize {
        self.0
    }

    /// Recovers `(p, q)`, `p >= q`, or `None` if the index addresses a pair outside `N`
    /// orbitals.
    ///
    /// `p` is the smallest row with `sum_{k<=p} (k + 1) > index`.
    pub fn unpack(self, n_orbitals: usize) -> Option<(usize, usize)> {
        let mut row_start = 0;
        for p in 0..n_orbitals {
            if row_start + p + 1 > self.0 {
                return Some((p, self.0 - row_start));
            }
            row_start += p + 1;
        }
        None
    }
}

impl fmt::Display for PackedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}
