//! The Boys function
//!
//!   F_m(T) = int_0^1 t^(2m) exp(-T t^2) dt
//!
//! evaluated by a convergent series below a per-order cutoff [`TMAX`], by its asymptotic
//! expansion above it, and, for many evaluations at once, by Taylor interpolation on a
//! precomputed [`BoysTable`] followed by downward recursion over the order.

/// Highest supported order.
pub const MAX_ORDER: usize = 39;

/// Number of terms of the Taylor expansion around a grid point. Interpolating order `n` reads
/// orders `n..n + TAYLOR_ORDER` from the table.
pub const TAYLOR_ORDER: usize = 8;

/// Highest order that can seed [`BoysTable::fm_recursive`] from the table.
pub const MAX_RECURSIVE_ORDER: usize = MAX_ORDER + 1 - TAYLOR_ORDER;

/// Per-order argument above which the asymptotic expansion is exact to double precision and
/// below which the series converges.
pub const TMAX: [u32; MAX_ORDER + 1] = [
    33, 37, 40, 43, 46, 49, 51, 53, 56, 58, 60, 62, 64, 66, 68, 70, 72, 74, 76, 78, 80, 82, 83, 85,
    87, 89, 90, 92, 94, 96, 97, 99, 101, 102, 104, 106, 108, 110, 112, 114,
];

/// Grid points per unit argument.
const GRID_DENSITY: f64 = 20.0;

const SERIES_TOLERANCE: f64 = 1e-15;

#[inline(always)]
fn check_argument(t: f64) {
    assert!(t >= 0.0, "Boys function argument must be non-negative, got {t}");
}

#[inline(always)]
fn check_order(m: usize, max: usize) {
    assert!(m <= max, "Boys function order {m} is outside 0..={max}");
}

/// F_m(T) by direct evaluation.
///
/// Uses the series `F_m(T) = e^-T sum_k T^k / ((m + 1/2)(m + 3/2)...(m + k + 1/2)) / 2` up to
/// `TMAX[m]` and [`fm_asymptotic`] beyond.
///
/// # Panics
///
/// If `t` is negative or NaN, or `m > MAX_ORDER`.
pub fn fm(t: f64, m: usize) -> f64 {
    check_argument(t);
    check_order(m, MAX_ORDER);

    let mut ap = m as f64 + 0.5;

    if t == 0.0 {
        return 0.5 / ap;
    }

    if t > TMAX[m] as f64 {
        return fm_asymptotic(t, m);
    }

    let mut sum = 1.0 / ap / (2.0 * t.exp());
    let mut delta = sum;
    ap += 1.0;

    loop {
        delta *= t / ap;
        ap += 1.0;
        if delta.abs() / sum < SERIES_TOLERANCE {
            break;
        }
        sum += delta;
    }

    sum
}

/// Large-argument limit `F_m(T) = (2m - 1)!! / (2T)^m * sqrt(pi / T) / 2`.
///
/// The double factorial is accumulated in log space so high orders don't overflow.
///
/// # Panics
///
/// If `t` is not positive or `m > MAX_ORDER`.
pub fn fm_asymptotic(t: f64, m: usize) -> f64 {
    assert!(t > 0.0, "asymptotic Boys function needs a positive argument, got {t}");
    check_order(m, MAX_ORDER);

    let log_double_factorial = (3..2 * m).step_by(2).map(|i| (i as f64).ln()).sum::<f64>();
    let log_sum = -(m as f64) * (2.0 * t).ln() + log_double_factorial;

    log_sum.exp() * (std::f64::consts::PI / t).sqrt() / 2.0
}

/// F_m(T) tabulated on `T = k / 20`, `k = 0..=20 TMAX[m]`, for every order `m`.
///
/// The table is built once and read-only afterwards; share it by reference.
#[derive(Clone, Debug)]
pub struct BoysTable {
    /// row-major: `grid[k * (MAX_ORDER + 1) + m]`
    grid: Vec<f64>,
    rows: usize,
}

impl BoysTable {
    const COLUMNS: usize = MAX_ORDER + 1;

    /// Tabulates every order. Columns are independent; with the `rayon` feature each worker
    /// fills whole columns.
    pub fn new() -> Self {
        let rows = TMAX[MAX_ORDER] as usize * GRID_DENSITY as usize + 1;

        #[cfg(feature = "rayon")]
        let columns = {
            use rayon::iter::{IntoParallelIterator, ParallelIterator};

            (0..Self::COLUMNS)
                .into_par_iter()
                .map(tabulate_column)
                .collect::<Vec<_>>()
        };

        #[cfg(not(feature = "rayon"))]
        let columns = (0..Self::COLUMNS).map(tabulate_column).collect::<Vec<_>>();

        let mut grid = vec![0.0; rows * Self::COLUMNS];
        for (m, column) in columns.into_iter().enumerate() {
            for (k, value) in column.into_iter().enumerate() {
                grid[k * Self::COLUMNS + m] = value;
            }
        }

        log::debug!("tabulated the Boys function on {rows} grid points");

        Self { grid, rows }
    }

    /// Tabulated F_m(k / 20). Zero beyond `20 TMAX[m]`.
    #[inline(always)]
    pub fn get(&self, k: usize, m: usize) -> f64 {
        self.grid[k * Self::COLUMNS + m]
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// F_n(T) from an 8-term Taylor expansion around the nearest grid point `T_r`, using
    /// `dF_m/dT = -F_{m+1}`:
    ///
    ///   F_n(T) = sum_i F_{n+i}(T_r) (T_r - T)^i / i!
    ///
    /// # Panics
    ///
    /// If `n > MAX_RECURSIVE_ORDER` or `t` lies outside `[0, TMAX[n]]`.
    pub fn fm_taylor(&self, t: f64, n: usize) -> f64 {
        check_argument(t);
        check_order(n, MAX_RECURSIVE_ORDER);
        assert!(
            t <= TMAX[n] as f64,
            "F_{n}({t}) lies beyond the tabulated range"
        );

        let k = (t * GRID_DENSITY).round() as usize;
        let shift = k as f64 / GRID_DENSITY - t;

        let row = &self.grid[k * Self::COLUMNS..(k + 1) * Self::COLUMNS];

        let mut value = 0.0;
        let mut factor = 1.0;
        for (i, &derivative) in row[n..n + TAYLOR_ORDER].iter().enumerate() {
            value += derivative * factor;
            factor *= shift / (i + 1) as f64;
        }

        value
    }

    /// F_0(T) through F_n(T).
    ///
    /// See [`BoysTable::fm_recursive_into`].
    pub fn fm_recursive(&self, t: f64, n: usize) -> Vec<f64> {
        let mut values = vec![0.0; n + 1];
        self.fm_recursive_into(t, &mut values);
        values
    }

    /// Fills `values[0..=n]` with F_0(T)..F_n(T), `n = values.len() - 1`.
    ///
    /// F_n is seeded from the asymptotic expansion above `TMAX[n]` and from the table
    /// otherwise, then lower orders follow from
    ///
    ///   F_{i-1}(T) = (2T F_i(T) + e^-T) / (2i - 1)
    ///
    /// which is only stable downwards.
    ///
    /// # Panics
    ///
    /// If `values` is empty or longer than `MAX_RECURSIVE_ORDER + 1`, or `t` is negative.
    pub fn fm_recursive_into(&self, t: f64, values: &mut [f64]) {
        assert!(!values.is_empty(), "no Boys function order requested");
        let n = values.len() - 1;

        values[n] = self.seed(t, n);

        if n == 0 {
            return;
        }

        let exp_t = (-t).exp();
        for i in (1..=n).rev() {
            values[i - 1] = (2.0 * t * values[i] + exp_t) / (2 * i - 1) as f64;
        }
    }

    /// F_m(T) for a single order.
    ///
    /// Orders the table cannot interpolate fall back to [`fm`].
    pub fn value(&self, t: f64, m: usize) -> f64 {
        if m > MAX_RECURSIVE_ORDER {
            return fm(t, m);
        }
        self.seed(t, m)
    }

    #[inline(always)]
    fn seed(&self, t: f64, n: usize) -> f64 {
        check_argument(t);
        check_order(n, MAX_RECURSIVE_ORDER);

        if t > TMAX[n] as f64 {
            fm_asymptotic(t, n)
        } else {
            self.fm_taylor(t, n)
        }
    }
}

impl Default for BoysTable {
    fn default() -> Self {
        Self::new()
    }
}

fn tabulate_column(m: usize) -> Vec<f64> {
    (0..=TMAX[m] as usize * GRID_DENSITY as usize)
        .map(|k| fm(k as f64 / GRID_DENSITY, m))
        .collect()
}
