use crate::error::{CfResult, CipherForgeError};

/// Tolerance used when checking that rows sum to one.
pub const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// Dense square matrix stored row-major in a flat vector.
///
/// Used for both the transition matrix `A` (fixed, from the language model)
/// and the emission matrix `B` (learned).
#[derive(Debug, Clone, PartialEq)]
pub struct StochasticMatrix {
    n: usize,
    data: Vec<f64>,
}

impl StochasticMatrix {
    pub fn new(n: usize, data: Vec<f64>) -> CfResult<Self> {
        if n == 0 {
            return Err(CipherForgeError::Validation(
                "Matrix must have at least one state".to_string(),
            ));
        }
        if data.len() != n * n {
            return Err(CipherForgeError::Validation(format!(
                "Matrix is not square: expected {} entries for {} states, got {}",
                n * n,
                n,
                data.len()
            )));
        }
        Ok(Self { n, data })
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> CfResult<Self> {
        let n = rows.len();
        if let Some((i, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(CipherForgeError::Validation(format!(
                "Matrix is not square: row {} has {} entries, expected {}",
                i,
                r.len(),
                n
            )));
        }
        Self::new(n, rows.concat())
    }

    /// The shortcut constructors accept `n == 0` and build an empty matrix;
    /// every engine rejects it through model validation.
    pub fn identity(n: usize) -> Self {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self { n, data }
    }

    pub fn uniform(n: usize) -> Self {
        Self {
            n,
            data: vec![1.0 / n as f64; n * n],
        }
    }

    /// Row-stochastic matrix with entries drawn uniformly then normalised.
    pub fn random(n: usize, rng: &mut fastrand::Rng) -> Self {
        let data = (0..n * n).map(|_| rng.f64() + f64::EPSILON).collect();
        let mut m = Self { n, data };
        m.normalize_rows();
        m
    }

    #[inline(always)]
    pub fn n_states(&self) -> usize {
        self.n
    }

    #[inline(always)]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    #[inline(always)]
    pub fn set(&mut self, i: usize, j: usize, v: f64) {
        self.data[i * self.n + j] = v;
    }

    #[inline(always)]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.n..(i + 1) * self.n]
    }

    /// Rejects negative or non-finite entries and rows that do not sum to
    /// one within `tol`. A zero row is always an error.
    pub fn validate_stochastic(&self, name: &str, tol: f64) -> CfResult<()> {
        for i in 0..self.n {
            let row = self.row(i);
            if let Some(&bad) = row.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(CipherForgeError::Validation(format!(
                    "{} row {} holds invalid probability {}",
                    name, i, bad
                )));
            }
            let sum: f64 = row.iter().sum();
            if sum == 0.0 {
                return Err(CipherForgeError::Validation(format!(
                    "{} row {} sums to zero",
                    name, i
                )));
            }
            if (sum - 1.0).abs() > tol {
                return Err(CipherForgeError::Validation(format!(
                    "{} row {} sums to {:.6}, expected 1",
                    name, i, sum
                )));
            }
        }
        Ok(())
    }

    /// Divides each row by its sum. Zero rows are left untouched.
    pub fn normalize_rows(&mut self) {
        let n = self.n;
        if n == 0 {
            return;
        }
        for row in self.data.chunks_mut(n) {
            let sum: f64 = row.iter().sum();
            if sum > 0.0 {
                row.iter_mut().for_each(|v| *v /= sum);
            }
        }
    }

    pub fn max_abs_diff(&self, other: &StochasticMatrix) -> f64 {
        self.data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    /// Index of the largest entry in row `i` (first on ties).
    pub fn row_argmax(&self, i: usize) -> usize {
        argmax(self.row(i))
    }
}

/// First index attaining the maximum. NaN entries never win.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    let mut best_val = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = i;
        }
    }
    best
}
