use super::forward_backward::{scaled_forward_backward, sequence_log_likelihood, validate_model};
use super::matrix::{argmax, StochasticMatrix};
use crate::error::{CfResult, CipherForgeError};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use tracing::{debug, info};

/// Structural prior on the space symbol, reapplied after every M-step.
///
/// `Row` pins the hidden space state to emit only the observed space.
/// `RowAndColumn` additionally forbids any other hidden state from emitting
/// the observed space, which holds when the cipher never substitutes space.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    EnumString,
    Display,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SpaceConstraint {
    None,
    Row,
    #[default]
    RowAndColumn,
}

impl SpaceConstraint {
    /// Applies the constraint in place, keeping every row stochastic.
    pub fn apply(self, b: &mut StochasticMatrix, space: usize) {
        let n = b.n_states();
        match self {
            SpaceConstraint::None => {}
            SpaceConstraint::Row => pin_space_row(b, space),
            SpaceConstraint::RowAndColumn => {
                for i in (0..n).filter(|&i| i != space) {
                    b.set(i, space, 0.0);
                    let row = b.row_mut(i);
                    let sum: f64 = row.iter().sum();
                    if sum > 0.0 {
                        row.iter_mut().for_each(|v| *v /= sum);
                    } else {
                        // Row emitted nothing but space; spread it over the letters.
                        let share = 1.0 / (n - 1) as f64;
                        row.iter_mut().for_each(|v| *v = share);
                        row[space] = 0.0;
                    }
                }
                pin_space_row(b, space);
            }
        }
    }

    /// True when `b` satisfies the constraint exactly.
    pub fn holds(self, b: &StochasticMatrix, space: usize) -> bool {
        let n = b.n_states();
        let row_ok = (0..n).all(|j| b.get(space, j) == if j == space { 1.0 } else { 0.0 });
        match self {
            SpaceConstraint::None => true,
            SpaceConstraint::Row => row_ok,
            SpaceConstraint::RowAndColumn => {
                row_ok && (0..n).filter(|&i| i != space).all(|i| b.get(i, space) == 0.0)
            }
        }
    }
}

fn pin_space_row(b: &mut StochasticMatrix, space: usize) {
    let row = b.row_mut(space);
    row.iter_mut().for_each(|v| *v = 0.0);
    row[space] = 1.0;
}

#[derive(Debug, Clone)]
pub struct BaumWelchOptions {
    pub max_iter: usize,
    pub tol: f64,
    pub space_constraint: SpaceConstraint,
    /// Index of the space symbol; required unless the constraint is `None`.
    pub space_index: Option<usize>,
}

impl Default for BaumWelchOptions {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tol: 1e-4,
            space_constraint: SpaceConstraint::default(),
            space_index: Some(26),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BaumWelchReport {
    pub emission: StochasticMatrix,
    /// Number of EM updates performed.
    pub iterations: usize,
    /// Iteration index at which the change first fell below `tol`.
    pub converged_at: Option<usize>,
    /// Largest per-cell change in the final update.
    pub max_change: f64,
    /// `ln P(observations)` under the returned `emission`.
    pub log_likelihood: f64,
}

impl BaumWelchReport {
    pub fn converged(&self) -> bool {
        self.converged_at.is_some()
    }
}

/// One M-step: expected fraction of time each hidden state is observed as
/// each symbol. Rows with no occupancy keep their previous values.
pub fn update_emission(
    gamma: &super::forward_backward::Posteriors,
    observed: &[usize],
    previous: &StochasticMatrix,
) -> StochasticMatrix {
    let n = previous.n_states();
    let mut counts = vec![0.0; n * n];
    let mut occupancy = vec![0.0; n];

    for (t, &o) in observed.iter().enumerate() {
        for (i, &g) in gamma.row(t).iter().enumerate() {
            counts[i * n + o] += g;
            occupancy[i] += g;
        }
    }

    let mut next = previous.clone();
    for (i, &occ) in occupancy.iter().enumerate() {
        if occ > 0.0 {
            let row = next.row_mut(i);
            for (j, v) in row.iter_mut().enumerate() {
                *v = counts[i * n + j] / occ;
            }
        }
    }
    next
}

/// Scaled Baum-Welch over the emission matrix with `a` held fixed.
///
/// A local hill-climb: restarts from other starting points are left to the
/// caller. Reaching `max_iter` is reported through `converged_at == None`,
/// not as an error.
pub fn baum_welch(
    a: &StochasticMatrix,
    b_start: &StochasticMatrix,
    pi: &[f64],
    observed: &[usize],
    opts: &BaumWelchOptions,
) -> CfResult<BaumWelchReport> {
    validate_model(a, b_start, pi, observed)?;

    let space = match (opts.space_constraint, opts.space_index) {
        (SpaceConstraint::None, _) => None,
        (_, Some(s)) if s < a.n_states() => Some(s),
        (c, s) => {
            return Err(CipherForgeError::Config(format!(
                "Space constraint '{}' needs a space index below {}, got {:?}",
                c,
                a.n_states(),
                s
            )))
        }
    };

    let mut b = b_start.clone();
    let mut report = BaumWelchReport {
        emission: b.clone(),
        iterations: 0,
        converged_at: None,
        max_change: f64::INFINITY,
        log_likelihood: f64::NEG_INFINITY,
    };

    for it in 0..opts.max_iter {
        let messages = scaled_forward_backward(a, &b, pi, observed)?;
        let gamma = messages.posteriors()?;

        let mut next = update_emission(&gamma, observed, &b);
        if let Some(s) = space {
            opts.space_constraint.apply(&mut next, s);
        }

        let max_change = next.max_abs_diff(&b);
        b = next;

        report.iterations = it + 1;
        report.max_change = max_change;

        debug!(
            "Baum-Welch iter {:4} | logL {:.4} | max change {:.3e}",
            it,
            messages.log_likelihood(),
            max_change
        );

        if max_change < opts.tol {
            info!("Baum-Welch converged after iteration {}", it);
            report.converged_at = Some(it);
            break;
        }
    }

    if report.converged_at.is_none() {
        info!(
            "Baum-Welch hit max_iter={} (last change {:.3e})",
            opts.max_iter, report.max_change
        );
    }

    report.log_likelihood = sequence_log_likelihood(a, &b, pi, observed)?;
    report.emission = b;
    Ok(report)
}

/// Most likely observed symbol for each hidden state (row argmax).
pub fn emission_to_mapping(b: &StochasticMatrix) -> Vec<usize> {
    (0..b.n_states()).map(|i| b.row_argmax(i)).collect()
}

/// Decodes each observation independently to the hidden state most likely
/// to have emitted it (column argmax).
pub fn decode_with_emission(b: &StochasticMatrix, observed: &[usize]) -> Vec<usize> {
    let n = b.n_states();
    let best: Vec<usize> = (0..n)
        .map(|j| {
            let column: Vec<f64> = (0..n).map(|i| b.get(i, j)).collect();
            argmax(&column)
        })
        .collect();
    observed.iter().map(|&o| best[o]).collect()
}
