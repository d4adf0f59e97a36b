use super::forward_backward::validate_model;
use super::matrix::{argmax, StochasticMatrix};
use crate::alphabet::Alphabet;
use crate::error::{CfResult, CipherForgeError};

/// Result of a Viterbi pass. `pmax` is flat `T x n_states`, `phi` is flat
/// `(T - 1) x n_states` (`phi[t][k]` is the best predecessor of state `k`
/// at step `t + 1`).
#[derive(Debug, Clone, PartialEq)]
pub struct ViterbiPath {
    pub states: Vec<usize>,
    pub log_score: f64,
    n_states: usize,
    pmax: Vec<f64>,
    phi: Vec<usize>,
}

impl ViterbiPath {
    pub fn pmax(&self, t: usize) -> &[f64] {
        &self.pmax[t * self.n_states..(t + 1) * self.n_states]
    }

    pub fn phi(&self, t: usize) -> &[usize] {
        &self.phi[t * self.n_states..(t + 1) * self.n_states]
    }

    pub fn decode_text(&self, alphabet: &Alphabet) -> String {
        alphabet.from_indices(&self.states)
    }
}

/// Log-domain factors: `f0[k] = ln pi[k] + ln B[k, o0]` and
/// `f[t][j, k] = ln A[j, k] + ln B[k, o(t+1)]`, flat `(T - 1) x n x n`.
pub fn log_factors(
    a: &StochasticMatrix,
    b: &StochasticMatrix,
    pi: &[f64],
    observed: &[usize],
) -> (Vec<f64>, Vec<f64>) {
    let n = a.n_states();
    let f0 = (0..n)
        .map(|k| pi[k].ln() + b.get(k, observed[0]).ln())
        .collect();

    let mut f = Vec::with_capacity(observed.len().saturating_sub(1) * n * n);
    for &o in &observed[1..] {
        for j in 0..n {
            for k in 0..n {
                f.push(a.get(j, k).ln() + b.get(k, o).ln());
            }
        }
    }
    (f0, f)
}

/// Most probable hidden-state sequence for `observed`, with the last row of
/// `a` as the initial distribution.
pub fn viterbi(
    a: &StochasticMatrix,
    b: &StochasticMatrix,
    observed: &[usize],
) -> CfResult<ViterbiPath> {
    let Some(last) = a.n_states().checked_sub(1) else {
        return Err(CipherForgeError::Validation(
            "Model must have at least one state".to_string(),
        ));
    };
    let pi = a.row(last).to_vec();
    viterbi_with_initial(a, b, &pi, observed)
}

/// Max-sum forward pass plus backtrace. Exact MAP path; ties go to the
/// lowest state index.
pub fn viterbi_with_initial(
    a: &StochasticMatrix,
    b: &StochasticMatrix,
    pi: &[f64],
    observed: &[usize],
) -> CfResult<ViterbiPath> {
    validate_model(a, b, pi, observed)?;

    let n = a.n_states();
    let t_len = observed.len();
    let (f0, f) = log_factors(a, b, pi, observed);

    let mut pmax = vec![f64::NEG_INFINITY; t_len * n];
    let mut phi = vec![0usize; (t_len - 1) * n];
    pmax[..n].copy_from_slice(&f0);

    for t in 1..t_len {
        let factor = &f[(t - 1) * n * n..t * n * n];
        for k in 0..n {
            let mut best = f64::NEG_INFINITY;
            let mut best_j = 0;
            for j in 0..n {
                let v = factor[j * n + k] + pmax[(t - 1) * n + j];
                if v > best {
                    best = v;
                    best_j = j;
                }
            }
            pmax[t * n + k] = best;
            phi[(t - 1) * n + k] = best_j;
        }
    }

    let last_row = &pmax[(t_len - 1) * n..];
    let mut current = argmax(last_row);
    let log_score = last_row[current];
    if log_score == f64::NEG_INFINITY {
        return Err(CipherForgeError::Numerical(
            "Every hidden path has zero probability".to_string(),
        ));
    }

    let mut states = vec![0usize; t_len];
    states[t_len - 1] = current;
    for t in (0..t_len - 1).rev() {
        current = phi[t * n + current];
        states[t] = current;
    }

    Ok(ViterbiPath {
        states,
        log_score,
        n_states: n,
        pmax,
        phi,
    })
}

/// Log-probability of the joint `(states, observed)` under the model.
pub fn path_log_score(
    a: &StochasticMatrix,
    b: &StochasticMatrix,
    pi: &[f64],
    states: &[usize],
    observed: &[usize],
) -> f64 {
    let mut score = pi[states[0]].ln() + b.get(states[0], observed[0]).ln();
    for t in 1..states.len() {
        score += a.get(states[t - 1], states[t]).ln() + b.get(states[t], observed[t]).ln();
    }
    score
}
