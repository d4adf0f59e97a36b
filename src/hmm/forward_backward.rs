use super::matrix::{StochasticMatrix, ROW_SUM_TOLERANCE};
use crate::error::{CfResult, CipherForgeError};

/// Output of the scaled forward-backward pass.
///
/// `alpha_hat` and `beta_hat` are stored flat (`t * n_states + state`).
/// `alpha_hat` holds `T` rows, `beta_hat` holds `T - 1` rows since no
/// backward message exists past the last observation.
#[derive(Debug, Clone)]
pub struct ScaledMessages {
    n_states: usize,
    alpha_hat: Vec<f64>,
    beta_hat: Vec<f64>,
    scales: Vec<f64>,
}

impl ScaledMessages {
    pub fn n_states(&self) -> usize {
        self.n_states
    }

    /// Number of timesteps `T`.
    pub fn len(&self) -> usize {
        self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    pub fn alpha_hat(&self, t: usize) -> &[f64] {
        &self.alpha_hat[t * self.n_states..(t + 1) * self.n_states]
    }

    /// Valid for `t < T - 1`.
    pub fn beta_hat(&self, t: usize) -> &[f64] {
        &self.beta_hat[t * self.n_states..(t + 1) * self.n_states]
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    /// `ln P(observations)`, recovered from the scale factors.
    pub fn log_likelihood(&self) -> f64 {
        self.scales.iter().map(|c| c.ln()).sum()
    }

    /// Rebuilds the unscaled forward values `alpha_hat[t] * prod(c[0..=t])`.
    /// Underflows for long chains; meant for verification on short ones.
    pub fn unscaled_alpha(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.alpha_hat.len());
        let mut prod = 1.0;
        for t in 0..self.len() {
            prod *= self.scales[t];
            out.extend(self.alpha_hat(t).iter().map(|v| v * prod));
        }
        out
    }

    /// Posterior state occupancy `gamma[t, i]`, one normalised row per step.
    pub fn posteriors(&self) -> CfResult<Posteriors> {
        let n = self.n_states;
        let t_len = self.len();
        let mut gamma = vec![0.0; t_len * n];

        for t in 0..t_len.saturating_sub(1) {
            let row = &mut gamma[t * n..(t + 1) * n];
            for (i, g) in row.iter_mut().enumerate() {
                *g = self.alpha_hat[t * n + i] * self.beta_hat[t * n + i];
            }
            normalize_in_place(row, t)?;
        }

        let last = t_len - 1;
        let row = &mut gamma[last * n..];
        row.copy_from_slice(self.alpha_hat(last));
        normalize_in_place(row, last)?;

        Ok(Posteriors { n_states: n, gamma })
    }
}

/// Posterior state occupancies, flat `T x n_states`.
#[derive(Debug, Clone)]
pub struct Posteriors {
    n_states: usize,
    gamma: Vec<f64>,
}

impl Posteriors {
    pub fn len(&self) -> usize {
        self.gamma.len() / self.n_states
    }

    pub fn is_empty(&self) -> bool {
        self.gamma.is_empty()
    }

    pub fn row(&self, t: usize) -> &[f64] {
        &self.gamma[t * self.n_states..(t + 1) * self.n_states]
    }

    pub fn get(&self, t: usize, i: usize) -> f64 {
        self.gamma[t * self.n_states + i]
    }
}

fn normalize_in_place(row: &mut [f64], t: usize) -> CfResult<f64> {
    let sum: f64 = row.iter().sum();
    if !(sum > 0.0 && sum.is_finite()) {
        return Err(CipherForgeError::Numerical(format!(
            "Message at step {} has mass {}; observations are impossible under the model",
            t, sum
        )));
    }
    row.iter_mut().for_each(|v| *v /= sum);
    Ok(sum)
}

/// Checks shapes, stochasticity and observation range before any pass runs.
pub fn validate_model(
    a: &StochasticMatrix,
    b: &StochasticMatrix,
    pi: &[f64],
    observed: &[usize],
) -> CfResult<()> {
    let n = a.n_states();
    if n == 0 {
        return Err(CipherForgeError::Validation(
            "Model must have at least one state".to_string(),
        ));
    }
    if b.n_states() != n {
        return Err(CipherForgeError::Validation(format!(
            "Transition matrix has {} states but emission matrix has {}",
            n,
            b.n_states()
        )));
    }
    if pi.len() != n {
        return Err(CipherForgeError::Validation(format!(
            "Initial distribution has {} entries, expected {}",
            pi.len(),
            n
        )));
    }
    if observed.is_empty() {
        return Err(CipherForgeError::Validation(
            "Observation sequence is empty".to_string(),
        ));
    }
    if let Some((t, &o)) = observed.iter().enumerate().find(|(_, &o)| o >= n) {
        return Err(CipherForgeError::Validation(format!(
            "Observation {} at step {} is outside [0, {})",
            o, t, n
        )));
    }

    a.validate_stochastic("Transition matrix", ROW_SUM_TOLERANCE)?;
    b.validate_stochastic("Emission matrix", ROW_SUM_TOLERANCE)?;

    if pi.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(CipherForgeError::Validation(
            "Initial distribution holds an invalid probability".to_string(),
        ));
    }
    let pi_sum: f64 = pi.iter().sum();
    if (pi_sum - 1.0).abs() > ROW_SUM_TOLERANCE {
        return Err(CipherForgeError::Validation(format!(
            "Initial distribution sums to {:.6}, expected 1",
            pi_sum
        )));
    }
    Ok(())
}

/// Scaled forward recursion. Returns `(alpha_hat, c)` with `alpha_hat`
/// flat `T x n_states`.
pub fn forward(
    a: &StochasticMatrix,
    b: &StochasticMatrix,
    pi: &[f64],
    observed: &[usize],
) -> CfResult<(Vec<f64>, Vec<f64>)> {
    validate_model(a, b, pi, observed)?;
    forward_unchecked(a, b, pi, observed)
}

/// `ln P(observations)` from a forward pass alone.
pub fn sequence_log_likelihood(
    a: &StochasticMatrix,
    b: &StochasticMatrix,
    pi: &[f64],
    observed: &[usize],
) -> CfResult<f64> {
    let (_, scales) = forward(a, b, pi, observed)?;
    Ok(scales.iter().map(|c| c.ln()).sum())
}

fn forward_unchecked(
    a: &StochasticMatrix,
    b: &StochasticMatrix,
    pi: &[f64],
    observed: &[usize],
) -> CfResult<(Vec<f64>, Vec<f64>)> {
    let n = a.n_states();
    let t_len = observed.len();
    let mut alpha_hat = vec![0.0; t_len * n];
    let mut scales = vec![0.0; t_len];

    for j in 0..n {
        alpha_hat[j] = pi[j] * b.get(j, observed[0]);
    }
    scales[0] = normalize_in_place(&mut alpha_hat[..n], 0)?;

    for t in 1..t_len {
        let (done, rest) = alpha_hat.split_at_mut(t * n);
        let prev = &done[(t - 1) * n..];
        let cur = &mut rest[..n];
        let o = observed[t];

        for (j, slot) in cur.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (k, &p) in prev.iter().enumerate() {
                acc += a.get(k, j) * p;
            }
            *slot = acc * b.get(j, o);
        }
        scales[t] = normalize_in_place(cur, t)?;
    }

    Ok((alpha_hat, scales))
}

/// Scaled backward recursion using the forward scale factors. Returns
/// `beta_hat` flat `(T - 1) x n_states`; empty when `T == 1`.
pub fn backward(
    a: &StochasticMatrix,
    b: &StochasticMatrix,
    observed: &[usize],
    scales: &[f64],
) -> CfResult<Vec<f64>> {
    if scales.len() != observed.len() {
        return Err(CipherForgeError::Validation(format!(
            "Got {} scale factors for {} observations",
            scales.len(),
            observed.len()
        )));
    }
    if let Some(c) = scales.iter().find(|c| !(**c > 0.0 && c.is_finite())) {
        return Err(CipherForgeError::Numerical(format!(
            "Scale factor {} cannot be divided out",
            c
        )));
    }

    let n = a.n_states();
    let t_len = observed.len();
    if t_len < 2 {
        return Ok(Vec::new());
    }

    let mut beta_hat = vec![0.0; (t_len - 1) * n];

    let last = t_len - 2;
    let o = observed[t_len - 1];
    for j in 0..n {
        let mut acc = 0.0;
        for k in 0..n {
            acc += a.get(j, k) * b.get(k, o);
        }
        beta_hat[last * n + j] = acc / scales[t_len - 1];
    }

    for t in (0..last).rev() {
        let (head, tail) = beta_hat.split_at_mut((t + 1) * n);
        let next = &tail[..n];
        let cur = &mut head[t * n..];
        let o = observed[t + 1];
        let c = scales[t + 1];

        for (j, slot) in cur.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (k, &bk) in next.iter().enumerate() {
                acc += a.get(j, k) * b.get(k, o) * bk;
            }
            *slot = acc / c;
        }
    }

    Ok(beta_hat)
}

/// Full scaled forward-backward pass.
pub fn scaled_forward_backward(
    a: &StochasticMatrix,
    b: &StochasticMatrix,
    pi: &[f64],
    observed: &[usize],
) -> CfResult<ScaledMessages> {
    validate_model(a, b, pi, observed)?;
    let (alpha_hat, scales) = forward_unchecked(a, b, pi, observed)?;
    let beta_hat = backward(a, b, observed, &scales)?;

    Ok(ScaledMessages {
        n_states: a.n_states(),
        alpha_hat,
        beta_hat,
        scales,
    })
}

/// Unscaled forward recursion, flat `T x n_states`. Underflows on long
/// sequences.
pub fn naive_forward(
    a: &StochasticMatrix,
    b: &StochasticMatrix,
    pi: &[f64],
    observed: &[usize],
) -> CfResult<Vec<f64>> {
    validate_model(a, b, pi, observed)?;

    let n = a.n_states();
    let mut alpha = vec![0.0; observed.len() * n];
    for j in 0..n {
        alpha[j] = pi[j] * b.get(j, observed[0]);
    }
    for t in 1..observed.len() {
        for j in 0..n {
            let mut acc = 0.0;
            for k in 0..n {
                acc += a.get(k, j) * b.get(j, observed[t]) * alpha[(t - 1) * n + k];
            }
            alpha[t * n + j] = acc;
        }
    }
    Ok(alpha)
}
