use crate::alphabet::LETTERS;
use crate::cipher::Permutation;
use fastrand::Rng;

/// Fresh uniformly random starting key.
pub fn random_cipher(rng: &mut Rng) -> Permutation {
    Permutation::random(rng)
}

/// Two distinct positions drawn uniformly from `0..len`.
#[inline(always)]
pub fn distinct_pair(rng: &mut Rng, len: usize) -> (usize, usize) {
    let i = rng.usize(0..len);
    let mut j = rng.usize(0..len - 1);
    if j >= i {
        j += 1;
    }
    (i, j)
}

/// Neighbour of `current` differing by one transposition.
pub fn propose_swap(rng: &mut Rng, current: &Permutation) -> Permutation {
    let (i, j) = distinct_pair(rng, LETTERS);
    current.swapped(i, j)
}

/// Metropolis acceptance `min(1, exp(proposed - current))`, clamped to
/// `[0, 1]`. NaN ratios are rejected.
#[inline(always)]
pub fn acceptance_probability(proposed_ll: f64, current_ll: f64) -> f64 {
    let delta = proposed_ll - current_ll;
    if delta.is_nan() {
        return 0.0;
    }
    if delta >= 0.0 {
        return 1.0;
    }
    delta.exp().clamp(0.0, 1.0)
}
