//! Accuracy measurements for recovered plaintexts and keys.

use crate::cipher::Permutation;
use crate::corpus;
use crate::optimizer::CipherBreaker;
use crate::scorer::BigramTable;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::info;

/// Share of matching characters between `a` and `b`, spaces ignored:
/// `2 * LCS / (len(a) + len(b))`. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().filter(|&c| c != ' ').collect();
    let b: Vec<char> = b.chars().filter(|&c| c != ' ').collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in &a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    2.0 * prev[b.len()] as f64 / total as f64
}

/// Position-wise fraction of equal characters, over the longer length.
pub fn char_accuracy(truth: &str, decoded: &str) -> f64 {
    let longest = truth.chars().count().max(decoded.chars().count());
    if longest == 0 {
        return 1.0;
    }
    let hits = truth
        .chars()
        .zip(decoded.chars())
        .filter(|(a, b)| a == b)
        .count();
    hits as f64 / longest as f64
}

/// Fraction of the letters used by `plaintext` whose cipher letter `found`
/// gets right. Letters absent from the text cannot be recovered and are
/// not counted.
pub fn key_accuracy(truth: &Permutation, found: &Permutation, plaintext: &str) -> f64 {
    let mut used = [false; 26];
    for b in plaintext.bytes().filter(u8::is_ascii_alphabetic) {
        used[(b.to_ascii_lowercase() - b'a') as usize] = true;
    }

    let letters: Vec<usize> = (0..26).filter(|&i| used[i]).collect();
    if letters.is_empty() {
        return 1.0;
    }
    let hits = letters
        .iter()
        .filter(|&&i| truth.cipher_of(i) == found.cipher_of(i))
        .count();
    hits as f64 / letters.len() as f64
}

/// Best similarity between `truth` and any of `candidates`.
pub fn best_candidate_accuracy<S: AsRef<str>>(truth: &str, candidates: &[S]) -> f64 {
    candidates
        .iter()
        .map(|c| similarity(truth, c.as_ref()))
        .fold(0.0, f64::max)
}

/// Prefixes of `text` holding the requested numbers of words.
pub fn prepare_subtexts(text: &str, lengths: &[usize]) -> Vec<String> {
    lengths.iter().map(|&n| corpus::take_words(text, n)).collect()
}

#[derive(Debug, Clone)]
pub struct TrialOptions {
    pub trials: usize,
    pub iterations: usize,
    pub restarts: usize,
    pub top_n: usize,
}

impl Default for TrialOptions {
    fn default() -> Self {
        Self {
            trials: 3,
            iterations: 10_000,
            restarts: 3,
            top_n: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LengthAccuracy {
    pub words: usize,
    /// Mean best-of-top-n similarity of the decoded text.
    pub mean_accuracy: f64,
    /// Mean share of the used letters whose key entry was recovered.
    pub mean_key_accuracy: f64,
}

/// For every subtext, encrypts it under `trials` random keys, breaks each
/// ciphertext and averages the best-of-top-n similarity and the key
/// accuracy of the best key found.
pub fn accuracy_by_length(
    subtexts: &[String],
    table: Arc<BigramTable>,
    opts: &TrialOptions,
    seed: Option<u64>,
) -> Vec<LengthAccuracy> {
    let trials = opts.trials.max(1);

    subtexts
        .iter()
        .enumerate()
        .map(|(s_idx, subtext)| {
            let (text_total, key_total) = (0..trials)
                .into_par_iter()
                .map(|trial| {
                    let offset = (s_idx * trials + trial) as u64;
                    let trial_seed = seed.map(|s| s.wrapping_add(offset));
                    let mut rng = match trial_seed {
                        Some(s) => fastrand::Rng::with_seed(s),
                        None => fastrand::Rng::new(),
                    };
                    let key = Permutation::random(&mut rng);
                    let encoded = key.encode(subtext);

                    let mut breaker =
                        CipherBreaker::new(&encoded, table.clone(), trial_seed.map(|s| s ^ 0x5eed));
                    breaker.break_cipher_nstart(opts.iterations, opts.restarts);
                    let (found, _) = breaker.best();
                    (
                        best_candidate_accuracy(subtext, &breaker.extract_best(opts.top_n)),
                        key_accuracy(&key, &found, subtext),
                    )
                })
                .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));

            let words = subtext.split_whitespace().count();
            let mean_accuracy = text_total / trials as f64;
            let mean_key_accuracy = key_total / trials as f64;
            info!(
                "{} words: mean accuracy {:.3}, key accuracy {:.3}",
                words, mean_accuracy, mean_key_accuracy
            );
            LengthAccuracy {
                words,
                mean_accuracy,
                mean_key_accuracy,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_ignores_spaces() {
        assert_eq!(similarity("ab cd", "abcd"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abcd", "wxyz"), 0.0);
        assert!((similarity("abcd", "abxd") - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_key_accuracy_counts_used_letters_only() {
        let truth = Permutation::identity();
        let found = Permutation::identity().swapped(0, 25);
        // 'a' wrong, 'b' right; 'z' unused.
        assert_eq!(key_accuracy(&truth, &found, "ab"), 0.5);
        assert_eq!(key_accuracy(&truth, &found, "bcd"), 1.0);
    }

    #[test]
    fn test_accuracy_by_length_accepts_largest_seed() {
        let source = "the cat sat on the mat and the dog sat on the log";
        let table = Arc::new(BigramTable::from_text(source).unwrap());
        let subtexts = prepare_subtexts(source, &[4, 8]);
        let opts = TrialOptions {
            trials: 2,
            iterations: 200,
            restarts: 2,
            top_n: 3,
        };

        let results = accuracy_by_length(&subtexts, table.clone(), &opts, Some(u64::MAX));
        let again = accuracy_by_length(&subtexts, table, &opts, Some(u64::MAX));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].words, 4);
        for (r, a) in results.iter().zip(&again) {
            assert!((0.0..=1.0).contains(&r.mean_accuracy));
            assert!((0.0..=1.0).contains(&r.mean_key_accuracy));
            assert_eq!(r.mean_accuracy, a.mean_accuracy);
            assert_eq!(r.mean_key_accuracy, a.mean_key_accuracy);
        }
    }
}
