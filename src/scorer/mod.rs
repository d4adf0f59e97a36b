pub mod loader;

use self::loader::{count_bigrams, load_ngrams_file, BigramCounts};
use crate::alphabet::Alphabet;
use crate::corpus;
use crate::error::{CfResult, CipherForgeError};
use crate::hmm::StochasticMatrix;
use std::path::Path;
use tracing::info;

/// Bigram language model.
///
/// Probabilities are `count / total`; unseen pairs score the fallback
/// `1 / (distinct bigrams)`, fixed at construction. A dense 256x256 table of
/// log-probabilities backs the hot scoring loop.
#[derive(Debug, Clone)]
pub struct BigramTable {
    counts: BigramCounts,
    total: f64,
    fallback: f64,
    log_lut: Vec<f64>,
}

impl BigramTable {
    pub fn from_counts(counts: BigramCounts) -> CfResult<Self> {
        if counts.is_empty() {
            return Err(CipherForgeError::Validation(
                "Bigram table is empty".to_string(),
            ));
        }
        if let Some((pair, c)) = counts.iter().find(|(_, c)| !(c.is_finite() && **c > 0.0)) {
            return Err(CipherForgeError::Validation(format!(
                "Bigram {:?} has invalid count {}",
                String::from_utf8_lossy(pair),
                c
            )));
        }

        let total: f64 = counts.values().sum();
        let fallback = 1.0 / counts.len() as f64;

        let mut log_lut = vec![fallback.ln(); 256 * 256];
        for (pair, &c) in &counts {
            log_lut[lut_index(pair[0], pair[1])] = (c / total).ln();
        }

        Ok(Self {
            counts,
            total,
            fallback,
            log_lut,
        })
    }

    /// Counts bigrams of an already normalised text.
    pub fn from_text(text: &str) -> CfResult<Self> {
        Self::from_counts(count_bigrams(text))
    }

    /// Reads, normalises and counts a corpus file.
    pub fn from_corpus_file<P: AsRef<Path>>(path: P, alphabet: &Alphabet) -> CfResult<Self> {
        let text = corpus::load_corpus(path, alphabet)?;
        let table = Self::from_text(&text)?;
        info!(
            "Built bigram table: {} distinct pairs from {} characters",
            table.len(),
            text.len()
        );
        Ok(table)
    }

    pub fn from_ngrams_file<P: AsRef<Path>>(path: P, alphabet: &Alphabet) -> CfResult<Self> {
        Self::from_counts(load_ngrams_file(path, alphabet)?)
    }

    /// Number of distinct bigrams.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn counts(&self) -> &BigramCounts {
        &self.counts
    }

    pub fn fallback(&self) -> f64 {
        self.fallback
    }

    pub fn probability(&self, pair: [u8; 2]) -> f64 {
        match self.counts.get(&pair) {
            Some(c) => c / self.total,
            None => self.fallback,
        }
    }

    #[inline(always)]
    pub fn log_probability(&self, first: u8, second: u8) -> f64 {
        self.log_lut[lut_index(first, second)]
    }

    /// Sum of log-probabilities over every adjacent pair of `text`.
    #[inline]
    pub fn log_likelihood(&self, text: &[u8]) -> f64 {
        text.windows(2)
            .map(|w| self.log_probability(w[0], w[1]))
            .sum()
    }

    pub fn log_likelihood_str(&self, text: &str) -> f64 {
        self.log_likelihood(text.as_bytes())
    }

    /// Row-stochastic `A[i, j] = P(next = j | prev = i)` over `alphabet`.
    /// `smoothing` is added to every count so that no transition is
    /// impossible; with zero smoothing a symbol that never precedes another
    /// is a validation error.
    pub fn transition_matrix(
        &self,
        alphabet: &Alphabet,
        smoothing: f64,
    ) -> CfResult<StochasticMatrix> {
        if !(smoothing.is_finite() && smoothing >= 0.0) {
            return Err(CipherForgeError::Config(format!(
                "Smoothing must be a non-negative number, got {}",
                smoothing
            )));
        }

        let n = alphabet.len();
        let mut data = vec![smoothing; n * n];
        for (pair, &c) in &self.counts {
            if let (Some(i), Some(j)) = (alphabet.index_of(pair[0]), alphabet.index_of(pair[1])) {
                data[i * n + j] += c;
            }
        }

        for i in 0..n {
            if data[i * n..(i + 1) * n].iter().sum::<f64>() == 0.0 {
                return Err(CipherForgeError::Validation(format!(
                    "Symbol {:?} never precedes another symbol; raise smoothing",
                    alphabet.symbol(i) as char
                )));
            }
        }

        let mut a = StochasticMatrix::new(n, data)?;
        a.normalize_rows();
        Ok(a)
    }
}

/// Chain-start distribution: the row of the final symbol (space), i.e. the
/// distribution of word-initial symbols. Empty for an empty matrix.
pub fn initial_distribution(a: &StochasticMatrix) -> Vec<f64> {
    a.n_states()
        .checked_sub(1)
        .map(|last| a.row(last).to_vec())
        .unwrap_or_default()
}

#[inline(always)]
fn lut_index(first: u8, second: u8) -> usize {
    ((first as usize) << 8) | second as usize
}
