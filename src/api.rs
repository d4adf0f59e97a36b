use crate::alphabet::Alphabet;
use crate::cipher::Permutation;
use crate::config::{Config, EmissionInit};
use crate::corpus;
use crate::error::{CfResult, CipherForgeError};
use crate::hmm::{
    baum_welch, decode_with_emission, emission_to_mapping, viterbi, BaumWelchOptions,
    BaumWelchReport, SpaceConstraint, StochasticMatrix,
};
use crate::optimizer::{Optimizer, ProgressCallback, SearchOptions, SearchResult};
use crate::scorer::{initial_distribution, BigramTable};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Builds the language model from either a TSV n-gram file (`.tsv`) or a
/// plain-text corpus.
pub fn load_model<P: AsRef<Path>>(path: P, alphabet: &Alphabet) -> CfResult<BigramTable> {
    let path = path.as_ref();
    let is_tsv = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("tsv"));

    if is_tsv {
        BigramTable::from_ngrams_file(path, alphabet)
    } else {
        BigramTable::from_corpus_file(path, alphabet)
    }
}

/// Normalises ciphertext for the engines and applies the word limit.
pub fn prepare_ciphertext(raw: &str, alphabet: &Alphabet, config: &Config) -> CfResult<String> {
    let mut text = corpus::normalize(raw, alphabet);
    if let Some(n) = config.model.max_words {
        text = corpus::take_words(&text, n);
    }
    if text.is_empty() {
        return Err(CipherForgeError::Validation(
            "Ciphertext has no alphabet symbols".to_string(),
        ));
    }
    if text.len() != raw.trim().len() {
        warn!(
            "Ciphertext normalised from {} to {} bytes",
            raw.trim().len(),
            text.len()
        );
    }
    Ok(text)
}

/// Encrypts `plaintext` under a fresh random key.
pub fn encrypt(plaintext: &str, seed: Option<u64>) -> (Permutation, String) {
    let mut rng = match seed {
        Some(s) => fastrand::Rng::with_seed(s),
        None => fastrand::Rng::new(),
    };
    let key = Permutation::random(&mut rng);
    let encoded = key.encode(plaintext);
    (key, encoded)
}

/// Service: Metropolis-Hastings search over substitution keys.
pub fn crack_with_mcmc<CB: ProgressCallback>(
    ciphertext: &str,
    table: Arc<BigramTable>,
    config: &Config,
    seed: Option<u64>,
    callback: CB,
) -> CfResult<SearchResult> {
    config.validate()?;
    let alphabet = Alphabet::english();
    let text = prepare_ciphertext(ciphertext, &alphabet, config)?;

    let optimizer = Optimizer::new(table, SearchOptions::from(config));
    Ok(optimizer.run(&text, seed, callback))
}

#[derive(Debug, Clone)]
pub struct HmmOutcome {
    /// Viterbi decoding under the learned emission matrix.
    pub plaintext: String,
    /// Per-symbol decoding by emission column argmax.
    pub symbolwise: String,
    /// `(hidden, observed)` pairs from the emission row argmax.
    pub mapping: Vec<(char, char)>,
    pub viterbi_log_score: f64,
    /// Log-likelihood of the ciphertext under the learned emission matrix.
    pub em_log_likelihood: f64,
    pub iterations: usize,
    pub converged_at: Option<usize>,
    pub emission: StochasticMatrix,
}

fn starting_emission(
    init: EmissionInit,
    n: usize,
    rng: &mut fastrand::Rng,
    constraint: SpaceConstraint,
    space: Option<usize>,
) -> StochasticMatrix {
    let mut b = match init {
        EmissionInit::Random => StochasticMatrix::random(n, rng),
        EmissionInit::Uniform => StochasticMatrix::uniform(n),
        EmissionInit::Identity => StochasticMatrix::identity(n),
    };
    if let Some(s) = space {
        constraint.apply(&mut b, s);
    }
    b
}

/// Service: learns the emission matrix with Baum-Welch (best of
/// `em_restarts` starts) and decodes with Viterbi.
pub fn crack_with_hmm(
    ciphertext: &str,
    table: &BigramTable,
    config: &Config,
    seed: Option<u64>,
) -> CfResult<HmmOutcome> {
    config.validate()?;
    let alphabet = Alphabet::english();
    let text = prepare_ciphertext(ciphertext, &alphabet, config)?;
    let observed = alphabet.to_indices(&text)?;

    let a = table.transition_matrix(&alphabet, config.model.smoothing)?;
    let pi = initial_distribution(&a);
    let n = alphabet.len();

    let opts = BaumWelchOptions {
        max_iter: config.hmm.max_iter,
        tol: config.hmm.tol,
        space_constraint: config.hmm.space_constraint,
        space_index: alphabet.space_index(),
    };

    let mut rng = match seed {
        Some(s) => fastrand::Rng::with_seed(s),
        None => fastrand::Rng::new(),
    };

    let mut best: Option<BaumWelchReport> = None;
    for r in 0..config.hmm.em_restarts.max(1) {
        let b_start = starting_emission(
            config.hmm.emission_init,
            n,
            &mut rng,
            opts.space_constraint,
            opts.space_index,
        );
        let report = baum_welch(&a, &b_start, &pi, &observed, &opts)?;
        info!(
            "EM start {}: logL {:.3} after {} iterations",
            r + 1,
            report.log_likelihood,
            report.iterations
        );
        if best
            .as_ref()
            .map_or(true, |b| report.log_likelihood > b.log_likelihood)
        {
            best = Some(report);
        }
    }

    let report = best.ok_or_else(|| {
        CipherForgeError::Numerical("Baum-Welch produced no estimate".to_string())
    })?;

    let path = viterbi(&a, &report.emission, &observed)?;
    let symbolwise = alphabet.from_indices(&decode_with_emission(&report.emission, &observed));
    let mapping = emission_to_mapping(&report.emission)
        .into_iter()
        .enumerate()
        .map(|(hidden, observed)| {
            (
                alphabet.symbol(hidden) as char,
                alphabet.symbol(observed) as char,
            )
        })
        .collect();

    Ok(HmmOutcome {
        plaintext: path.decode_text(&alphabet),
        symbolwise,
        mapping,
        viterbi_log_score: path.log_score,
        em_log_likelihood: report.log_likelihood,
        iterations: report.iterations,
        converged_at: report.converged_at,
        emission: report.emission,
    })
}
