pub mod history;
pub mod mutation;
pub mod runner;

use self::history::History;
use self::mutation::{acceptance_probability, propose_swap};
use crate::cipher::Permutation;
use crate::scorer::BigramTable;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub use self::runner::{Optimizer, ProgressCallback, SearchOptions, SearchResult};

/// Metropolis-Hastings walker over substitution keys.
///
/// Owns its key, archive and RNG; only the bigram table is shared. The
/// archive is seeded with the ciphertext itself at iteration 0, which is
/// what the identity key decodes to.
pub struct CipherBreaker {
    pub table: Arc<BigramTable>,
    pub rng: fastrand::Rng,

    ciphered_text: String,
    current_cipher: Permutation,
    current_ll: f64,
    best_cipher: Permutation,
    best_ll: f64,

    history: History,
    restart: usize,
    accepted: usize,
    iterations_run: usize,

    // Reused decode buffer for the serial step.
    scratch: Vec<u8>,

    deadline: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
    log_interval: Option<usize>,
}

impl CipherBreaker {
    pub fn new(ciphered_text: &str, table: Arc<BigramTable>, seed: Option<u64>) -> Self {
        let mut rng = if let Some(s) = seed {
            fastrand::Rng::with_seed(s)
        } else {
            fastrand::Rng::new()
        };

        let current_cipher = mutation::random_cipher(&mut rng);
        let mut scratch = Vec::with_capacity(ciphered_text.len());
        current_cipher.decode_into(ciphered_text.as_bytes(), &mut scratch);
        let current_ll = table.log_likelihood(&scratch);

        let seed_ll = table.log_likelihood(ciphered_text.as_bytes());
        let mut history = History::new();
        history.record(ciphered_text, 0, seed_ll, 0);

        Self {
            table,
            rng,
            ciphered_text: ciphered_text.to_string(),
            current_cipher,
            current_ll,
            best_cipher: Permutation::identity(),
            best_ll: seed_ll,
            history,
            restart: 0,
            accepted: 0,
            iterations_run: 0,
            scratch,
            deadline: None,
            cancel: None,
            log_interval: None,
        }
    }

    /// Bounds the archive; the ciphertext seed entry is never evicted.
    pub fn with_history_capacity(mut self, capacity: Option<usize>) -> Self {
        let mut history = History::with_capacity_limit(capacity);
        history.merge(&self.history);
        self.history = history;
        self
    }

    /// Wall-clock limit, checked between iterations.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Shared abort flag, checked between iterations.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Emit a debug line every `interval` accepted moves.
    pub fn with_log_interval(mut self, interval: Option<usize>) -> Self {
        self.log_interval = interval.filter(|&i| i > 0);
        self
    }

    pub fn ciphered_text(&self) -> &str {
        &self.ciphered_text
    }

    pub fn current_cipher(&self) -> &Permutation {
        &self.current_cipher
    }

    pub fn current_log_likelihood(&self) -> f64 {
        self.current_ll
    }

    pub fn current_plaintext(&self) -> String {
        self.current_cipher.decode(&self.ciphered_text)
    }

    /// Best key seen so far and the likelihood of its decoding.
    pub fn best(&self) -> (Permutation, f64) {
        (self.best_cipher, self.best_ll)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn into_history(self) -> History {
        self.history
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn iterations_run(&self) -> usize {
        self.iterations_run
    }

    pub fn should_stop(&self) -> bool {
        if let Some(d) = self.deadline {
            if Instant::now() >= d {
                return true;
            }
        }
        self.cancel
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    /// Replaces the current key with a fresh random one.
    pub fn restart_cipher(&mut self) {
        self.current_cipher = mutation::random_cipher(&mut self.rng);
        self.current_cipher
            .decode_into(self.ciphered_text.as_bytes(), &mut self.scratch);
        self.current_ll = self.table.log_likelihood(&self.scratch);
    }

    /// One Metropolis-Hastings step with a single swap proposal. Returns
    /// whether the proposal was accepted.
    pub fn step(&mut self, iteration: usize) -> bool {
        let proposed = propose_swap(&mut self.rng, &self.current_cipher);
        proposed.decode_into(self.ciphered_text.as_bytes(), &mut self.scratch);
        let proposed_ll = self.table.log_likelihood(&self.scratch);

        self.iterations_run += 1;
        let acceptance = acceptance_probability(proposed_ll, self.current_ll);
        if self.rng.f64() >= acceptance {
            return false;
        }

        self.accept(proposed, proposed_ll);
        let scratch = std::mem::take(&mut self.scratch);
        self.archive(&String::from_utf8_lossy(&scratch), iteration, proposed_ll);
        self.scratch = scratch;
        true
    }

    /// One step that scores `fanout` independent swap proposals in parallel
    /// and submits the best of them to the acceptance test.
    pub fn step_parallel(&mut self, iteration: usize, fanout: usize) -> bool {
        if fanout <= 1 {
            return self.step(iteration);
        }

        let seeds: Vec<u64> = (0..fanout).map(|_| self.rng.u64(..)).collect();
        let current = self.current_cipher;
        let table = &self.table;
        let cipher_bytes = self.ciphered_text.as_bytes();

        let best = seeds
            .par_iter()
            .enumerate()
            .map(|(idx, &s)| {
                let mut rng = fastrand::Rng::with_seed(s);
                let proposed = propose_swap(&mut rng, &current);
                let mut buf = Vec::with_capacity(cipher_bytes.len());
                proposed.decode_into(cipher_bytes, &mut buf);
                let ll = table.log_likelihood(&buf);
                (idx, proposed, buf, ll)
            })
            .reduce_with(|a, b| {
                // Highest likelihood wins; lower proposal index breaks ties.
                match b.3.total_cmp(&a.3) {
                    std::cmp::Ordering::Greater => b,
                    std::cmp::Ordering::Equal if b.0 < a.0 => b,
                    _ => a,
                }
            });

        self.iterations_run += 1;
        let Some((_, proposed, buf, proposed_ll)) = best else {
            return false;
        };

        let acceptance = acceptance_probability(proposed_ll, self.current_ll);
        if self.rng.f64() >= acceptance {
            return false;
        }

        self.accept(proposed, proposed_ll);
        let text = String::from_utf8_lossy(&buf);
        self.archive(&text, iteration, proposed_ll);
        true
    }

    fn accept(&mut self, proposed: Permutation, proposed_ll: f64) {
        self.current_cipher = proposed;
        self.current_ll = proposed_ll;
        self.accepted += 1;

        if proposed_ll > self.best_ll {
            self.best_ll = proposed_ll;
            self.best_cipher = proposed;
        }
    }

    fn archive(&mut self, text: &str, iteration: usize, log_likelihood: f64) {
        if let Some(every) = self.log_interval {
            if self.accepted % every == 0 {
                debug!(
                    "Accept #{} (restart {}, iter {}): {}",
                    self.accepted, self.restart, iteration, text
                );
            }
        }
        self.history
            .record(text, iteration, log_likelihood, self.restart);
    }

    /// Runs `iterations` steps from the current key. Returns the number of
    /// steps actually taken (fewer if stopped early).
    pub fn break_cipher(&mut self, iterations: usize) -> usize {
        self.run_walk(iterations, 1)
    }

    /// Parallel-proposal variant of `break_cipher`.
    pub fn break_cipher_parallel(&mut self, iterations: usize, fanout: usize) -> usize {
        self.run_walk(iterations, fanout)
    }

    /// Splits `iterations` evenly over `nstart` restarts, each from a fresh
    /// random key. The archive is shared across restarts.
    pub fn break_cipher_nstart(&mut self, iterations: usize, nstart: usize) -> usize {
        let nstart = nstart.max(1);
        let per_start = iterations / nstart;
        let mut total = 0;

        for s in 0..nstart {
            if self.should_stop() {
                break;
            }
            total += self.run_restart(s, per_start, 1);
        }
        total
    }

    /// Starts restart number `restart` from a fresh key and walks it.
    pub fn run_restart(&mut self, restart: usize, iterations: usize, fanout: usize) -> usize {
        self.restart = restart;
        self.restart_cipher();
        let taken = self.run_walk(iterations, fanout);
        info!(
            "Restart {} done: {} steps, logL {:.2} (best {:.2})",
            restart + 1,
            taken,
            self.current_ll,
            self.best_ll
        );
        taken
    }

    fn run_walk(&mut self, iterations: usize, fanout: usize) -> usize {
        for it in 0..iterations {
            if self.should_stop() {
                return it;
            }
            self.step_parallel(it, fanout);
        }
        iterations
    }

    /// Up to `n` archived decodings, highest likelihood first.
    pub fn extract_best(&self, n: usize) -> Vec<String> {
        self.history
            .best(n)
            .into_iter()
            .map(|d| d.text.clone())
            .collect()
    }

    pub fn extract_best_with_likelihood(&self, n: usize) -> Vec<(String, f64)> {
        self.history
            .best(n)
            .into_iter()
            .map(|d| (d.text.clone(), d.log_likelihood))
            .collect()
    }
}
