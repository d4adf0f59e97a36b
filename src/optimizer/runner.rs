use crate::cipher::Permutation;
use crate::config::Config;
use crate::optimizer::history::{Discovery, History};
use crate::optimizer::CipherBreaker;
use crate::scorer::BigramTable;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

pub struct SearchOptions {
    pub chains: usize,
    pub iterations: usize,
    pub restarts: usize,
    pub fanout: usize,
    pub top_n: usize,
    pub history_capacity: Option<usize>,
    pub log_interval: Option<usize>,
    pub max_time: Option<Duration>,
}

impl From<&Config> for SearchOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            chains: cfg.search.chains.max(1),
            iterations: cfg.search.iterations,
            restarts: cfg.search.restarts.max(1),
            fanout: cfg.search.fanout.max(1),
            top_n: cfg.search.top,
            history_capacity: cfg.search.history_capacity,
            log_interval: cfg.search.log_interval,
            max_time: cfg.search.max_time_secs.map(Duration::from_secs),
        }
    }
}

pub struct SearchResult {
    /// Highest-likelihood decoding across all chains.
    pub best: Discovery,
    pub best_cipher: Permutation,
    /// Top `top_n` decodings of the merged archive.
    pub candidates: Vec<Discovery>,
    pub history: History,
    pub iterations: usize,
    pub accepted: usize,
    pub elapsed: Duration,
}

/// Receives updates after every finished restart of every chain.
/// Returning false aborts all chains at their next iteration.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(
        &self,
        chain: usize,
        restart: usize,
        best_ll: f64,
        best_text: &str,
        ips: f64,
    ) -> bool;
}

/// Callback that only logs.
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_progress(
        &self,
        chain: usize,
        restart: usize,
        best_ll: f64,
        _best_text: &str,
        ips: f64,
    ) -> bool {
        info!(
            "Chain {} restart {} | best logL {:.2} | {:.1}k it/s",
            chain,
            restart + 1,
            best_ll,
            ips / 1000.0
        );
        true
    }
}

pub struct Optimizer {
    table: Arc<BigramTable>,
    options: SearchOptions,
}

impl Optimizer {
    pub fn new(table: Arc<BigramTable>, options: SearchOptions) -> Self {
        Self { table, options }
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Runs independent chains in parallel and merges their archives.
    /// Chain `i` is seeded with `seed + i` (wrapping) when a seed is given.
    pub fn run<CB: ProgressCallback>(
        &self,
        ciphered_text: &str,
        seed: Option<u64>,
        callback: CB,
    ) -> SearchResult {
        let opts = &self.options;
        let chains = opts.chains.max(1);
        let restarts = opts.restarts.max(1);
        let per_restart = opts.iterations / restarts;

        let start_time = Instant::now();
        let deadline = opts.max_time.map(|d| start_time + d);
        let abort = Arc::new(AtomicBool::new(false));
        let total_steps = AtomicUsize::new(0);

        info!(
            "Running {} chain(s) x {} restart(s) x {} iterations (fanout {})",
            chains, restarts, per_restart, opts.fanout
        );

        let breakers: Vec<CipherBreaker> = (0..chains)
            .into_par_iter()
            .map(|c| {
                let chain_seed = seed.map(|s| s.wrapping_add(c as u64));
                let mut breaker =
                    CipherBreaker::new(ciphered_text, self.table.clone(), chain_seed)
                        .with_history_capacity(opts.history_capacity)
                        .with_deadline(deadline)
                        .with_cancel(abort.clone())
                        .with_log_interval(opts.log_interval);

                for r in 0..restarts {
                    if breaker.should_stop() {
                        break;
                    }
                    let steps = breaker.run_restart(r, per_restart, opts.fanout);
                    let done = total_steps.fetch_add(steps, Ordering::Relaxed) + steps;

                    let secs = start_time.elapsed().as_secs_f64().max(1e-9);
                    let (best_ll, best_text) = match breaker.history().best(1).first() {
                        Some(d) => (d.log_likelihood, d.text.clone()),
                        None => (f64::NEG_INFINITY, String::new()),
                    };
                    if !callback.on_progress(c, r, best_ll, &best_text, done as f64 / secs) {
                        abort.store(true, Ordering::Relaxed);
                    }
                }
                breaker
            })
            .collect();

        let mut history = History::with_capacity_limit(opts.history_capacity);
        let mut best_cipher = Permutation::identity();
        let mut best_ll = f64::NEG_INFINITY;
        let mut iterations = 0;
        let mut accepted = 0;

        for b in &breakers {
            history.merge(b.history());
            iterations += b.iterations_run();
            accepted += b.accepted();
            let (cipher, ll) = b.best();
            if ll > best_ll {
                best_ll = ll;
                best_cipher = cipher;
            }
        }

        let candidates: Vec<Discovery> = history
            .best(opts.top_n.max(1))
            .into_iter()
            .cloned()
            .collect();

        // The seed entry guarantees a non-empty archive.
        let best = candidates.first().cloned().unwrap_or_else(|| Discovery {
            text: ciphered_text.to_string(),
            iteration: 0,
            log_likelihood: self.table.log_likelihood_str(ciphered_text),
            restart: 0,
        });

        let elapsed = start_time.elapsed();
        info!(
            "Search finished in {:.2}s: {} iterations, {} accepted, {} distinct decodings",
            elapsed.as_secs_f64(),
            iterations,
            accepted,
            history.len()
        );

        SearchResult {
            best,
            best_cipher,
            candidates,
            history,
            iterations,
            accepted,
            elapsed,
        }
    }
}
