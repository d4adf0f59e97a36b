use cipherforge::alphabet::Alphabet;
use cipherforge::cipher::Permutation;
use cipherforge::corpus;
use cipherforge::optimizer::mutation::propose_swap;
use cipherforge::optimizer::runner::{LogProgress, ProgressCallback};
use cipherforge::optimizer::{CipherBreaker, Optimizer, SearchOptions};
use cipherforge::scorer::BigramTable;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TOY_CORPUS: &str = "\
The army gathered at the edge of the forest and waited for the signal. \
At dawn the general gave the order to attack and the soldiers marched \
toward the castle. They had trained for this moment through the long \
winter, and every man knew what was at stake. The attack began at the \
break of day, when the light was still grey and the guards on the walls \
were tired after the watch of the night. It was a hard and bitter fight \
but by the evening the castle had fallen and the banners of the king \
were raised above the gate. That night the men sat around the fires and \
told stories of the battle, of the friends they had lost and of the \
home they would return to when the war was over.";

fn toy_table() -> Arc<BigramTable> {
    let text = corpus::normalize(TOY_CORPUS, &Alphabet::english());
    Arc::new(BigramTable::from_text(&text).unwrap())
}

fn encrypt(plain: &str, seed: u64) -> String {
    let key = Permutation::random(&mut fastrand::Rng::with_seed(seed));
    key.encode(plain)
}

// --- CipherBreaker ---

#[test]
fn test_new_breaker_archives_ciphertext_at_iteration_zero() {
    let table = toy_table();
    let cipher = encrypt("attack at dawn", 1);
    let breaker = CipherBreaker::new(&cipher, table.clone(), Some(3));

    let seed = breaker.history().get(&cipher).expect("ciphertext archived");
    assert_eq!(seed.iteration, 0);
    assert_eq!(seed.log_likelihood, table.log_likelihood_str(&cipher));
    assert_eq!(breaker.history().len(), 1);
    assert_eq!(breaker.accepted(), 0);
}

#[test]
fn test_attack_at_dawn_beats_ciphertext_likelihood() {
    let table = toy_table();
    let cipher = encrypt("attack at dawn", 2024);
    let mut breaker = CipherBreaker::new(&cipher, table.clone(), Some(7));

    breaker.break_cipher(2000);

    let best = breaker.extract_best_with_likelihood(1);
    assert_eq!(best.len(), 1);
    let cipher_ll = table.log_likelihood_str(&cipher);
    assert!(
        best[0].1 > cipher_ll,
        "best {:.3} should beat ciphertext {:.3}",
        best[0].1,
        cipher_ll
    );
    assert_eq!(best[0].0.len(), cipher.len());
}

#[test]
fn test_extract_best_is_bounded_and_sorted() {
    let table = toy_table();
    let cipher = encrypt("the soldiers marched toward the castle at dawn", 5);
    let mut breaker = CipherBreaker::new(&cipher, table, Some(11));
    breaker.break_cipher(1500);

    for n in [0, 1, 5, 50] {
        let best = breaker.extract_best_with_likelihood(n);
        assert!(best.len() <= n);
        assert_eq!(best.len(), n.min(breaker.history().len()));
        for w in best.windows(2) {
            assert!(w[0].1 >= w[1].1);
        }
    }
    assert!(breaker.history().contains(&cipher));
}

#[test]
fn test_same_seed_same_history() {
    let table = toy_table();
    let cipher = encrypt("they had trained for this moment", 9);

    let run = || {
        let mut b = CipherBreaker::new(&cipher, table.clone(), Some(42));
        b.break_cipher_nstart(900, 3);
        (b.extract_best(10), b.accepted(), *b.current_cipher())
    };
    assert_eq!(run(), run());
}

#[test]
fn test_nstart_splits_budget_evenly() {
    let table = toy_table();
    let cipher = encrypt("the guards on the walls were tired", 4);
    let mut breaker = CipherBreaker::new(&cipher, table, Some(1));

    let steps = breaker.break_cipher_nstart(1000, 3);
    assert_eq!(steps, 999);
    assert_eq!(breaker.iterations_run(), 999);
    assert!(breaker.history().iter().all(|d| d.restart < 3));
}

#[test]
fn test_current_plaintext_follows_current_cipher() {
    let table = toy_table();
    let cipher = encrypt("banners of the king", 8);
    let mut breaker = CipherBreaker::new(&cipher, table.clone(), Some(8));
    breaker.break_cipher(300);

    let plain = breaker.current_plaintext();
    assert_eq!(plain, breaker.current_cipher().decode(&cipher));
    assert!((breaker.current_log_likelihood() - table.log_likelihood_str(&plain)).abs() < 1e-9);
}

#[test]
fn test_history_capacity_keeps_seed() {
    let table = toy_table();
    let cipher = encrypt("told stories of the battle and of the friends they had lost", 6);
    let mut breaker = CipherBreaker::new(&cipher, table, Some(2)).with_history_capacity(Some(8));
    breaker.break_cipher(3000);

    assert!(breaker.history().len() <= 8);
    assert!(breaker.history().contains(&cipher));
}

#[test]
fn test_parallel_fanout_is_reproducible() {
    let table = toy_table();
    let cipher = encrypt("it was a hard and bitter fight", 12);

    let run = || {
        let mut b = CipherBreaker::new(&cipher, table.clone(), Some(5));
        b.break_cipher_parallel(200, 4);
        (b.extract_best(5), b.iterations_run())
    };
    let (first, steps) = run();
    assert_eq!(steps, 200);
    assert_eq!(first, run().0);
}

#[test]
fn test_parallel_step_submits_most_likely_proposal() {
    let table = toy_table();
    let cipher = encrypt("the soldiers marched toward the castle at dawn", 8);
    let mut breaker = CipherBreaker::new(&cipher, table.clone(), Some(12));
    let fanout = 6;
    let mut accepted = 0;

    for it in 0..200 {
        // Same draws the breaker makes for its proposal seeds.
        let mut replay = breaker.rng.clone();
        let seeds: Vec<u64> = (0..fanout).map(|_| replay.u64(..)).collect();
        let current = *breaker.current_cipher();

        let scored: Vec<(Permutation, f64)> = seeds
            .iter()
            .map(|&s| {
                let proposed = propose_swap(&mut fastrand::Rng::with_seed(s), &current);
                let ll = table.log_likelihood_str(&proposed.decode(&cipher));
                (proposed, ll)
            })
            .collect();
        let mut best = 0;
        for (i, (_, ll)) in scored.iter().enumerate() {
            if *ll > scored[best].1 {
                best = i;
            }
        }

        if breaker.step_parallel(it, fanout) {
            accepted += 1;
            assert_eq!(*breaker.current_cipher(), scored[best].0, "iteration {}", it);
            assert_eq!(breaker.current_log_likelihood(), scored[best].1);
        } else {
            assert_eq!(*breaker.current_cipher(), current);
        }
    }
    assert!(accepted > 0);
}

#[test]
fn test_cancel_flag_stops_before_first_step() {
    let table = toy_table();
    let cipher = encrypt("attack at dawn", 3);
    let cancel = Arc::new(AtomicBool::new(true));
    let mut breaker = CipherBreaker::new(&cipher, table, Some(3)).with_cancel(cancel);

    assert_eq!(breaker.break_cipher(1000), 0);
    assert_eq!(breaker.history().len(), 1);
}

// --- Optimizer ---

fn options(chains: usize, iterations: usize, restarts: usize) -> SearchOptions {
    SearchOptions {
        chains,
        iterations,
        restarts,
        fanout: 1,
        top_n: 5,
        history_capacity: None,
        log_interval: None,
        max_time: None,
    }
}

#[test]
fn test_optimizer_merges_chains() {
    let table = toy_table();
    let cipher = encrypt("the attack began at the break of day", 77);
    let optimizer = Optimizer::new(table.clone(), options(3, 600, 2));

    let result = optimizer.run(&cipher, Some(10), LogProgress);

    assert_eq!(result.iterations, 3 * 600);
    assert!(result.candidates.len() <= 5);
    assert_eq!(result.best, result.candidates[0]);
    assert!(result.history.contains(&cipher));
    assert_eq!(result.history.get(&cipher).map(|d| d.iteration), Some(0));
    assert!(
        (table.log_likelihood_str(&result.best_cipher.decode(&cipher)) - result.best.log_likelihood)
            .abs()
            < 1e-9
    );
}

struct StopAfterFirst {
    calls: AtomicUsize,
}

impl ProgressCallback for StopAfterFirst {
    fn on_progress(&self, _chain: usize, _restart: usize, _ll: f64, _text: &str, _ips: f64) -> bool {
        self.calls.fetch_add(1, Ordering::Relaxed);
        false
    }
}

#[test]
fn test_callback_can_abort_search() {
    let table = toy_table();
    let cipher = encrypt("the castle had fallen", 13);
    let optimizer = Optimizer::new(table, options(1, 900, 3));

    let cb = StopAfterFirst {
        calls: AtomicUsize::new(0),
    };
    let result = optimizer.run(&cipher, Some(1), cb);
    assert_eq!(result.iterations, 300);
}

#[test]
fn test_zero_time_budget_returns_seed_only() {
    let table = toy_table();
    let cipher = encrypt("when the war was over", 21);
    let mut opts = options(2, 10_000, 1);
    opts.max_time = Some(Duration::ZERO);

    let result = Optimizer::new(table, opts).run(&cipher, Some(4), LogProgress);
    assert_eq!(result.iterations, 0);
    assert_eq!(result.best.text, cipher);
}

#[test]
fn test_largest_seed_does_not_overflow_chain_seeds() {
    let table = toy_table();
    let cipher = encrypt("the banners of the king", 30);
    let optimizer = Optimizer::new(table, options(3, 200, 1));

    let result = optimizer.run(&cipher, Some(u64::MAX), LogProgress);
    assert_eq!(result.iterations, 3 * 200);

    let again = optimizer.run(&cipher, Some(u64::MAX), LogProgress);
    assert_eq!(result.best, again.best);
}
