use cipherforge::error::CipherForgeError;
use cipherforge::hmm::forward_backward::naive_forward;
use cipherforge::hmm::viterbi::{path_log_score, viterbi_with_initial};
use cipherforge::hmm::{
    baum_welch, emission_to_mapping, scaled_forward_backward, sequence_log_likelihood, viterbi,
    BaumWelchOptions, SpaceConstraint, StochasticMatrix,
};
use rstest::rstest;
use strum::IntoEnumIterator;

fn three_state_model() -> (StochasticMatrix, StochasticMatrix) {
    let a = StochasticMatrix::from_rows(&[
        vec![0.5, 0.3, 0.2],
        vec![0.2, 0.6, 0.2],
        vec![0.3, 0.3, 0.4],
    ])
    .unwrap();
    let b = StochasticMatrix::from_rows(&[
        vec![0.7, 0.2, 0.1],
        vec![0.1, 0.8, 0.1],
        vec![0.25, 0.25, 0.5],
    ])
    .unwrap();
    (a, b)
}

fn random_model(n: usize, seed: u64) -> (StochasticMatrix, StochasticMatrix, Vec<f64>) {
    let mut rng = fastrand::Rng::with_seed(seed);
    let a = StochasticMatrix::random(n, &mut rng);
    let b = StochasticMatrix::random(n, &mut rng);
    let pi = a.row(n - 1).to_vec();
    (a, b, pi)
}

// --- Forward-backward ---

#[test]
fn test_scaled_forward_reconstructs_naive_forward() {
    let (a, b, pi) = random_model(4, 7);
    let obs = [0, 3, 1, 1, 2, 0, 3, 2];

    let messages = scaled_forward_backward(&a, &b, &pi, &obs).unwrap();
    let naive = naive_forward(&a, &b, &pi, &obs).unwrap();
    let rebuilt = messages.unscaled_alpha();

    assert_eq!(rebuilt.len(), naive.len());
    for (r, n) in rebuilt.iter().zip(&naive) {
        assert!((r - n).abs() <= 1e-12 * n.abs().max(1e-300), "{} vs {}", r, n);
    }
}

#[test]
fn test_alpha_hat_rows_are_normalised() {
    let (a, b, pi) = random_model(5, 11);
    let obs: Vec<usize> = (0..40).map(|t| (t * 7 + 3) % 5).collect();
    let messages = scaled_forward_backward(&a, &b, &pi, &obs).unwrap();

    assert_eq!(messages.len(), obs.len());
    for t in 0..obs.len() {
        let s: f64 = messages.alpha_hat(t).iter().sum();
        assert!((s - 1.0).abs() < 1e-12);
    }
}

#[test]
fn test_gamma_rows_sum_to_one() {
    let (a, b) = three_state_model();
    let pi = a.row(2).to_vec();
    let obs = [0, 1, 2, 2, 1, 0, 0];

    let gamma = scaled_forward_backward(&a, &b, &pi, &obs)
        .unwrap()
        .posteriors()
        .unwrap();

    assert_eq!(gamma.len(), obs.len());
    for t in 0..obs.len() {
        let s: f64 = gamma.row(t).iter().sum();
        assert!((s - 1.0).abs() < 1e-12, "row {} sums to {}", t, s);
    }
}

#[test]
fn test_long_sequence_does_not_underflow() {
    let (a, b, pi) = random_model(27, 3);
    let obs: Vec<usize> = (0..5_000).map(|t| (t * 13 + 5) % 27).collect();

    let messages = scaled_forward_backward(&a, &b, &pi, &obs).unwrap();
    let ll = messages.log_likelihood();
    assert!(ll.is_finite() && ll < 0.0);
    assert!(messages.posteriors().is_ok());
}

#[rstest]
#[case(vec![0.5, 0.5], "entries")]
#[case(vec![0.2, 0.2, 0.2], "sums to")]
fn test_bad_initial_distribution_is_rejected(#[case] pi: Vec<f64>, #[case] fragment: &str) {
    let (a, b) = three_state_model();
    let err = scaled_forward_backward(&a, &b, &pi, &[0, 1]).unwrap_err();
    match err {
        CipherForgeError::Validation(msg) => assert!(msg.contains(fragment), "{}", msg),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_zero_row_in_transition_matrix_is_rejected() {
    let a = StochasticMatrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 0.0]]).unwrap();
    let b = StochasticMatrix::identity(2);
    let err = scaled_forward_backward(&a, &b, &[0.5, 0.5], &[0, 1]).unwrap_err();
    assert!(matches!(err, CipherForgeError::Validation(_)));
}

#[rstest]
#[case(StochasticMatrix::identity(0))]
#[case(StochasticMatrix::uniform(0))]
#[case(StochasticMatrix::random(0, &mut fastrand::Rng::with_seed(1)))]
fn test_zero_state_model_is_rejected(#[case] m: StochasticMatrix) {
    assert_eq!(m.n_states(), 0);
    assert!(matches!(
        scaled_forward_backward(&m, &m, &[], &[0]),
        Err(CipherForgeError::Validation(_))
    ));
    assert!(matches!(
        viterbi(&m, &m, &[0]),
        Err(CipherForgeError::Validation(_))
    ));
    let opts = BaumWelchOptions {
        space_constraint: SpaceConstraint::None,
        space_index: None,
        ..Default::default()
    };
    assert!(matches!(
        baum_welch(&m, &m, &[], &[0], &opts),
        Err(CipherForgeError::Validation(_))
    ));
}

#[test]
fn test_empty_observations_are_rejected() {
    let (a, b) = three_state_model();
    let err = scaled_forward_backward(&a, &b, &[0.2, 0.3, 0.5], &[]).unwrap_err();
    assert!(matches!(err, CipherForgeError::Validation(_)));
}

#[test]
fn test_impossible_observations_are_numerical_error() {
    let a = StochasticMatrix::identity(2);
    let b = StochasticMatrix::identity(2);
    // State 0 can never leave itself, so observing 1 after 0 is impossible.
    let err = scaled_forward_backward(&a, &b, &[1.0, 0.0], &[0, 1]).unwrap_err();
    assert!(matches!(err, CipherForgeError::Numerical(_)));
}

// --- Baum-Welch ---

#[test]
fn test_baum_welch_from_optimal_emission_stops_at_iteration_zero() {
    let (a, _) = three_state_model();
    let b = StochasticMatrix::identity(3);
    let pi = a.row(2).to_vec();
    let obs = [0, 1, 2, 0, 2, 1, 1];

    let opts = BaumWelchOptions {
        space_constraint: SpaceConstraint::None,
        space_index: None,
        ..Default::default()
    };
    let report = baum_welch(&a, &b, &pi, &obs, &opts).unwrap();

    assert_eq!(report.converged_at, Some(0));
    assert_eq!(report.iterations, 1);
    assert_eq!(report.max_change, 0.0);
    assert_eq!(report.emission, b);
}

#[test]
fn test_early_stop_fires_at_first_iteration_under_tol() {
    let (a, b_start, pi) = random_model(4, 21);
    let obs: Vec<usize> = (0..60).map(|t| (t * t + 1) % 4).collect();
    let opts = BaumWelchOptions {
        max_iter: 500,
        tol: 1e-3,
        space_constraint: SpaceConstraint::None,
        space_index: None,
    };

    let full = baum_welch(&a, &b_start, &pi, &obs, &opts).unwrap();
    let k = full.converged_at.expect("should converge within 500 iterations");
    assert_eq!(full.iterations, k + 1);
    assert!(full.max_change < opts.tol);

    // Stopping one update earlier must not report convergence.
    if k > 0 {
        let short = BaumWelchOptions {
            max_iter: k,
            ..opts.clone()
        };
        let partial = baum_welch(&a, &b_start, &pi, &obs, &short).unwrap();
        assert_eq!(partial.converged_at, None);
        assert_eq!(partial.iterations, k);
        assert!(partial.max_change >= opts.tol);
    }
}

#[rstest]
#[case(SpaceConstraint::Row, 1)]
#[case(SpaceConstraint::Row, 4)]
#[case(SpaceConstraint::RowAndColumn, 1)]
#[case(SpaceConstraint::RowAndColumn, 2)]
#[case(SpaceConstraint::RowAndColumn, 7)]
fn test_space_constraint_holds_after_every_update(
    #[case] constraint: SpaceConstraint,
    #[case] max_iter: usize,
) {
    let n = 5;
    let space = n - 1;
    let (a, mut b_start, pi) = random_model(n, 99);
    constraint.apply(&mut b_start, space);

    let obs = [4, 0, 1, 4, 2, 3, 4, 1, 1, 0, 4, 2];
    let opts = BaumWelchOptions {
        max_iter,
        tol: 0.0,
        space_constraint: constraint,
        space_index: Some(space),
    };

    let report = baum_welch(&a, &b_start, &pi, &obs, &opts).unwrap();
    assert_eq!(report.iterations, max_iter);
    assert!(constraint.holds(&report.emission, space));
    for i in 0..n {
        assert!((report.emission.row(i).iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_every_constraint_holds_once_applied() {
    for constraint in SpaceConstraint::iter() {
        let mut b = StochasticMatrix::random(6, &mut fastrand::Rng::with_seed(1));
        constraint.apply(&mut b, 5);
        assert!(constraint.holds(&b, 5), "{}", constraint);
        b.validate_stochastic("B", 1e-12).unwrap();
    }
}

#[test]
fn test_baum_welch_does_not_decrease_likelihood() {
    let (a, b_start, pi) = random_model(3, 5);
    let obs = [0, 0, 1, 2, 2, 1, 0, 1, 2, 0, 0, 0, 2];
    let mut b = b_start;
    let opts = BaumWelchOptions {
        max_iter: 1,
        tol: 0.0,
        space_constraint: SpaceConstraint::None,
        space_index: None,
    };

    let mut last = f64::NEG_INFINITY;
    for _ in 0..10 {
        let report = baum_welch(&a, &b, &pi, &obs, &opts).unwrap();
        assert!(report.log_likelihood >= last - 1e-9);
        last = report.log_likelihood;
        b = report.emission;
    }
}

#[test]
fn test_unvisited_states_keep_their_emission_rows() {
    let n = 5;
    let space = n - 1;
    let (a, mut b_start, pi) = random_model(n, 17);
    SpaceConstraint::RowAndColumn.apply(&mut b_start, space);

    // Only spaces are observed, so no letter state is ever occupied.
    let obs = [space; 9];
    let opts = BaumWelchOptions {
        max_iter: 3,
        tol: 0.0,
        space_constraint: SpaceConstraint::RowAndColumn,
        space_index: Some(space),
    };
    let report = baum_welch(&a, &b_start, &pi, &obs, &opts).unwrap();

    assert_eq!(report.iterations, 3);
    for i in (0..n).filter(|&i| i != space) {
        for (got, want) in report.emission.row(i).iter().zip(b_start.row(i)) {
            assert!((got - want).abs() < 1e-12, "row {}: {} vs {}", i, got, want);
        }
    }
    assert_eq!(report.emission.get(space, space), 1.0);
}

#[test]
fn test_report_likelihood_scores_returned_emission() {
    let (a, b_start, pi) = random_model(4, 8);
    let obs: Vec<usize> = (0..30).map(|t| (t * 3 + t / 4) % 4).collect();
    let opts = BaumWelchOptions {
        max_iter: 4,
        tol: 0.0,
        space_constraint: SpaceConstraint::None,
        space_index: None,
    };

    let report = baum_welch(&a, &b_start, &pi, &obs, &opts).unwrap();
    let rescored = sequence_log_likelihood(&a, &report.emission, &pi, &obs).unwrap();
    let full = scaled_forward_backward(&a, &report.emission, &pi, &obs)
        .unwrap()
        .log_likelihood();

    assert_eq!(report.log_likelihood, rescored);
    assert!((rescored - full).abs() < 1e-9);
}

#[test]
fn test_emission_to_mapping_reads_row_argmax() {
    let b = StochasticMatrix::from_rows(&[
        vec![0.1, 0.9, 0.0],
        vec![0.6, 0.2, 0.2],
        vec![0.0, 0.0, 1.0],
    ])
    .unwrap();
    assert_eq!(emission_to_mapping(&b), vec![1, 0, 2]);
}

// --- Viterbi ---

#[test]
fn test_viterbi_matches_brute_force() {
    let (a, b) = three_state_model();
    let pi = a.row(2).to_vec();
    let obs = [0, 2, 1, 1];

    let mut best = f64::NEG_INFINITY;
    for s0 in 0..3 {
        for s1 in 0..3 {
            for s2 in 0..3 {
                for s3 in 0..3 {
                    let score = path_log_score(&a, &b, &pi, &[s0, s1, s2, s3], &obs);
                    best = best.max(score);
                }
            }
        }
    }

    let path = viterbi(&a, &b, &obs).unwrap();
    assert!((path.log_score - best).abs() < 1e-12);
    assert!((path_log_score(&a, &b, &pi, &path.states, &obs) - best).abs() < 1e-12);
}

#[test]
fn test_viterbi_is_deterministic() {
    let (a, b, _) = random_model(6, 42);
    let obs: Vec<usize> = (0..50).map(|t| (t * 5 + 1) % 6).collect();
    let first = viterbi(&a, &b, &obs).unwrap();
    let second = viterbi(&a, &b, &obs).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_viterbi_ties_pick_lowest_state() {
    let a = StochasticMatrix::uniform(3);
    let b = StochasticMatrix::uniform(3);
    let path = viterbi_with_initial(&a, &b, &[1.0 / 3.0; 3], &[0, 1, 2]).unwrap();
    assert_eq!(path.states, vec![0, 0, 0]);
}

#[test]
fn test_viterbi_handles_zero_probabilities() {
    // Identity emission: only the observed state is possible at each step.
    let (a, _) = three_state_model();
    let b = StochasticMatrix::identity(3);
    let obs = [2, 0, 1, 1, 0];
    let path = viterbi(&a, &b, &obs).unwrap();
    assert_eq!(path.states, obs.to_vec());
    assert!(path.log_score.is_finite());
    assert_eq!(path.pmax(0)[0], f64::NEG_INFINITY);
}

#[test]
fn test_viterbi_all_paths_impossible_is_error() {
    let a = StochasticMatrix::identity(2);
    let b = StochasticMatrix::identity(2);
    let err = viterbi_with_initial(&a, &b, &[1.0, 0.0], &[0, 1]).unwrap_err();
    assert!(matches!(err, CipherForgeError::Numerical(_)));
}
