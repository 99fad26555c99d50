//! Property-Based Tests — Domain Layer Invariants
//!
//! Uses `proptest` to verify that the allocation, optimizer and report
//! maintain their mathematical invariants across random inputs.

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use kelly_allocator::domain::adam::{AdamConfig, AdamOptimizer};
use kelly_allocator::domain::allocation::{Allocation, AllocationParameters, softmax};
use kelly_allocator::domain::error::InputError;
use kelly_allocator::domain::loss::StochasticLoss;
use kelly_allocator::domain::market::{EPSILON, MarketModel, clip_price};
use kelly_allocator::domain::report::AllocationReport;

/// Matching price and probability vectors of 1..=6 events.
fn market_inputs() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (1usize..=6).prop_flat_map(|n| {
        (
            prop::collection::vec(0.0f64..=1.0, n),
            prop::collection::vec(0.0f64..=1.0, n),
        )
    })
}

/// Parameters for `n` events with moderate logits.
fn parameters(n: usize) -> impl Strategy<Value = AllocationParameters> {
    (
        -5.0f64..5.0,
        -5.0f64..5.0,
        prop::collection::vec(-5.0f64..5.0, n),
        prop::collection::vec(-5.0f64..5.0, n),
    )
        .prop_map(|(theta_yes, theta_no, phi_yes, phi_no)| AllocationParameters {
            theta_yes,
            theta_no,
            phi_yes,
            phi_no,
        })
}

// ── Allocation Properties ───────────────────────────────────

proptest! {
    /// Softmax output is a probability simplex.
    #[test]
    fn softmax_is_a_simplex(logits in prop::collection::vec(-50.0f64..50.0, 1..10)) {
        let probs = softmax(&logits);
        let sum: f64 = probs.iter().sum();
        prop_assert!((sum - 1.0).abs() < 1e-9, "sum = {sum}");
        prop_assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    /// Adjusted prices stay inside [EPSILON, 1 - EPSILON], endpoints included.
    #[test]
    fn adjusted_prices_are_clipped(price in prop_oneof![Just(0.0), Just(1.0), 0.0f64..=1.0]) {
        let q = clip_price(price);
        prop_assert!(q >= EPSILON);
        prop_assert!(q <= 1.0 - EPSILON);
    }

    /// The side fractions and per-side weights sum to one, and all of W
    /// is spent, for arbitrary parameters.
    #[test]
    fn allocation_spends_all_wealth(
        (inputs, params) in market_inputs().prop_flat_map(|inputs| {
            let n = inputs.0.len();
            (Just(inputs), parameters(n))
        }),
        wealth in 1.0f64..10_000.0,
    ) {
        let market = MarketModel::new(inputs.0, inputs.1).unwrap();
        let alloc = Allocation::from_parameters(&params, &market, wealth).unwrap();

        prop_assert!((alloc.f_yes + alloc.f_no - 1.0).abs() < 1e-9);
        prop_assert!((alloc.alpha_yes.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        prop_assert!((alloc.alpha_no.iter().sum::<f64>() - 1.0).abs() < 1e-9);

        let spent: f64 = market
            .adjusted_prices()
            .iter()
            .enumerate()
            .map(|(i, &q)| alloc.n_yes[i] * q + alloc.n_no[i] * (1.0 - q))
            .sum();
        prop_assert!((spent - wealth).abs() < 1e-6 * wealth, "spent {spent} of {wealth}");
    }
}

// ── Report Properties ───────────────────────────────────────

proptest! {
    /// Never both sides net-positive on one event; capital balances.
    #[test]
    fn report_hedges_and_balances(
        (inputs, params) in market_inputs().prop_flat_map(|inputs| {
            let n = inputs.0.len();
            (Just(inputs), parameters(n))
        }),
        wealth in 1.0f64..10_000.0,
    ) {
        let market = MarketModel::new(inputs.0, inputs.1).unwrap();
        let report = AllocationReport::compile(&params, &market, wealth).unwrap();

        for p in &report.positions {
            prop_assert_eq!(p.yes_net * p.no_net, 0.0);
            prop_assert!(p.yes_net >= 0.0 && p.no_net >= 0.0);
        }
        prop_assert!(report.accounting_residual().abs() < 1e-4);
    }
}

// ── Optimizer Properties ────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// After any number of Adam steps on sampled gradients, the
    /// allocation is still a valid simplex.
    #[test]
    fn simplex_holds_after_training_steps(
        (prices, probs) in market_inputs(),
        seed in any::<u64>(),
        steps in 1usize..20,
        lr in 0.001f64..0.5,
    ) {
        let market = MarketModel::new(prices, probs).unwrap();
        let n = market.num_events();
        let loss = StochasticLoss::new(&market, 100.0, 32);
        let mut params = AllocationParameters::zeros(n);
        let mut adam = AdamOptimizer::new(AdamConfig::with_learning_rate(lr), n);
        let mut rng = StdRng::seed_from_u64(seed);

        for _ in 0..steps {
            let eval = loss.evaluate(&params, &mut rng).unwrap();
            prop_assume!(eval.loss.is_finite());
            adam.step(&mut params, &eval.gradients).unwrap();
        }

        let alloc = Allocation::from_parameters(&params, &market, 100.0).unwrap();
        prop_assert!((alloc.f_yes + alloc.f_no - 1.0).abs() < 1e-9);
        prop_assert!((alloc.alpha_yes.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        prop_assert!((alloc.alpha_no.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}

// ── Validation Properties ───────────────────────────────────

proptest! {
    /// Arrays of different length are always rejected.
    #[test]
    fn mismatched_lengths_rejected(
        a in 1usize..8,
        b in 1usize..8,
    ) {
        prop_assume!(a != b);
        let err = MarketModel::new(vec![0.5; a], vec![0.5; b]).unwrap_err();
        let is_mismatch = matches!(err, InputError::LengthMismatch { .. });
        prop_assert!(is_mismatch);
    }
}

#[test]
fn empty_inputs_rejected() {
    assert!(matches!(
        MarketModel::new(vec![], vec![]),
        Err(InputError::Empty { .. })
    ));
    assert!(MarketModel::new(vec![0.5], vec![]).is_err());
}
