use mlp_surrogate::{Activation, CachePolicy, Error, Network, NetworkBuilder};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn relu_scenario() -> Network {
    let mut net = NetworkBuilder::new()
        .define_input_layer(1)
        .unwrap()
        .push_hidden_layer(1, Activation::ReLU)
        .unwrap()
        .define_output_layer(1, Activation::Linear)
        .unwrap()
        .size_weights()
        .unwrap();
    net.set_weight(0, 0, 0, 2.0).unwrap();
    net.set_weight(1, 0, 0, 1.0).unwrap();
    net
}

/// Two hidden layers with `activation`, random parameters and bounds.
fn random_network(rng: &mut StdRng, activation: Activation) -> Network {
    let sizes = [3, 5, 4, 2];
    let mut net = NetworkBuilder::new()
        .define_input_layer(sizes[0])
        .unwrap()
        .push_hidden_layer(sizes[1], activation)
        .unwrap()
        .push_hidden_layer(sizes[2], activation)
        .unwrap()
        .define_output_layer(sizes[3], Activation::Linear)
        .unwrap()
        .size_weights()
        .unwrap();

    for b in 0..sizes.len() - 1 {
        for source in 0..sizes[b] {
            for dest in 0..sizes[b + 1] {
                net.set_weight(b, source, dest, rng.random_range(-1.0..1.0))
                    .unwrap();
            }
        }
    }
    for (l, &n) in sizes.iter().enumerate().skip(1) {
        for neuron in 0..n {
            net.set_bias(l, neuron, rng.random_range(-0.5..0.5)).unwrap();
        }
    }
    for i in 0..sizes[0] {
        let min = rng.random_range(-2.0..0.0);
        net.set_input_norm(i, min, min + rng.random_range(0.5..3.0))
            .unwrap();
    }
    for o in 0..sizes[3] {
        let min = rng.random_range(-5.0..5.0);
        net.set_output_norm(o, min, min + rng.random_range(1.0..10.0))
            .unwrap();
    }
    net
}

#[test]
fn relu_scenario_output_and_jacobian() {
    let mut net = relu_scenario();
    assert_eq!(net.predict(&[0.5], true).unwrap(), &[1.0]);
    assert_eq!(net.jacobian(), &[2.0]);
}

#[test]
fn normalization_is_applied_on_both_sides() {
    let mut net = relu_scenario();
    net.set_input_norm(0, 0.0, 2.0).unwrap();
    net.set_output_norm(0, 10.0, 20.0).unwrap();

    assert_eq!(net.predict(&[0.5], true).unwrap(), &[15.0]);
    // 10 (output range) * 2 (weights) * 1/2 (input range)
    assert_eq!(net.jacobian(), &[10.0]);
}

#[test]
fn identity_network_round_trips_through_normalization() {
    let mut net = NetworkBuilder::new()
        .define_input_layer(1)
        .unwrap()
        .push_hidden_layer(1, Activation::Linear)
        .unwrap()
        .define_output_layer(1, Activation::Linear)
        .unwrap()
        .size_weights()
        .unwrap();
    net.set_weight(0, 0, 0, 1.0).unwrap();
    net.set_weight(1, 0, 0, 1.0).unwrap();

    for (min, max) in [(0.0, 1.0), (-3.5, 12.0), (273.15, 1273.15)] {
        net.set_input_norm(0, min, max).unwrap();
        net.set_output_norm(0, min, max).unwrap();
        for x in [min, 0.5 * (min + max), max, 2.0 * max] {
            let y = net.predict(&[x], true).unwrap()[0];
            assert!((y - x).abs() <= 1e-12 * x.abs().max(1.0), "x={x} y={y}");
            assert!((net.jacobian()[0] - 1.0).abs() < 1e-12);
        }
    }
}

#[test]
fn negative_side_of_relu_has_zero_gradient() {
    let mut net = relu_scenario();
    assert_eq!(net.predict(&[-0.5], true).unwrap(), &[0.0]);
    assert_eq!(net.jacobian(), &[0.0]);
}

#[test]
fn jacobian_matches_central_differences_for_every_activation() {
    let mut rng = StdRng::seed_from_u64(7);

    for activation in Activation::ALL {
        let mut net = random_network(&mut rng, activation);
        net.set_cache_policy(CachePolicy::Disabled).unwrap();

        let x: Vec<f64> = (0..net.input_dim())
            .map(|i| {
                let (min, max) = net.input_norm(i).unwrap();
                rng.random_range(min..max)
            })
            .collect();

        net.predict(&x, true).unwrap();
        let analytic = net.jacobian().to_vec();

        for i in 0..net.input_dim() {
            let (min, max) = net.input_norm(i).unwrap();
            let h = 1e-6 * (max - min);

            let mut xp = x.clone();
            xp[i] += h;
            let yp = net.predict(&xp, false).unwrap().to_vec();

            let mut xm = x.clone();
            xm[i] -= h;
            let ym = net.predict(&xm, false).unwrap().to_vec();

            for o in 0..net.output_dim() {
                let numeric = (yp[o] - ym[o]) / (2.0 * h);
                let a = analytic[o * net.input_dim() + i];
                let scale = a.abs().max(numeric.abs()).max(1.0);
                assert!(
                    (a - numeric).abs() / scale < 1e-5,
                    "{activation}: d y{o} / d x{i} analytic={a} numeric={numeric}"
                );
            }
        }
    }
}

#[test]
fn repeated_queries_are_bit_identical() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut net = random_network(&mut rng, Activation::GELU);
    let x = [0.1, -0.3, 0.7];

    let first = net.predict(&x, true).unwrap().to_vec();
    let first_jac = net.jacobian().to_vec();
    for _ in 0..3 {
        assert_eq!(net.predict(&x, true).unwrap(), first.as_slice());
        assert_eq!(net.jacobian(), first_jac.as_slice());
    }

    // A values-only call at the same point reuses the gradient pass.
    assert_eq!(net.predict(&x, false).unwrap(), first.as_slice());
}

#[test]
fn cached_values_are_not_reused_for_a_gradient_request() {
    let mut net = relu_scenario();
    net.predict(&[0.5], false).unwrap();
    assert_eq!(net.jacobian(), &[0.0]);

    net.predict(&[0.5], true).unwrap();
    assert_eq!(net.jacobian(), &[2.0]);
}

#[test]
fn parameter_changes_invalidate_the_cache() {
    let mut net = relu_scenario();
    assert_eq!(net.predict(&[0.5], true).unwrap(), &[1.0]);

    net.set_weight(1, 0, 0, 3.0).unwrap();
    assert_eq!(net.predict(&[0.5], true).unwrap(), &[3.0]);
    assert_eq!(net.jacobian(), &[6.0]);

    net.set_bias(2, 0, 1.0).unwrap();
    assert_eq!(net.predict(&[0.5], true).unwrap(), &[4.0]);

    net.set_output_norm(0, 0.0, 2.0).unwrap();
    assert_eq!(net.predict(&[0.5], true).unwrap(), &[8.0]);
    assert_eq!(net.jacobian(), &[12.0]);
}

#[test]
fn tolerance_policy_reuses_nearby_points() {
    let mut net = relu_scenario();
    net.set_cache_policy(CachePolicy::Tolerance(1e-3)).unwrap();

    assert_eq!(net.predict(&[0.5], false).unwrap(), &[1.0]);
    assert_eq!(net.predict(&[0.5004], false).unwrap(), &[1.0]);
    assert_eq!(net.predict(&[0.6], false).unwrap(), &[1.2]);

    assert!(net.set_cache_policy(CachePolicy::Tolerance(-1.0)).is_err());
    assert!(
        net.set_cache_policy(CachePolicy::Tolerance(f64::NAN))
            .is_err()
    );
}

#[test]
fn disabled_policy_always_propagates() {
    let mut net = relu_scenario();
    net.set_cache_policy(CachePolicy::Disabled).unwrap();
    let a = net.predict(&[0.25], true).unwrap().to_vec();
    let b = net.predict(&[0.25], true).unwrap().to_vec();
    assert_eq!(a, b);
    assert_eq!(a, vec![0.5]);
}

#[test]
fn wrong_input_length_is_rejected() {
    let mut net = relu_scenario();
    let err = net.predict(&[0.5, 1.0], false).unwrap_err();
    assert!(matches!(
        err,
        Error::DimensionMismatch {
            expected: 1,
            got: 2,
            ..
        }
    ));
}

#[test]
fn clones_evaluate_independently() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut a = random_network(&mut rng, Activation::Tanh);
    let mut b = a.clone();

    let ya = a.predict(&[0.0, 0.5, 1.0], true).unwrap().to_vec();
    b.set_bias(3, 0, 10.0).unwrap();
    let yb = b.predict(&[0.0, 0.5, 1.0], true).unwrap().to_vec();

    assert_ne!(ya[0], yb[0]);
    assert_eq!(a.predict(&[0.0, 0.5, 1.0], true).unwrap(), ya.as_slice());
}

#[test]
fn network_can_move_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Network>();

    let mut net = relu_scenario();
    let handle = std::thread::spawn(move || net.predict(&[0.5], true).map(<[f64]>::to_vec));
    assert_eq!(handle.join().unwrap().unwrap(), vec![1.0]);
}
