use std::fmt;

use crate::{Activation, Error, Layer, NetworkBuilder, Result, WeightStore};

/// When `predict` may reuse the previous evaluation instead of propagating again.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CachePolicy {
    /// Reuse only when every normalized input is bit-for-bit equal to the previous query.
    #[default]
    Exact,
    /// Reuse when every normalized input is within this absolute distance of the
    /// query that produced the cached state.
    Tolerance(f64),
    /// Always propagate.
    Disabled,
}

impl CachePolicy {
    pub fn validate(self) -> Result<()> {
        if let CachePolicy::Tolerance(tol) = self {
            if !(tol.is_finite() && tol >= 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "cache tolerance must be finite and >= 0, got {tol}"
                )));
            }
        }
        Ok(())
    }

    #[inline]
    fn unchanged(self, previous: f64, current: f64) -> bool {
        match self {
            CachePolicy::Exact => previous == current,
            CachePolicy::Tolerance(tol) => (current - previous).abs() <= tol,
            CachePolicy::Disabled => false,
        }
    }
}

/// What the layer buffers currently hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheState {
    Empty,
    Values,
    ValuesAndGradients,
}

impl CacheState {
    #[inline]
    fn covers(self, compute_gradient: bool) -> bool {
        match self {
            CacheState::Empty => false,
            CacheState::Values => !compute_gradient,
            CacheState::ValuesAndGradients => true,
        }
    }
}

/// A finalized dense feed-forward network.
///
/// Layers are ordered `[input, hidden_0, .., hidden_k, output]`. Weights, biases,
/// normalization bounds and variable names may be changed after construction; the
/// topology may not.
///
/// [`Network::predict`] writes into the network's own evaluation buffers, so it takes
/// `&mut self`. Concurrent callers each need their own instance (`Network` is `Clone`
/// and `Send`) or must serialize access externally.
#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Layer>,
    weights: WeightStore,

    input_norm: Vec<(f64, f64)>,
    output_norm: Vec<(f64, f64)>,
    input_names: Vec<String>,
    output_names: Vec<String>,

    cache_policy: CachePolicy,
    cache: CacheState,
    last_input: Vec<f64>,

    outputs: Vec<f64>,
    /// Row-major matrix with shape (n_outputs, n_inputs).
    jacobian: Vec<f64>,
}

impl Network {
    pub fn builder() -> NetworkBuilder {
        NetworkBuilder::new()
    }

    /// Assemble a network from finalized layers (input first, output last), with
    /// gradient accumulators already sized.
    pub(crate) fn from_layers(layers: Vec<Layer>, cache_policy: CachePolicy) -> Self {
        debug_assert!(layers.len() >= 3);
        let sizes: Vec<usize> = layers.iter().map(Layer::neurons).collect();
        let n_inputs = sizes[0];
        let n_outputs = sizes[sizes.len() - 1];

        Self {
            weights: WeightStore::from_layer_sizes(&sizes),
            layers,
            input_norm: vec![(0.0, 1.0); n_inputs],
            output_norm: vec![(0.0, 1.0); n_outputs],
            input_names: vec![String::new(); n_inputs],
            output_names: vec![String::new(); n_outputs],
            cache_policy,
            cache: CacheState::Empty,
            last_input: vec![0.0; n_inputs],
            outputs: vec![0.0; n_outputs],
            jacobian: vec![0.0; n_outputs * n_inputs],
        }
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.input_norm.len()
    }

    #[inline]
    pub fn output_dim(&self) -> usize {
        self.output_norm.len()
    }

    /// Total layer count, including input and output layers.
    #[inline]
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    /// Number of layer boundaries carrying weights.
    #[inline]
    pub fn n_weight_layers(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn neurons(&self, layer: usize) -> Option<usize> {
        self.layers.get(layer).map(Layer::neurons)
    }

    #[inline]
    pub fn layer(&self, layer: usize) -> Option<&Layer> {
        self.layers.get(layer)
    }

    #[inline]
    pub fn activation(&self, layer: usize) -> Option<Activation> {
        self.layers.get(layer).map(Layer::activation)
    }

    #[inline]
    pub fn weights(&self) -> &WeightStore {
        &self.weights
    }

    #[inline]
    pub fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    pub fn set_cache_policy(&mut self, policy: CachePolicy) -> Result<()> {
        policy.validate()?;
        self.cache_policy = policy;
        self.cache = CacheState::Empty;
        Ok(())
    }

    /// Set the weight of the synapse from `source` (in layer `boundary`) to `dest`
    /// (in layer `boundary + 1`).
    pub fn set_weight(
        &mut self,
        boundary: usize,
        source: usize,
        dest: usize,
        value: f64,
    ) -> Result<()> {
        if !self.weights.contains(boundary, source, dest) {
            return Err(Error::InvalidConfig(format!(
                "no synapse {source} -> {dest} across boundary {boundary}"
            )));
        }
        self.weights.set(boundary, source, dest, value);
        self.cache = CacheState::Empty;
        Ok(())
    }

    #[inline]
    pub fn weight(&self, boundary: usize, source: usize, dest: usize) -> Option<f64> {
        self.weights
            .contains(boundary, source, dest)
            .then(|| self.weights.get(boundary, source, dest))
    }

    pub fn set_bias(&mut self, layer: usize, neuron: usize, value: f64) -> Result<()> {
        let l = self
            .layers
            .get_mut(layer)
            .filter(|l| neuron < l.neurons())
            .ok_or_else(|| {
                Error::InvalidConfig(format!("no neuron {neuron} in layer {layer}"))
            })?;
        l.set_bias(neuron, value);
        self.cache = CacheState::Empty;
        Ok(())
    }

    #[inline]
    pub fn bias(&self, layer: usize, neuron: usize) -> Option<f64> {
        self.layers
            .get(layer)
            .filter(|l| neuron < l.neurons())
            .map(|l| l.bias(neuron))
    }

    pub fn set_input_norm(&mut self, input: usize, min: f64, max: f64) -> Result<()> {
        check_bounds(min, max)?;
        let slot = self
            .input_norm
            .get_mut(input)
            .ok_or_else(|| Error::InvalidConfig(format!("no network input {input}")))?;
        *slot = (min, max);
        self.cache = CacheState::Empty;
        Ok(())
    }

    pub fn set_output_norm(&mut self, output: usize, min: f64, max: f64) -> Result<()> {
        check_bounds(min, max)?;
        let slot = self
            .output_norm
            .get_mut(output)
            .ok_or_else(|| Error::InvalidConfig(format!("no network output {output}")))?;
        *slot = (min, max);
        self.cache = CacheState::Empty;
        Ok(())
    }

    /// `(min, max)` normalization bounds of an input.
    #[inline]
    pub fn input_norm(&self, input: usize) -> Option<(f64, f64)> {
        self.input_norm.get(input).copied()
    }

    #[inline]
    pub fn output_norm(&self, output: usize) -> Option<(f64, f64)> {
        self.output_norm.get(output).copied()
    }

    pub fn set_input_name(&mut self, input: usize, name: impl Into<String>) -> Result<()> {
        let slot = self
            .input_names
            .get_mut(input)
            .ok_or_else(|| Error::InvalidConfig(format!("no network input {input}")))?;
        *slot = name.into();
        Ok(())
    }

    pub fn set_output_name(&mut self, output: usize, name: impl Into<String>) -> Result<()> {
        let slot = self
            .output_names
            .get_mut(output)
            .ok_or_else(|| Error::InvalidConfig(format!("no network output {output}")))?;
        *slot = name.into();
        Ok(())
    }

    #[inline]
    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    #[inline]
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    /// Denormalized outputs of the most recent [`Network::predict`].
    #[inline]
    pub fn outputs(&self) -> &[f64] {
        &self.outputs
    }

    #[inline]
    pub fn output(&self, output: usize) -> Option<f64> {
        self.outputs.get(output).copied()
    }

    /// Output/input Jacobian of the most recent gradient-enabled `predict`,
    /// row-major with shape `(output_dim, input_dim)`.
    #[inline]
    pub fn jacobian(&self) -> &[f64] {
        &self.jacobian
    }

    /// Derivatives of one output with respect to every raw input.
    #[inline]
    pub fn jacobian_row(&self, output: usize) -> Option<&[f64]> {
        let n = self.input_dim();
        self.jacobian.get(output * n..(output + 1) * n)
    }

    #[inline]
    pub fn d_output_d_input(&self, output: usize, input: usize) -> Option<f64> {
        self.jacobian_row(output)?.get(input).copied()
    }

    /// Evaluate the network for raw (physical) `input` values.
    ///
    /// Inputs are normalized with the input bounds, propagated through every layer,
    /// and the output layer is denormalized with the output bounds. With
    /// `compute_gradient`, the exact Jacobian of the raw outputs with respect to the
    /// raw inputs is propagated alongside the values (forward mode) and is afterwards
    /// available through [`Network::jacobian`].
    ///
    /// If the normalized inputs are unchanged since the last evaluation (per the
    /// [`CachePolicy`]) and that evaluation covered the requested gradient, the
    /// layers are not re-propagated.
    ///
    /// Does not allocate.
    pub fn predict(&mut self, input: &[f64], compute_gradient: bool) -> Result<&[f64]> {
        let n_inputs = self.input_dim();
        if input.len() != n_inputs {
            return Err(Error::dims("input", n_inputs, input.len()));
        }

        let mut same_point = self.cache.covers(compute_gradient);
        if same_point {
            for (i, &raw) in input.iter().enumerate() {
                let (min, max) = self.input_norm[i];
                let x_norm = (raw - min) / (max - min);
                if !self.cache_policy.unchanged(self.last_input[i], x_norm) {
                    same_point = false;
                    break;
                }
            }
        }

        if !same_point {
            let input_layer = &mut self.layers[0];
            for (i, &raw) in input.iter().enumerate() {
                let (min, max) = self.input_norm[i];
                let x_norm = (raw - min) / (max - min);
                self.last_input[i] = x_norm;
                input_layer.set_output(i, x_norm);
                if compute_gradient {
                    input_layer.set_gradient(i, i, 1.0 / (max - min));
                }
            }

            self.propagate(compute_gradient);
            self.cache = if compute_gradient {
                CacheState::ValuesAndGradients
            } else {
                CacheState::Values
            };
        }

        self.denormalize(compute_gradient);
        Ok(&self.outputs)
    }

    /// Forward pass from the first hidden layer to the output layer, reading the
    /// normalized inputs from the input layer outputs.
    fn propagate(&mut self, compute_gradient: bool) {
        let weights = &self.weights;

        for idx in 1..self.layers.len() {
            // Borrow the previous layer immutably and the current layer mutably.
            let (left, right) = self.layers.split_at_mut(idx);
            let prev = &left[idx - 1];
            let layer = &mut right[0];
            let activation = layer.activation();

            for j in 0..layer.neurons() {
                let row = weights.row(idx - 1, j);

                let mut x = layer.bias(j);
                for (i, &w) in row.iter().enumerate() {
                    x += w * prev.output(i);
                }
                layer.set_input(j, x);

                if compute_gradient {
                    let (y, dy_dx) = activation.evaluate(x);
                    layer.set_output(j, y);

                    let grad = layer.gradient_row_mut(j);
                    for (k, g) in grad.iter_mut().enumerate() {
                        let mut dx_dinput = 0.0;
                        for (i, &w) in row.iter().enumerate() {
                            dx_dinput += w * prev.gradient(i, k);
                        }
                        *g = dy_dx * dx_dinput;
                    }
                } else {
                    layer.set_output(j, activation.forward(x));
                }
            }
        }
    }

    fn denormalize(&mut self, compute_gradient: bool) {
        let n_inputs = self.input_dim();
        let Some(output_layer) = self.layers.last() else {
            return;
        };

        for (o, &(min, max)) in self.output_norm.iter().enumerate() {
            let range = max - min;
            self.outputs[o] = output_layer.output(o) * range + min;
            if compute_gradient {
                let row = &mut self.jacobian[o * n_inputs..(o + 1) * n_inputs];
                for (k, d) in row.iter_mut().enumerate() {
                    *d = range * output_layer.gradient(o, k);
                }
            }
        }
    }
}

fn check_bounds(min: f64, max: f64) -> Result<()> {
    if !(min.is_finite() && max.is_finite() && min < max) {
        return Err(Error::InvalidConfig(format!(
            "normalization bounds must be finite with min < max, got ({min}, {max})"
        )));
    }
    Ok(())
}

const TABLE_WIDTH: usize = 54;
const COLUMN_WIDTH: usize = TABLE_WIDTH / 3 - 1;

/// A bound as it fits one table column: plain when short enough, scientific otherwise.
fn bound_cell(value: f64) -> String {
    let plain = value.to_string();
    if plain.chars().count() <= COLUMN_WIDTH {
        return plain;
    }
    // Sign, "d.", "e-ddd".
    let precision = COLUMN_WIDTH - 8;
    format!("{value:.precision$e}")
}

/// Architecture summary: input bounds, hidden layer sizes and activations, output bounds.
impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = |f: &mut fmt::Formatter<'_>| writeln!(f, "+{}+", "-".repeat(TABLE_WIDTH - 1));
        let title = |f: &mut fmt::Formatter<'_>, s: &str| {
            writeln!(f, "|{s:<w$}|", w = TABLE_WIDTH - 1)
        };
        let w = COLUMN_WIDTH;

        rule(f)?;
        title(f, "Input Layer Information:")?;
        rule(f)?;
        writeln!(f, "|{:<w$}|{:<w$}|{:<w$}|", "Input Variable:", "Lower limit:", "Upper limit:")?;
        rule(f)?;
        for (i, (name, (min, max))) in self.input_names.iter().zip(&self.input_norm).enumerate() {
            let label: String = format!("{}: {name}", i + 1).chars().take(w).collect();
            let (min, max) = (bound_cell(*min), bound_cell(*max));
            writeln!(f, "|{label:<w$}|{min:>w$}|{max:>w$}|")?;
        }
        rule(f)?;

        title(f, "Hidden Layers Information:")?;
        rule(f)?;
        writeln!(f, "|{:<w$}|{:<w$}|{:<w$}|", "Layer index", "Neuron count", "Function")?;
        rule(f)?;
        let n_hidden = self.layers.len() - 2;
        for (i, layer) in self.layers[1..=n_hidden].iter().enumerate() {
            writeln!(
                f,
                "|{:>w$}|{:>w$}|{:>w$}|",
                i + 1,
                layer.neurons(),
                layer.activation().name()
            )?;
        }
        rule(f)?;

        title(f, "Output Layer Information:")?;
        rule(f)?;
        writeln!(f, "|{:<w$}|{:<w$}|{:<w$}|", "Output Variable:", "Lower limit:", "Upper limit:")?;
        rule(f)?;
        for (i, (name, (min, max))) in self.output_names.iter().zip(&self.output_norm).enumerate()
        {
            let label: String = format!("{}: {name}", i + 1).chars().take(w).collect();
            let (min, max) = (bound_cell(*min), bound_cell(*max));
            writeln!(f, "|{label:<w$}|{min:>w$}|{max:>w$}|")?;
        }
        rule(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1 input, hidden ReLU layer [2, -1] with biases [0, 0.1], linear output [1, 1].
    fn scenario() -> Network {
        let mut net = NetworkBuilder::new()
            .define_input_layer(1)
            .unwrap()
            .push_hidden_layer(2, Activation::ReLU)
            .unwrap()
            .define_output_layer(1, Activation::Linear)
            .unwrap()
            .size_weights()
            .unwrap();
        net.set_weight(0, 0, 0, 2.0).unwrap();
        net.set_weight(0, 0, 1, -1.0).unwrap();
        net.set_bias(1, 1, 0.1).unwrap();
        net.set_weight(1, 0, 0, 1.0).unwrap();
        net.set_weight(1, 1, 0, 1.0).unwrap();
        net
    }

    fn tanh_net(policy: CachePolicy) -> Network {
        let mut net = NetworkBuilder::new()
            .define_input_layer(2)
            .unwrap()
            .push_hidden_layer(3, Activation::Tanh)
            .unwrap()
            .define_output_layer(1, Activation::Linear)
            .unwrap()
            .cache_policy(policy)
            .unwrap()
            .size_weights()
            .unwrap();
        let w0 = [[0.5, -0.3], [0.8, 0.1], [-0.6, 0.9]];
        for (dest, row) in w0.iter().enumerate() {
            for (source, &w) in row.iter().enumerate() {
                net.set_weight(0, source, dest, w).unwrap();
            }
        }
        for (source, w) in [1.0, -2.0, 0.5].into_iter().enumerate() {
            net.set_weight(1, source, 0, w).unwrap();
        }
        net.set_input_norm(0, -1.0, 3.0).unwrap();
        net.set_output_norm(0, 10.0, 20.0).unwrap();
        net
    }

    #[test]
    fn scenario_values_and_layer_state() {
        let mut net = scenario();
        let out = net.predict(&[0.5], true).unwrap();
        assert_eq!(out, &[1.0]);

        let hidden = net.layer(1).unwrap();
        assert_eq!(hidden.input(0), 1.0);
        assert!((hidden.input(1) - -0.4).abs() < 1e-15);
        assert_eq!(hidden.outputs(), &[1.0, 0.0]);

        // Only the active ReLU neuron contributes.
        assert_eq!(net.jacobian(), &[2.0]);
        assert_eq!(net.d_output_d_input(0, 0), Some(2.0));
        assert_eq!(net.output(0), Some(1.0));
        assert_eq!(net.jacobian_row(0), Some(&[2.0][..]));
    }

    #[test]
    fn result_accessors_check_indices() {
        let mut net = scenario();
        net.predict(&[0.5], true).unwrap();
        assert_eq!(net.output(1), None);
        assert_eq!(net.jacobian_row(1), None);
        assert_eq!(net.d_output_d_input(1, 0), None);
        assert_eq!(net.d_output_d_input(0, 1), None);
    }

    #[test]
    fn input_length_is_checked() {
        let mut net = scenario();
        let err = net.predict(&[0.5, 1.0], false).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 1,
                got: 2,
                ..
            }
        ));
        assert!(net.predict(&[], true).is_err());
    }

    #[test]
    fn first_call_propagates_even_at_zero() {
        let mut net = scenario();
        net.set_bias(2, 0, 3.0).unwrap();
        // Normalized input 0 equals the zero-initialized buffers.
        let out = net.predict(&[0.0], false).unwrap();
        assert!((out[0] - 3.1).abs() < 1e-15);
    }

    #[test]
    fn repeated_query_is_idempotent() {
        let mut net = tanh_net(CachePolicy::Exact);
        let x = [0.7, -0.2];
        let first = net.predict(&x, true).unwrap().to_vec();
        let jac = net.jacobian().to_vec();
        let second = net.predict(&x, true).unwrap().to_vec();
        assert_eq!(first, second);
        assert_eq!(jac, net.jacobian());
    }

    #[test]
    fn gradient_request_after_value_only_call_recomputes() {
        let mut net = tanh_net(CachePolicy::Exact);
        let mut reference = tanh_net(CachePolicy::Disabled);
        let x = [1.3, 0.4];

        net.predict(&x, false).unwrap();
        assert!(net.jacobian().iter().all(|&d| d == 0.0));
        net.predict(&x, true).unwrap();
        reference.predict(&x, true).unwrap();
        assert_eq!(net.jacobian(), reference.jacobian());
        assert!(net.jacobian().iter().any(|&d| d != 0.0));
    }

    #[test]
    fn mutating_parameters_invalidates_the_cache() {
        let mut net = tanh_net(CachePolicy::Exact);
        let x = [0.2, 0.9];
        let before = net.predict(&x, false).unwrap()[0];

        net.set_bias(2, 0, 1.0).unwrap();
        let after = net.predict(&x, false).unwrap()[0];
        // Output range is 10, so a unit normalized bias shifts the output by 10.
        assert!((after - before - 10.0).abs() < 1e-12);

        net.set_weight(1, 0, 0, 0.0).unwrap();
        assert_ne!(net.predict(&x, false).unwrap()[0], after);
    }

    #[test]
    fn tolerance_policy_reuses_nearby_queries() {
        let mut net = tanh_net(CachePolicy::Tolerance(1e-6));
        let first = net.predict(&[0.5, 0.5], false).unwrap()[0];
        let near = net.predict(&[0.5 + 1e-9, 0.5], false).unwrap()[0];
        assert_eq!(first, near);

        let far = net.predict(&[0.6, 0.5], false).unwrap()[0];
        assert_ne!(first, far);

        assert!(net.set_cache_policy(CachePolicy::Tolerance(-1.0)).is_err());
        assert!(net.set_cache_policy(CachePolicy::Tolerance(f64::NAN)).is_err());
    }

    #[test]
    fn parameter_setters_check_indices() {
        let mut net = scenario();
        assert!(net.set_weight(0, 1, 0, 1.0).is_err());
        assert!(net.set_weight(2, 0, 0, 1.0).is_err());
        assert!(net.set_bias(1, 2, 1.0).is_err());
        assert!(net.set_bias(3, 0, 1.0).is_err());
        assert!(net.set_input_norm(1, 0.0, 1.0).is_err());
        assert!(net.set_input_norm(0, 1.0, 1.0).is_err());
        assert!(net.set_output_norm(0, 0.0, f64::INFINITY).is_err());
        assert!(net.set_input_name(1, "T").is_err());

        assert_eq!(net.weight(0, 0, 1), Some(-1.0));
        assert_eq!(net.weight(0, 1, 1), None);
        assert_eq!(net.bias(1, 1), Some(0.1));
        assert_eq!(net.input_norm(0), Some((0.0, 1.0)));
    }

    #[test]
    fn display_lists_every_layer() {
        let mut net = tanh_net(CachePolicy::Exact);
        net.set_input_name(0, "T").unwrap();
        net.set_input_name(1, "p").unwrap();
        net.set_output_name(0, "rho").unwrap();

        let table = net.to_string();
        assert!(table.contains("1: T"));
        assert!(table.contains("2: p"));
        assert!(table.contains("1: rho"));
        assert!(table.contains("tanh"));
        assert!(table.contains("Hidden Layers Information:"));
        for line in table.lines() {
            assert_eq!(line.chars().count(), TABLE_WIDTH + 1, "{line:?}");
        }
    }

    #[test]
    fn display_keeps_long_entries_inside_the_frame() {
        let mut net = tanh_net(CachePolicy::Exact);
        net.set_input_name(0, "a_rather_long_variable_name").unwrap();
        net.set_input_norm(0, -1e20, 1e20).unwrap();
        net.set_output_norm(0, 1.0 / 3.0, 123456.78901234).unwrap();

        let table = net.to_string();
        assert!(table.contains("1: a_rather_long_"));
        assert!(table.contains("-1.000000000e20"));
        assert!(table.contains("3.333333333e-1"));
        for line in table.lines() {
            assert_eq!(line.chars().count(), TABLE_WIDTH + 1, "{line:?}");
        }
    }

    #[test]
    fn short_bounds_are_printed_plainly() {
        assert_eq!(bound_cell(300.0), "300");
        assert_eq!(bound_cell(-0.25), "-0.25");
        assert_eq!(bound_cell(-1e-300).chars().count(), COLUMN_WIDTH);
    }
}
