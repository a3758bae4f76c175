//! Network builder.
//!
//! `NetworkBuilder` is the append-only topology phase of a network's life: define the
//! input layer, push one or more hidden layers, define the output layer, then call
//! [`NetworkBuilder::size_weights`]. Sizing allocates every weight matrix and
//! evaluation buffer from the final neuron counts and returns a [`Network`] whose
//! topology can no longer change; only weights, biases, normalization bounds and
//! variable names remain mutable.

use tracing::debug;

use crate::network::CachePolicy;
use crate::{Activation, Error, Layer, Network, Result};

#[derive(Debug, Clone, Copy)]
struct LayerSpec {
    neurons: usize,
    activation: Activation,
}

#[derive(Debug, Clone, Default)]
/// Builder for a [`Network`].
///
/// Example:
///
/// ```rust
/// use mlp_surrogate::{Activation, NetworkBuilder};
///
/// # fn main() -> mlp_surrogate::Result<()> {
/// let net = NetworkBuilder::new()
///     .define_input_layer(2)?
///     .push_hidden_layer(8, Activation::Tanh)?
///     .define_output_layer(1, Activation::Linear)?
///     .size_weights()?;
/// assert_eq!(net.n_layers(), 3);
/// # Ok(())
/// # }
/// ```
pub struct NetworkBuilder {
    input: Option<usize>,
    hidden: Vec<LayerSpec>,
    output: Option<LayerSpec>,
    cache_policy: CachePolicy,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define the input layer with `neurons` inputs. May only be called once.
    pub fn define_input_layer(mut self, neurons: usize) -> Result<Self> {
        if self.input.is_some() {
            return Err(Error::InvalidConfig(
                "input layer is already defined".to_owned(),
            ));
        }
        check_size("input layer", neurons)?;
        self.input = Some(neurons);
        Ok(self)
    }

    /// Append a hidden layer. Hidden layers are evaluated in push order.
    pub fn push_hidden_layer(mut self, neurons: usize, activation: Activation) -> Result<Self> {
        check_size("hidden layer", neurons)?;
        self.hidden.push(LayerSpec {
            neurons,
            activation,
        });
        Ok(self)
    }

    /// Define the output layer with `neurons` outputs. May only be called once.
    pub fn define_output_layer(mut self, neurons: usize, activation: Activation) -> Result<Self> {
        if self.output.is_some() {
            return Err(Error::InvalidConfig(
                "output layer is already defined".to_owned(),
            ));
        }
        check_size("output layer", neurons)?;
        self.output = Some(LayerSpec {
            neurons,
            activation,
        });
        Ok(self)
    }

    /// Replace the activation of the layer at `layer` in `[input, hidden.., output]`
    /// order. The input layer is never evaluated, so its activation is not settable.
    pub fn set_activation(mut self, layer: usize, activation: Activation) -> Result<Self> {
        let n_hidden = self.hidden.len();
        if layer >= 1 && layer <= n_hidden {
            self.hidden[layer - 1].activation = activation;
            return Ok(self);
        }
        match self.output.as_mut() {
            Some(out) if layer == n_hidden + 1 => {
                out.activation = activation;
                Ok(self)
            }
            _ => Err(Error::InvalidConfig(format!(
                "cannot set activation of layer {layer} ({n_hidden} hidden layers defined)"
            ))),
        }
    }

    /// Like [`NetworkBuilder::set_activation`], resolving the activation by its file name.
    pub fn set_activation_by_name(self, layer: usize, name: &str) -> Result<Self> {
        let activation = name.parse()?;
        self.set_activation(layer, activation)
    }

    pub fn cache_policy(mut self, policy: CachePolicy) -> Result<Self> {
        policy.validate()?;
        self.cache_policy = policy;
        Ok(self)
    }

    /// Finalize the topology: allocate weight matrices, output/Jacobian buffers and
    /// per-layer gradient accumulators.
    pub fn size_weights(self) -> Result<Network> {
        let n_inputs = self
            .input
            .ok_or_else(|| Error::IncompleteTopology("input layer is not defined".to_owned()))?;
        let output = self
            .output
            .ok_or_else(|| Error::IncompleteTopology("output layer is not defined".to_owned()))?;
        if self.hidden.is_empty() {
            return Err(Error::IncompleteTopology(
                "at least one hidden layer is required".to_owned(),
            ));
        }

        let mut layers = Vec::with_capacity(self.hidden.len() + 2);
        layers.push(Layer::new_input(n_inputs));
        for spec in self.hidden.iter().chain(std::iter::once(&output)) {
            let mut layer = Layer::new(spec.neurons);
            layer.set_activation(spec.activation);
            layers.push(layer);
        }
        for layer in &mut layers {
            layer.size_gradients(n_inputs);
        }

        debug!(
            inputs = n_inputs,
            outputs = output.neurons,
            hidden = ?self.hidden.iter().map(|s| s.neurons).collect::<Vec<_>>(),
            "network topology finalized"
        );

        Ok(Network::from_layers(layers, self.cache_policy))
    }
}

fn check_size(what: &str, neurons: usize) -> Result<()> {
    if neurons == 0 {
        return Err(Error::InvalidConfig(format!("{what} must have > 0 neurons")));
    }
    Ok(())
}
