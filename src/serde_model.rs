//! Model serialization/deserialization (feature: `serde`).
//!
//! This module defines a versioned, stable JSON format for `Network`.
//!
//! Design notes:
//! - We do NOT directly serialize internal `Network`/`Layer` structs, to keep the
//!   file format stable even if internal representation changes. Evaluation
//!   buffers and cache state are never written.
//! - All deserialization validates dimensions, parameter lengths, normalization
//!   bounds and that all parameters are finite, then rebuilds through
//!   `NetworkBuilder`.

use serde::{Deserialize, Serialize};

use crate::{Activation, Error, Network, NetworkBuilder, Result};

use std::path::Path;

pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNetwork {
    pub format_version: u32,
    pub inputs: Vec<SerializedVariable>,
    pub outputs: Vec<SerializedVariable>,
    /// Input layer first. The input layer carries no weights.
    pub layers: Vec<SerializedLayer>,
}

/// A named network input or output with its normalization bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedVariable {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedLayer {
    pub neurons: usize,
    pub activation: SerializedActivation,
    /// Row-major (neurons, previous layer neurons).
    pub weights: Vec<f64>,
    pub biases: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializedActivation {
    None,
    Linear,
    Relu,
    Elu,
    Gelu,
    Selu,
    Sigmoid,
    Swish,
    Tanh,
    Exponential,
}

impl From<Activation> for SerializedActivation {
    fn from(value: Activation) -> Self {
        match value {
            Activation::None => SerializedActivation::None,
            Activation::Linear => SerializedActivation::Linear,
            Activation::ReLU => SerializedActivation::Relu,
            Activation::ELU => SerializedActivation::Elu,
            Activation::GELU => SerializedActivation::Gelu,
            Activation::SELU => SerializedActivation::Selu,
            Activation::Sigmoid => SerializedActivation::Sigmoid,
            Activation::Swish => SerializedActivation::Swish,
            Activation::Tanh => SerializedActivation::Tanh,
            Activation::Exponential => SerializedActivation::Exponential,
        }
    }
}

impl From<SerializedActivation> for Activation {
    fn from(value: SerializedActivation) -> Self {
        match value {
            SerializedActivation::None => Activation::None,
            SerializedActivation::Linear => Activation::Linear,
            SerializedActivation::Relu => Activation::ReLU,
            SerializedActivation::Elu => Activation::ELU,
            SerializedActivation::Gelu => Activation::GELU,
            SerializedActivation::Selu => Activation::SELU,
            SerializedActivation::Sigmoid => Activation::Sigmoid,
            SerializedActivation::Swish => Activation::Swish,
            SerializedActivation::Tanh => Activation::Tanh,
            SerializedActivation::Exponential => Activation::Exponential,
        }
    }
}

impl SerializedNetwork {
    pub fn validate(&self) -> Result<()> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(Error::InvalidData(format!(
                "unsupported model format_version {}; expected {}",
                self.format_version, MODEL_FORMAT_VERSION
            )));
        }
        if self.layers.len() < 3 {
            return Err(Error::InvalidData(format!(
                "serialized network must have input, hidden and output layers, got {} layers",
                self.layers.len()
            )));
        }

        let first = &self.layers[0];
        let last = &self.layers[self.layers.len() - 1];
        if self.inputs.len() != first.neurons {
            return Err(Error::InvalidData(format!(
                "{} inputs declared for an input layer of {} neurons",
                self.inputs.len(),
                first.neurons
            )));
        }
        if self.outputs.len() != last.neurons {
            return Err(Error::InvalidData(format!(
                "{} outputs declared for an output layer of {} neurons",
                self.outputs.len(),
                last.neurons
            )));
        }

        let mut prev = 0;
        for (i, layer) in self.layers.iter().enumerate() {
            layer
                .validate(prev)
                .map_err(|e| Error::InvalidData(format!("layer {i} invalid: {e}")))?;
            prev = layer.neurons;
        }

        for v in self.inputs.iter().chain(&self.outputs) {
            if !(v.min.is_finite() && v.max.is_finite() && v.min < v.max) {
                return Err(Error::InvalidData(format!(
                    "variable `{}` has invalid bounds ({}, {})",
                    v.name, v.min, v.max
                )));
            }
        }

        Ok(())
    }
}

impl SerializedLayer {
    /// `prev` is the neuron count of the previous layer, 0 for the input layer.
    fn validate(&self, prev: usize) -> Result<()> {
        if self.neurons == 0 {
            return Err(Error::InvalidData("layer must have > 0 neurons".to_owned()));
        }

        let expected_w = self
            .neurons
            .checked_mul(prev)
            .ok_or_else(|| Error::InvalidData("layer weight shape overflow".to_owned()))?;
        if self.weights.len() != expected_w {
            return Err(Error::InvalidData(format!(
                "weights length {} does not match neurons * previous neurons ({} * {})",
                self.weights.len(),
                self.neurons,
                prev
            )));
        }
        if self.biases.len() != self.neurons {
            return Err(Error::InvalidData(format!(
                "biases length {} does not match neurons {}",
                self.biases.len(),
                self.neurons
            )));
        }

        if self.weights.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "weights must contain only finite values".to_owned(),
            ));
        }
        if self.biases.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "biases must contain only finite values".to_owned(),
            ));
        }

        Ok(())
    }
}

impl From<&Network> for SerializedNetwork {
    fn from(net: &Network) -> Self {
        let layers = (0..net.n_layers())
            .filter_map(|l| net.layer(l).map(|layer| (l, layer)))
            .map(|(l, layer)| SerializedLayer {
                neurons: layer.neurons(),
                activation: layer.activation().into(),
                weights: if l == 0 {
                    Vec::new()
                } else {
                    net.weights().matrix(l - 1).to_vec()
                },
                biases: layer.biases().to_vec(),
            })
            .collect();

        Self {
            format_version: MODEL_FORMAT_VERSION,
            inputs: variables(net.input_names(), |i| net.input_norm(i)),
            outputs: variables(net.output_names(), |o| net.output_norm(o)),
            layers,
        }
    }
}

fn variables(
    names: &[String],
    bounds: impl Fn(usize) -> Option<(f64, f64)>,
) -> Vec<SerializedVariable> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let (min, max) = bounds(i).unwrap_or((0.0, 1.0));
            SerializedVariable {
                name: name.clone(),
                min,
                max,
            }
        })
        .collect()
}

impl TryFrom<SerializedNetwork> for Network {
    type Error = Error;

    fn try_from(value: SerializedNetwork) -> std::result::Result<Self, Self::Error> {
        value.validate()?;

        let n = value.layers.len();
        let mut builder = NetworkBuilder::new().define_input_layer(value.layers[0].neurons)?;
        for layer in &value.layers[1..n - 1] {
            builder = builder.push_hidden_layer(layer.neurons, layer.activation.into())?;
        }
        let out = &value.layers[n - 1];
        let mut net = builder
            .define_output_layer(out.neurons, out.activation.into())?
            .size_weights()?;

        for (l, layer) in value.layers.iter().enumerate() {
            for (neuron, &b) in layer.biases.iter().enumerate() {
                net.set_bias(l, neuron, b)?;
            }
            if l == 0 {
                continue;
            }
            let prev = value.layers[l - 1].neurons;
            for (idx, &w) in layer.weights.iter().enumerate() {
                net.set_weight(l - 1, idx % prev, idx / prev, w)?;
            }
        }
        for (i, v) in value.inputs.into_iter().enumerate() {
            net.set_input_norm(i, v.min, v.max)?;
            net.set_input_name(i, v.name)?;
        }
        for (o, v) in value.outputs.into_iter().enumerate() {
            net.set_output_norm(o, v.min, v.max)?;
            net.set_output_name(o, v.name)?;
        }

        Ok(net)
    }
}

impl Network {
    /// Serialize the model to a pretty-printed JSON string.
    pub fn to_json_string_pretty(&self) -> Result<String> {
        let ser = SerializedNetwork::from(self);
        serde_json::to_string_pretty(&ser)
            .map_err(|e| Error::InvalidData(format!("failed to serialize model: {e}")))
    }

    /// Serialize the model to a compact JSON string.
    pub fn to_json_string(&self) -> Result<String> {
        let ser = SerializedNetwork::from(self);
        serde_json::to_string(&ser)
            .map_err(|e| Error::InvalidData(format!("failed to serialize model: {e}")))
    }

    /// Parse a model from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let ser: SerializedNetwork = serde_json::from_str(s)
            .map_err(|e| Error::InvalidData(format!("failed to parse model json: {e}")))?;
        ser.try_into()
    }

    /// Save the model to a JSON file (pretty-printed).
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let s = self.to_json_string_pretty()?;
        let p = path.as_ref();
        std::fs::write(p, s).map_err(|source| Error::Io {
            path: p.to_path_buf(),
            source,
        })
    }

    /// Load a model from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let s = std::fs::read_to_string(p).map_err(|source| Error::Io {
            path: p.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Network {
        let mut net = NetworkBuilder::new()
            .define_input_layer(2)
            .unwrap()
            .push_hidden_layer(3, Activation::GELU)
            .unwrap()
            .define_output_layer(1, Activation::Sigmoid)
            .unwrap()
            .size_weights()
            .unwrap();
        for dest in 0..3 {
            for source in 0..2 {
                let w = 0.1 * (dest * 2 + source) as f64 - 0.25;
                net.set_weight(0, source, dest, w).unwrap();
            }
            net.set_weight(1, dest, 0, 0.5 - 0.3 * dest as f64).unwrap();
            net.set_bias(1, dest, 0.05 * dest as f64).unwrap();
        }
        net.set_input_name(0, "T").unwrap();
        net.set_input_name(1, "p").unwrap();
        net.set_output_name(0, "rho").unwrap();
        net.set_input_norm(0, 300.0, 2500.0).unwrap();
        net.set_output_norm(0, 0.1, 12.0).unwrap();
        net
    }

    #[test]
    fn json_preserves_predictions() {
        let mut net = sample();
        let mut loaded = Network::from_json_str(&net.to_json_string().unwrap()).unwrap();

        let x = [1200.0, 0.4];
        let a = net.predict(&x, true).unwrap().to_vec();
        let b = loaded.predict(&x, true).unwrap().to_vec();
        assert_eq!(a, b);
        assert_eq!(net.jacobian(), loaded.jacobian());
        assert_eq!(loaded.output_names(), &["rho".to_owned()]);
        assert_eq!(loaded.activation(1), Some(Activation::GELU));
    }

    #[test]
    fn activation_names_match_file_names() {
        let json = sample().to_json_string().unwrap();
        assert!(json.contains(r#""activation":"gelu""#), "{json}");
        assert!(json.contains(r#""activation":"sigmoid""#), "{json}");
    }

    #[test]
    fn rejects_unknown_version() {
        let bad = r#"{"format_version":999,"inputs":[],"outputs":[],"layers":[]}"#;
        let err = Network::from_json_str(bad).unwrap_err();
        assert!(format!("{err}").contains("format_version"));
    }

    #[test]
    fn rejects_bad_shapes_and_bounds() {
        let mut ser = SerializedNetwork::from(&sample());
        ser.layers[1].weights.pop();
        let err = Network::try_from(ser).unwrap_err();
        assert!(format!("{err}").contains("layer 1"), "{err}");

        let mut ser = SerializedNetwork::from(&sample());
        ser.outputs[0].max = ser.outputs[0].min;
        assert!(Network::try_from(ser).is_err());

        let mut ser = SerializedNetwork::from(&sample());
        ser.layers.remove(1);
        assert!(Network::try_from(ser).is_err());
    }
}
