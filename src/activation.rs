//! Activation functions.
//!
//! A neuron computes a pre-activation value `x = b + sum(w_i * y_i)` and then applies
//! the activation function of its layer: `y = activation(x)`.
//!
//! Unlike a training crate, the evaluator needs `dy/dx` in terms of the
//! *pre-activation* `x`, because the derivative is chained forward through the network
//! together with the value. Each kind therefore exposes its closed-form value and
//! derivative at `x` directly.
//!
//! Every piecewise kind branches on a strict `x > 0` test; the derivative at exactly
//! `x == 0` is the left branch.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// SELU scale.
pub const SELU_LAMBDA: f64 = 1.05070098;
/// SELU negative saturation.
pub const SELU_ALPHA: f64 = 1.67326324;

/// `sqrt(2 / pi)`, the GELU tanh-approximation factor.
pub const GELU_SQRT_2_OVER_PI: f64 = 0.7978845608028654;
pub const GELU_CUBIC: f64 = 0.044715;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
/// Element-wise activation function applied to every neuron of a layer.
pub enum Activation {
    /// Output is identically zero.
    #[default]
    None,
    Linear,
    ReLU,
    ELU,
    GELU,
    SELU,
    Sigmoid,
    Swish,
    Tanh,
    Exponential,
}

impl Activation {
    pub const ALL: [Activation; 10] = [
        Activation::None,
        Activation::Linear,
        Activation::ReLU,
        Activation::ELU,
        Activation::GELU,
        Activation::SELU,
        Activation::Sigmoid,
        Activation::Swish,
        Activation::Tanh,
        Activation::Exponential,
    ];

    /// Name used in network files.
    pub fn name(self) -> &'static str {
        match self {
            Activation::None => "none",
            Activation::Linear => "linear",
            Activation::ReLU => "relu",
            Activation::ELU => "elu",
            Activation::GELU => "gelu",
            Activation::SELU => "selu",
            Activation::Sigmoid => "sigmoid",
            Activation::Swish => "swish",
            Activation::Tanh => "tanh",
            Activation::Exponential => "exponential",
        }
    }

    /// Value of the activation at pre-activation `x`.
    #[inline]
    pub fn forward(self, x: f64) -> f64 {
        match self {
            Activation::None => 0.0,
            Activation::Linear => x,
            Activation::ReLU => {
                if x > 0.0 {
                    x
                } else {
                    0.0
                }
            }
            Activation::ELU => {
                if x > 0.0 {
                    x
                } else {
                    x.exp() - 1.0
                }
            }
            Activation::GELU => {
                0.5 * x * (1.0 + (GELU_SQRT_2_OVER_PI * (x + GELU_CUBIC * x.powi(3))).tanh())
            }
            Activation::SELU => {
                if x > 0.0 {
                    SELU_LAMBDA * x
                } else {
                    SELU_LAMBDA * SELU_ALPHA * (x.exp() - 1.0)
                }
            }
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Swish => x / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::Exponential => x.exp(),
        }
    }

    /// Derivative `dy/dx` of the activation at pre-activation `x`.
    #[inline]
    pub fn derivative(self, x: f64) -> f64 {
        match self {
            Activation::None => 0.0,
            Activation::Linear => 1.0,
            Activation::ReLU => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::ELU => {
                if x > 0.0 {
                    1.0
                } else {
                    x.exp()
                }
            }
            Activation::GELU => {
                let u = GELU_SQRT_2_OVER_PI * (x + GELU_CUBIC * x.powi(3));
                let cosh2 = u.cosh().powi(2);
                // Saturated, the second term vanishes (inf / inf otherwise).
                if cosh2.is_infinite() {
                    return 0.5 * (1.0 + u.tanh());
                }
                let du_dx = GELU_SQRT_2_OVER_PI * (1.0 + 3.0 * GELU_CUBIC * x * x);
                0.5 * (1.0 + u.tanh()) + 0.5 * x * du_dx / cosh2
            }
            Activation::SELU => {
                if x > 0.0 {
                    SELU_LAMBDA
                } else {
                    SELU_LAMBDA * SELU_ALPHA * x.exp()
                }
            }
            Activation::Sigmoid => {
                let e = (-x).exp();
                // inf / inf otherwise; the limit is 0.
                if e.is_infinite() {
                    0.0
                } else {
                    e / (e + 1.0).powi(2)
                }
            }
            Activation::Swish => {
                let e = x.exp();
                let denom = (e + 1.0).powi(2);
                // Saturated positive side, the limit is 1.
                if denom.is_infinite() {
                    1.0
                } else {
                    e * (x + e + 1.0) / denom
                }
            }
            Activation::Tanh => 1.0 / x.cosh().powi(2),
            Activation::Exponential => x.exp(),
        }
    }

    /// Value and derivative at `x`, as `(y, dy/dx)`.
    #[inline]
    pub fn evaluate(self, x: f64) -> (f64, f64) {
        (self.forward(x), self.derivative(x))
    }
}

impl FromStr for Activation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Activation::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| Error::UnknownActivation(s.to_owned()))
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
