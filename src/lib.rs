//! Evaluation of trained MLP (multi-layer perceptron) surrogate models.
//!
//! `mlp-surrogate` evaluates dense feed-forward networks that stand in for an expensive
//! function, typically a thermodynamic or transport-property lookup inside a solver.
//! Besides the outputs it propagates the exact Jacobian of every output with respect to
//! every input, forward through the layers, in the same pass.
//!
//! # Design goals
//!
//! - Predictable performance: `predict` reuses the network's own buffers and never
//!   allocates.
//! - Repeated queries are cheap: a single-point cache skips propagation when the
//!   normalized inputs did not change (see [`CachePolicy`]).
//! - Clear contracts: topology is fixed by [`NetworkBuilder`]; everything after that is
//!   index-checked and returns [`Result`].
//!
//! # Data layout and shapes
//!
//! - Scalars are `f64`.
//! - Layers are ordered `[input, hidden.., output]`; the input layer is always linear.
//! - Weights are stored per boundary, row-major with shape `(dest_neurons, source_neurons)`.
//! - The Jacobian is row-major with shape `(output_dim, input_dim)`.
//!
//! # Quick start
//!
//! ```rust
//! use mlp_surrogate::{Activation, NetworkBuilder};
//!
//! # fn main() -> mlp_surrogate::Result<()> {
//! let mut net = NetworkBuilder::new()
//!     .define_input_layer(1)?
//!     .push_hidden_layer(1, Activation::ReLU)?
//!     .define_output_layer(1, Activation::Linear)?
//!     .size_weights()?;
//!
//! net.set_weight(0, 0, 0, 2.0)?;
//! net.set_weight(1, 0, 0, 1.0)?;
//!
//! let y = net.predict(&[0.5], true)?;
//! assert_eq!(y, &[1.0]);
//! assert_eq!(net.jacobian(), &[2.0]);
//! # Ok(())
//! # }
//! ```
//!
//! # Network files
//!
//! Trained networks are usually loaded from the plain-text `.mlp` format, see
//! [`reader`]. Several networks that together cover a set of variables can be grouped
//! in a [`NetworkCollection`] and queried by name through an [`IoMap`].

pub mod activation;
pub mod builder;
pub mod collection;
pub mod error;
pub mod layer;
pub mod network;
pub mod reader;
pub mod weights;

#[cfg(feature = "serde")]
pub mod serde_model;

pub use activation::Activation;
pub use builder::NetworkBuilder;
pub use collection::{IoMap, NetworkCollection};
pub use error::{Error, Result};
pub use layer::Layer;
pub use network::{CachePolicy, Network};
pub use reader::NetworkDefinition;
pub use weights::WeightStore;
