//! Routing named variables across several independently loaded networks.
//!
//! A caller asks for a set of named outputs given a set of named inputs. An [`IoMap`]
//! records which network answers which output and how the caller's input slots map
//! onto each network's input neurons. [`NetworkCollection::predict`] then evaluates
//! only the selected networks and scatters their results back into caller order.

use std::path::Path;

use tracing::{debug, info};

use crate::{Error, Network, Result};

/// Independently loaded networks, addressed by position.
#[derive(Debug, Clone, Default)]
pub struct NetworkCollection {
    networks: Vec<Network>,
}

/// Pairing of caller variable slots with one network's neurons.
#[derive(Debug, Clone)]
struct MapEntry {
    network: usize,
    /// `(caller input slot, network input index)`
    inputs: Vec<(usize, usize)>,
    /// `(caller output slot, network output index)`
    outputs: Vec<(usize, usize)>,
    /// Network-ordered raw inputs, filled on every query.
    scratch: Vec<f64>,
}

/// Which networks answer a fixed set of caller inputs and outputs.
///
/// Built once per distinct query signature and reused for every evaluation; holds
/// the per-network input buffers so evaluation does not allocate.
#[derive(Debug, Clone)]
pub struct IoMap {
    n_inputs: usize,
    n_outputs: usize,
    entries: Vec<MapEntry>,
}

impl NetworkCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `.mlp` file in `paths`, in order.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let networks = paths
            .iter()
            .map(Network::from_mlp_file)
            .collect::<Result<Vec<_>>>()?;
        info!(networks = networks.len(), "loaded network collection");
        Ok(Self { networks })
    }

    /// Add a network and return its index.
    pub fn push(&mut self, network: Network) -> usize {
        self.networks.push(network);
        self.networks.len() - 1
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.networks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    #[inline]
    pub fn network(&self, index: usize) -> Option<&Network> {
        self.networks.get(index)
    }

    #[inline]
    pub fn network_mut(&mut self, index: usize) -> Option<&mut Network> {
        self.networks.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Network> {
        self.networks.iter()
    }

    /// Match caller variable names against the inputs (`input == true`) or outputs of
    /// network `index`, returning `(caller slot, network index)` pairs.
    ///
    /// Inputs match all-or-nothing: unless every network input is among `variables`,
    /// the result is empty, since the network could not be evaluated. Outputs match
    /// individually.
    pub fn find_variable_indices<S: AsRef<str>>(
        &self,
        index: usize,
        variables: &[S],
        input: bool,
    ) -> Vec<(usize, usize)> {
        let Some(net) = self.networks.get(index) else {
            return Vec::new();
        };
        let slot_of = |name: &str| variables.iter().position(|v| v.as_ref() == name);

        if input {
            let pairs: Option<Vec<_>> = net
                .input_names()
                .iter()
                .enumerate()
                .map(|(j, name)| slot_of(name).map(|slot| (slot, j)))
                .collect();
            pairs.unwrap_or_default()
        } else {
            variables
                .iter()
                .enumerate()
                .filter_map(|(slot, v)| {
                    net.output_names()
                        .iter()
                        .position(|name| name == v.as_ref())
                        .map(|k| (slot, k))
                })
                .collect()
        }
    }

    /// Evaluate every network selected by `map`.
    ///
    /// `inputs` and `outputs` are in caller order. When `jacobian` is given it receives
    /// `d outputs[o] / d inputs[i]` at `o * inputs.len() + i`; entries between variables
    /// that no network relates are zero.
    pub fn predict(
        &mut self,
        map: &mut IoMap,
        inputs: &[f64],
        outputs: &mut [f64],
        mut jacobian: Option<&mut [f64]>,
    ) -> Result<()> {
        if inputs.len() != map.n_inputs {
            return Err(Error::dims("call inputs", map.n_inputs, inputs.len()));
        }
        if outputs.len() != map.n_outputs {
            return Err(Error::dims("call outputs", map.n_outputs, outputs.len()));
        }
        if let Some(jac) = jacobian.as_deref_mut() {
            let expected = map.n_outputs * map.n_inputs;
            if jac.len() != expected {
                return Err(Error::dims("call jacobian", expected, jac.len()));
            }
            jac.fill(0.0);
        }

        let n_call_inputs = map.n_inputs;
        let n_networks = self.networks.len();
        for entry in &mut map.entries {
            let net = self.networks.get_mut(entry.network).ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "map refers to network {} but the collection has {}",
                    entry.network, n_networks
                ))
            })?;

            let index = entry.network;
            let misfit = || {
                Error::InvalidConfig(format!(
                    "map entry does not fit network {index} of this collection"
                ))
            };
            if entry.scratch.len() != net.input_dim()
                || entry.inputs.iter().any(|&(_, j)| j >= net.input_dim())
                || entry.outputs.iter().any(|&(_, k)| k >= net.output_dim())
            {
                return Err(misfit());
            }

            for &(slot, j) in &entry.inputs {
                entry.scratch[j] = inputs[slot];
            }
            net.predict(&entry.scratch, jacobian.is_some())?;

            for &(slot, k) in &entry.outputs {
                outputs[slot] = net.output(k).ok_or_else(misfit)?;
                if let Some(jac) = jacobian.as_deref_mut() {
                    for &(in_slot, j) in &entry.inputs {
                        jac[slot * n_call_inputs + in_slot] =
                            net.d_output_d_input(k, j).ok_or_else(misfit)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl IoMap {
    /// Pair caller `inputs` and `outputs` with the networks of `collection`.
    ///
    /// A network is selected when all of its inputs are provided and it supplies at
    /// least one requested output not already claimed by an earlier network. When any
    /// outputs are requested, every caller input must feed a selected network and
    /// every output must be claimed.
    pub fn new<S: AsRef<str>>(
        collection: &NetworkCollection,
        inputs: &[S],
        outputs: &[S],
    ) -> Result<Self> {
        let mut claimed = vec![false; outputs.len()];
        let mut entries = Vec::new();

        for index in 0..collection.len() {
            let input_pairs = collection.find_variable_indices(index, inputs, true);
            if input_pairs.is_empty() {
                continue;
            }
            let output_pairs: Vec<_> = collection
                .find_variable_indices(index, outputs, false)
                .into_iter()
                .filter(|&(slot, _)| !claimed[slot])
                .collect();
            if output_pairs.is_empty() {
                continue;
            }
            for &(slot, _) in &output_pairs {
                claimed[slot] = true;
            }

            let n_net_inputs = collection.network(index).map_or(0, Network::input_dim);
            entries.push(MapEntry {
                network: index,
                inputs: input_pairs,
                outputs: output_pairs,
                scratch: vec![0.0; n_net_inputs],
            });
        }

        if !outputs.is_empty() {
            for (slot, name) in inputs.iter().enumerate() {
                let used = entries
                    .iter()
                    .any(|e| e.inputs.iter().any(|&(s, _)| s == slot));
                if !used {
                    return Err(Error::UnmatchedVariable(format!(
                        "input `{}` is not used by any network",
                        name.as_ref()
                    )));
                }
            }
            if let Some(slot) = claimed.iter().position(|&c| !c) {
                return Err(Error::UnmatchedVariable(format!(
                    "output `{}` is not provided by any network",
                    outputs[slot].as_ref()
                )));
            }
        }

        debug!(
            networks = ?entries.iter().map(|e| e.network).collect::<Vec<_>>(),
            inputs = inputs.len(),
            outputs = outputs.len(),
            "built input/output map"
        );

        Ok(Self {
            n_inputs: inputs.len(),
            n_outputs: outputs.len(),
            entries,
        })
    }

    /// Indices of the selected networks, in evaluation order.
    pub fn networks(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|e| e.network)
    }

    /// `(caller input slot, network input index)` pairs of the `n`-th selected network.
    pub fn input_pairs(&self, n: usize) -> Option<&[(usize, usize)]> {
        self.entries.get(n).map(|e| e.inputs.as_slice())
    }

    /// `(caller output slot, network output index)` pairs of the `n`-th selected network.
    pub fn output_pairs(&self, n: usize) -> Option<&[(usize, usize)]> {
        self.entries.get(n).map(|e| e.outputs.as_slice())
    }

    #[inline]
    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }
}
