//! Reader (and writer) for the `.mlp` text format.
//!
//! ```text
//! <header>
//! [number of layers]       N
//! [neurons per layer]      N lines
//! [activation function]    N lines, first word is the activation name
//! [input names]            one name per line
//! [input normalization]    "min max" per input; a blank line keeps (0, 1). Optional.
//! [output names]
//! [output normalization]   Optional.
//! </header>
//!
//! [weights per layer]
//! <layer>                  per boundary: one row per source neuron,
//! w w w                    one column per destination neuron
//! </layer>
//!
//! [biases per layer]
//! b b b                    one line per layer
//! ```
//!
//! Parsing produces a [`NetworkDefinition`], a plain description of the network.
//! Only [`NetworkDefinition::build`] creates a [`Network`], so a malformed file never
//! yields a partially initialized network.

use std::fmt::{self, Write as _};
use std::path::Path;
use std::str::Lines;

use tracing::{info, warn};

use crate::{Activation, Error, Network, NetworkBuilder, Result};

const HEADER_START: &str = "<header>";
const HEADER_END: &str = "</header>";
const LAYER_COUNT: &str = "[number of layers]";
const NEURONS: &str = "[neurons per layer]";
const ACTIVATIONS: &str = "[activation function]";
const INPUT_NAMES: &str = "[input names]";
const INPUT_NORM: &str = "[input normalization]";
const OUTPUT_NAMES: &str = "[output names]";
const OUTPUT_NORM: &str = "[output normalization]";
const WEIGHTS: &str = "[weights per layer]";
const BIASES: &str = "[biases per layer]";

/// Everything needed to construct a [`Network`].
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkDefinition {
    /// Neuron count per layer, input layer first.
    pub neurons: Vec<usize>,
    /// Activation per layer. The input layer entry is kept but never evaluated.
    pub activations: Vec<Activation>,
    pub input_names: Vec<String>,
    pub output_names: Vec<String>,
    pub input_norm: Vec<(f64, f64)>,
    pub output_norm: Vec<(f64, f64)>,
    /// Per boundary `b`: `weights[b][source][dest]`, as laid out in the file.
    pub weights: Vec<Vec<Vec<f64>>>,
    /// Per layer, one bias per neuron.
    pub biases: Vec<Vec<f64>>,
}

struct Cursor<'a> {
    lines: Lines<'a>,
    line_no: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            line_no: 0,
        }
    }

    fn next(&mut self) -> Option<&'a str> {
        let line = self.lines.next()?;
        self.line_no += 1;
        Some(line.trim())
    }

    fn expect(&mut self, what: &str) -> Result<&'a str> {
        self.next().ok_or_else(|| {
            Error::TruncatedFile(format!(
                "expected {what} after line {}, found end of file",
                self.line_no
            ))
        })
    }

    fn skip_to(&mut self, flag: &str) -> Result<()> {
        while let Some(line) = self.next() {
            if line == flag {
                return Ok(());
            }
        }
        Err(Error::MissingSection(flag.to_owned()))
    }

    fn parse_count(&mut self, what: &str) -> Result<usize> {
        let line = self.expect(what)?;
        line.parse().map_err(|_| {
            Error::InvalidData(format!(
                "line {}: expected {what}, found `{line}`",
                self.line_no
            ))
        })
    }

    fn parse_values(&mut self, count: usize, what: &str) -> Result<Vec<f64>> {
        let line = self.expect(what)?;
        let line_no = self.line_no;
        let values = line
            .split_whitespace()
            .take(count)
            .map(|word| {
                word.parse::<f64>().map_err(|_| {
                    Error::InvalidData(format!("line {line_no}: `{word}` is not a number"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if values.len() < count {
            return Err(Error::TruncatedFile(format!(
                "line {line_no}: expected {count} values for {what}, found {}",
                values.len()
            )));
        }
        Ok(values)
    }

    fn parse_norm(&mut self, n: usize, what: &str) -> Result<Vec<(f64, f64)>> {
        let mut norm = Vec::with_capacity(n);
        for i in 0..n {
            let line = self.expect(what)?;
            if line.is_empty() {
                warn!(index = i, section = what, "no normalization bounds given, using (0, 1)");
                norm.push((0.0, 1.0));
                continue;
            }
            let line_no = self.line_no;
            let mut words = line.split_whitespace().map(|w| {
                w.parse::<f64>().map_err(|_| {
                    Error::InvalidData(format!("line {line_no}: `{w}` is not a number"))
                })
            });
            match (words.next(), words.next()) {
                (Some(min), Some(max)) => norm.push((min?, max?)),
                _ => {
                    return Err(Error::TruncatedFile(format!(
                        "line {line_no}: expected `min max` for {what}"
                    )));
                }
            }
        }
        Ok(norm)
    }

    fn parse_names(&mut self, n: usize, what: &str) -> Result<Vec<String>> {
        (0..n).map(|_| self.expect(what).map(str::to_owned)).collect()
    }
}

impl NetworkDefinition {
    /// Parse the contents of a `.mlp` file.
    pub fn parse(text: &str) -> Result<Self> {
        let mut cur = Cursor::new(text);
        cur.skip_to(HEADER_START)?;

        let mut n_layers: Option<usize> = None;
        let mut neurons: Option<Vec<usize>> = None;
        let mut activations: Option<Vec<Activation>> = None;
        let mut input_names = None;
        let mut output_names = None;
        let mut input_norm = None;
        let mut output_norm = None;

        loop {
            let Some(line) = cur.next() else {
                return Err(Error::MissingSection(HEADER_END.to_owned()));
            };
            match line {
                HEADER_END => break,
                LAYER_COUNT => {
                    let n = cur.parse_count("layer count")?;
                    if n == 0 {
                        return Err(Error::InvalidData("layer count must be > 0".to_owned()));
                    }
                    n_layers = Some(n);
                }
                NEURONS => {
                    let n = n_layers.ok_or_else(|| Error::LayerCountUndefined(NEURONS.to_owned()))?;
                    let counts = (0..n)
                        .map(|_| cur.parse_count("neuron count"))
                        .collect::<Result<Vec<_>>>()?;
                    neurons = Some(counts);
                }
                ACTIVATIONS => {
                    let n = n_layers
                        .ok_or_else(|| Error::LayerCountUndefined(ACTIVATIONS.to_owned()))?;
                    let mut acts = Vec::with_capacity(n);
                    for _ in 0..n {
                        let line = cur.expect("activation function")?;
                        let name = line.split_whitespace().next().unwrap_or_default();
                        acts.push(name.parse()?);
                    }
                    activations = Some(acts);
                }
                INPUT_NAMES | INPUT_NORM | OUTPUT_NAMES | OUTPUT_NORM => {
                    let counts = neurons
                        .as_ref()
                        .ok_or_else(|| Error::LayerCountUndefined(line.to_owned()))?;
                    let n_in = counts[0];
                    let n_out = counts[counts.len() - 1];
                    match line {
                        INPUT_NAMES => input_names = Some(cur.parse_names(n_in, "input name")?),
                        OUTPUT_NAMES => {
                            output_names = Some(cur.parse_names(n_out, "output name")?)
                        }
                        INPUT_NORM => input_norm = Some(cur.parse_norm(n_in, INPUT_NORM)?),
                        _ => output_norm = Some(cur.parse_norm(n_out, OUTPUT_NORM)?),
                    }
                }
                _ => {}
            }
        }

        if n_layers.is_none() {
            return Err(Error::MissingSection(LAYER_COUNT.to_owned()));
        }
        let neurons = neurons.ok_or_else(|| Error::MissingSection(NEURONS.to_owned()))?;
        let activations =
            activations.ok_or_else(|| Error::MissingSection(ACTIVATIONS.to_owned()))?;
        let input_names =
            input_names.ok_or_else(|| Error::MissingSection(INPUT_NAMES.to_owned()))?;
        let output_names =
            output_names.ok_or_else(|| Error::MissingSection(OUTPUT_NAMES.to_owned()))?;

        let n_in = neurons[0];
        let n_out = neurons[neurons.len() - 1];
        let input_norm = input_norm.unwrap_or_else(|| {
            warn!(section = INPUT_NORM, "section absent, using (0, 1) for every input");
            vec![(0.0, 1.0); n_in]
        });
        let output_norm = output_norm.unwrap_or_else(|| {
            warn!(section = OUTPUT_NORM, "section absent, using (0, 1) for every output");
            vec![(0.0, 1.0); n_out]
        });

        cur.skip_to(WEIGHTS)?;
        let mut weights = Vec::with_capacity(neurons.len().saturating_sub(1));
        for b in 0..neurons.len().saturating_sub(1) {
            cur.expect("layer opening line")?;
            let rows = (0..neurons[b])
                .map(|_| cur.parse_values(neurons[b + 1], "weight row"))
                .collect::<Result<Vec<_>>>()?;
            cur.expect("layer closing line")?;
            weights.push(rows);
        }

        cur.skip_to(BIASES)?;
        let biases = neurons
            .iter()
            .map(|&n| cur.parse_values(n, "bias row"))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            neurons,
            activations,
            input_names,
            output_names,
            input_norm,
            output_norm,
            weights,
            biases,
        })
    }

    /// Read and parse a `.mlp` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let text = std::fs::read_to_string(p).map_err(|source| Error::Io {
            path: p.to_path_buf(),
            source,
        })?;
        let def = Self::parse(&text)?;
        info!(
            path = %p.display(),
            layers = def.neurons.len(),
            inputs = def.input_names.len(),
            outputs = def.output_names.len(),
            "loaded network definition"
        );
        Ok(def)
    }

    /// Check that every per-layer and per-boundary table matches the neuron counts.
    pub fn validate(&self) -> Result<()> {
        let n = self.neurons.len();
        if n == 0 {
            return Err(Error::InvalidData("definition has no layers".to_owned()));
        }
        let n_in = self.neurons[0];
        let n_out = self.neurons[n - 1];

        let expect = |what: &str, expected: usize, got: usize| {
            if expected == got {
                Ok(())
            } else {
                Err(Error::InvalidData(format!(
                    "{what}: expected {expected} entries, got {got}"
                )))
            }
        };
        expect("activations", n, self.activations.len())?;
        expect("input names", n_in, self.input_names.len())?;
        expect("output names", n_out, self.output_names.len())?;
        expect("input normalization", n_in, self.input_norm.len())?;
        expect("output normalization", n_out, self.output_norm.len())?;
        expect("weight boundaries", n - 1, self.weights.len())?;
        expect("bias layers", n, self.biases.len())?;

        for (b, rows) in self.weights.iter().enumerate() {
            expect("weight rows", self.neurons[b], rows.len())?;
            for row in rows {
                expect("weight columns", self.neurons[b + 1], row.len())?;
            }
        }
        for (l, row) in self.biases.iter().enumerate() {
            expect("biases", self.neurons[l], row.len())?;
        }

        let all_finite = self
            .weights
            .iter()
            .flatten()
            .flatten()
            .chain(self.biases.iter().flatten())
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(Error::InvalidData(
                "weights and biases must be finite".to_owned(),
            ));
        }
        Ok(())
    }

    /// Construct the network this definition describes.
    pub fn build(&self) -> Result<Network> {
        self.validate()?;
        let n = self.neurons.len();

        let mut builder = NetworkBuilder::new().define_input_layer(self.neurons[0])?;
        for l in 1..n.saturating_sub(1) {
            builder = builder.push_hidden_layer(self.neurons[l], self.activations[l])?;
        }
        let mut net = builder
            .define_output_layer(self.neurons[n - 1], self.activations[n - 1])?
            .size_weights()?;

        for (b, rows) in self.weights.iter().enumerate() {
            for (source, row) in rows.iter().enumerate() {
                for (dest, &w) in row.iter().enumerate() {
                    net.set_weight(b, source, dest, w)?;
                }
            }
        }
        for (l, row) in self.biases.iter().enumerate() {
            for (neuron, &b) in row.iter().enumerate() {
                net.set_bias(l, neuron, b)?;
            }
        }
        for (i, (name, &(min, max))) in self.input_names.iter().zip(&self.input_norm).enumerate() {
            net.set_input_name(i, name.as_str())?;
            net.set_input_norm(i, min, max)?;
        }
        for (o, (name, &(min, max))) in self.output_names.iter().zip(&self.output_norm).enumerate()
        {
            net.set_output_name(o, name.as_str())?;
            net.set_output_norm(o, min, max)?;
        }
        Ok(net)
    }

    /// Render in the `.mlp` text format.
    pub fn to_mlp_string(&self) -> String {
        self.to_string()
    }
}

impl From<&Network> for NetworkDefinition {
    fn from(net: &Network) -> Self {
        let layers: Vec<_> = (0..net.n_layers()).filter_map(|l| net.layer(l)).collect();
        let neurons: Vec<usize> = layers.iter().map(|l| l.neurons()).collect();
        let weights = (0..net.n_weight_layers())
            .map(|b| {
                (0..neurons[b])
                    .map(|source| {
                        (0..neurons[b + 1])
                            .map(|dest| net.weights().get(b, source, dest))
                            .collect()
                    })
                    .collect()
            })
            .collect();

        Self {
            activations: layers.iter().map(|l| l.activation()).collect(),
            biases: layers.iter().map(|l| l.biases().to_vec()).collect(),
            input_names: net.input_names().to_vec(),
            output_names: net.output_names().to_vec(),
            input_norm: (0..net.input_dim()).filter_map(|i| net.input_norm(i)).collect(),
            output_norm: (0..net.output_dim()).filter_map(|o| net.output_norm(o)).collect(),
            neurons,
            weights,
        }
    }
}

fn write_row(out: &mut String, values: &[f64]) -> fmt::Result {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        write!(out, "{v}")?;
    }
    out.push('\n');
    Ok(())
}

impl fmt::Display for NetworkDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = String::new();
        writeln!(s, "{HEADER_START}\n")?;
        writeln!(s, "{LAYER_COUNT}\n{}\n", self.neurons.len())?;
        writeln!(s, "{NEURONS}")?;
        for n in &self.neurons {
            writeln!(s, "{n}")?;
        }
        writeln!(s, "\n{ACTIVATIONS}")?;
        for a in &self.activations {
            writeln!(s, "{a}")?;
        }
        writeln!(s, "\n{INPUT_NAMES}")?;
        for name in &self.input_names {
            writeln!(s, "{name}")?;
        }
        writeln!(s, "\n{INPUT_NORM}")?;
        for (min, max) in &self.input_norm {
            writeln!(s, "{min} {max}")?;
        }
        writeln!(s, "\n{OUTPUT_NAMES}")?;
        for name in &self.output_names {
            writeln!(s, "{name}")?;
        }
        writeln!(s, "\n{OUTPUT_NORM}")?;
        for (min, max) in &self.output_norm {
            writeln!(s, "{min} {max}")?;
        }
        writeln!(s, "\n{HEADER_END}\n")?;

        writeln!(s, "{WEIGHTS}")?;
        for rows in &self.weights {
            writeln!(s, "<layer>")?;
            for row in rows {
                write_row(&mut s, row)?;
            }
            writeln!(s, "</layer>")?;
        }
        writeln!(s, "\n{BIASES}")?;
        for row in &self.biases {
            write_row(&mut s, row)?;
        }
        f.write_str(&s)
    }
}

impl Network {
    /// Load a network from a `.mlp` file.
    pub fn from_mlp_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        NetworkDefinition::from_file(path)?.build()
    }

    /// Parse a network from `.mlp` text.
    pub fn from_mlp_str(text: &str) -> Result<Self> {
        NetworkDefinition::parse(text)?.build()
    }

    pub fn to_mlp_string(&self) -> String {
        NetworkDefinition::from(self).to_mlp_string()
    }
}
