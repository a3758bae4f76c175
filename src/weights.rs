//! Synapse weights between consecutive layers.
//!
//! Boundary `b` connects layer `b` (source) to layer `b + 1` (destination). Its matrix
//! is stored row-major with shape `(dest_neurons, source_neurons)`, so the weights
//! feeding one destination neuron are contiguous.

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Boundary {
    rows: usize,
    cols: usize,
    weights: Vec<f64>,
}

impl Boundary {
    fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            weights: vec![0.0; rows * cols],
        }
    }
}

/// Dense weight matrices, one per layer boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeightStore {
    boundaries: Vec<Boundary>,
}

impl WeightStore {
    /// Allocate zeroed matrices for a network whose layers have the given neuron counts.
    pub fn from_layer_sizes(sizes: &[usize]) -> Self {
        let boundaries = sizes
            .windows(2)
            .map(|w| Boundary::new(w[1], w[0]))
            .collect();
        Self { boundaries }
    }

    /// Number of layer boundaries (layer count - 1).
    #[inline]
    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// `(dest_neurons, source_neurons)` of boundary `b`.
    #[inline]
    pub fn shape(&self, boundary: usize) -> (usize, usize) {
        let m = &self.boundaries[boundary];
        (m.rows, m.cols)
    }

    /// Weight of the synapse `source -> dest` across `boundary`.
    #[inline]
    pub fn get(&self, boundary: usize, source: usize, dest: usize) -> f64 {
        let m = &self.boundaries[boundary];
        m.weights[dest * m.cols + source]
    }

    #[inline]
    pub fn set(&mut self, boundary: usize, source: usize, dest: usize, value: f64) {
        let m = &mut self.boundaries[boundary];
        m.weights[dest * m.cols + source] = value;
    }

    /// All weights feeding `dest`, indexed by source neuron.
    #[inline]
    pub fn row(&self, boundary: usize, dest: usize) -> &[f64] {
        let m = &self.boundaries[boundary];
        &m.weights[dest * m.cols..(dest + 1) * m.cols]
    }

    /// Whole matrix of `boundary`, row-major `(dest, source)`.
    #[inline]
    pub fn matrix(&self, boundary: usize) -> &[f64] {
        &self.boundaries[boundary].weights
    }

    /// Whether `(boundary, source, dest)` addresses an existing synapse.
    #[inline]
    pub fn contains(&self, boundary: usize, source: usize, dest: usize) -> bool {
        self.boundaries
            .get(boundary)
            .is_some_and(|m| source < m.cols && dest < m.rows)
    }
}
