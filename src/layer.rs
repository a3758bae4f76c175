use crate::Activation;

/// One layer of neurons: per-neuron pre-activation input, post-activation output,
/// bias, and the gradient of each neuron output with respect to every network input.
///
/// A layer holds state only; the evaluation logic lives in [`crate::Network`].
#[derive(Debug, Clone)]
pub struct Layer {
    neurons: usize,
    is_input: bool,
    activation: Activation,
    inputs: Vec<f64>,
    outputs: Vec<f64>,
    biases: Vec<f64>,
    /// Row-major matrix with shape (neurons, n_network_inputs).
    gradients: Vec<f64>,
    gradient_width: usize,
}

impl Layer {
    #[inline]
    pub fn new(neurons: usize) -> Self {
        Self {
            neurons,
            is_input: false,
            activation: Activation::None,
            inputs: vec![0.0; neurons],
            outputs: vec![0.0; neurons],
            biases: vec![0.0; neurons],
            gradients: Vec::new(),
            gradient_width: 0,
        }
    }

    #[inline]
    pub(crate) fn new_input(neurons: usize) -> Self {
        Self {
            is_input: true,
            activation: Activation::Linear,
            ..Self::new(neurons)
        }
    }

    #[inline]
    pub fn neurons(&self) -> usize {
        self.neurons
    }

    #[inline]
    pub fn is_input(&self) -> bool {
        self.is_input
    }

    #[inline]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    #[inline]
    pub(crate) fn set_activation(&mut self, activation: Activation) {
        self.activation = activation;
    }

    #[inline]
    pub fn input(&self, neuron: usize) -> f64 {
        self.inputs[neuron]
    }

    #[inline]
    pub fn set_input(&mut self, neuron: usize, value: f64) {
        self.inputs[neuron] = value;
    }

    #[inline]
    pub fn output(&self, neuron: usize) -> f64 {
        self.outputs[neuron]
    }

    #[inline]
    pub fn set_output(&mut self, neuron: usize, value: f64) {
        self.outputs[neuron] = value;
    }

    #[inline]
    pub fn outputs(&self) -> &[f64] {
        &self.outputs
    }

    #[inline]
    pub fn bias(&self, neuron: usize) -> f64 {
        self.biases[neuron]
    }

    #[inline]
    pub fn set_bias(&mut self, neuron: usize, value: f64) {
        self.biases[neuron] = value;
    }

    #[inline]
    pub fn biases(&self) -> &[f64] {
        &self.biases
    }

    /// Number of network inputs each neuron tracks a gradient for.
    #[inline]
    pub fn gradient_width(&self) -> usize {
        self.gradient_width
    }

    /// `d(output[neuron]) / d(network input[input])`.
    #[inline]
    pub fn gradient(&self, neuron: usize, input: usize) -> f64 {
        self.gradients[neuron * self.gradient_width + input]
    }

    #[inline]
    pub fn set_gradient(&mut self, neuron: usize, input: usize, value: f64) {
        self.gradients[neuron * self.gradient_width + input] = value;
    }

    /// Gradient of one neuron with respect to all network inputs.
    #[inline]
    pub fn gradient_row(&self, neuron: usize) -> &[f64] {
        let start = neuron * self.gradient_width;
        &self.gradients[start..start + self.gradient_width]
    }

    #[inline]
    pub(crate) fn gradient_row_mut(&mut self, neuron: usize) -> &mut [f64] {
        let start = neuron * self.gradient_width;
        &mut self.gradients[start..start + self.gradient_width]
    }

    /// Size the gradient accumulator to `n_inputs` columns (zero-filled).
    pub(crate) fn size_gradients(&mut self, n_inputs: usize) {
        self.gradient_width = n_inputs;
        self.gradients = vec![0.0; self.neurons * n_inputs];
    }
}
