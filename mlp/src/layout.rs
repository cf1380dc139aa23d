use std::ops::Range;

use crate::spec::LayerSpec;

/// One neuron's slots in the flat parameter arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeuronView {
    /// The incoming weights, in input order.
    pub weights: Range<usize>,
    /// The bias slot, immediately after the weights.
    pub bias: usize,
}

/// The views of every neuron in one trainable layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerLayout {
    pub neurons: Vec<NeuronView>,
    /// The whole layer's span in the arena.
    pub span: Range<usize>,
}

/// Maps the flat parameter arena into per-neuron weight and bias views.
///
/// The order is canonical and shared by the arena, the pack/unpack codec and
/// the wire format: for each layer past the input, for each neuron in
/// increasing index order, its weights in input order followed by its bias.
/// Packing and unpacking with any other order silently corrupts the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterLayout {
    trainable: Vec<LayerLayout>,
    total: usize,
}

impl ParameterLayout {
    /// Builds the layout for `spec`. This runs once per model; all views are
    /// fixed offsets from then on.
    pub fn new(spec: &LayerSpec) -> Self {
        let widths = spec.widths();
        let mut trainable = Vec::with_capacity(widths.len() - 1);
        let mut offset = 0;

        for pair in widths.windows(2) {
            let (fan_in, width) = (pair[0], pair[1]);
            let start = offset;
            let mut neurons = Vec::with_capacity(width);

            for _ in 0..width {
                neurons.push(NeuronView {
                    weights: offset..offset + fan_in,
                    bias: offset + fan_in,
                });
                offset += fan_in + 1;
            }

            trainable.push(LayerLayout {
                neurons,
                span: start..offset,
            });
        }

        Self {
            trainable,
            total: offset,
        }
    }

    #[inline]
    pub fn total_params(&self) -> usize {
        self.total
    }

    /// The views of model layer `layer` (1-based, the input layer has no
    /// parameters).
    #[inline]
    pub fn layer(&self, layer: usize) -> &LayerLayout {
        &self.trainable[layer - 1]
    }

    /// Sanity check: views must tile the arena contiguously in canonical
    /// order.
    pub fn validate(&self) {
        let mut cursor = 0;
        for layer in &self.trainable {
            assert_eq!(layer.span.start, cursor, "layer span must be contiguous");
            for neuron in &layer.neurons {
                assert_eq!(neuron.weights.start, cursor, "weights must be contiguous");
                assert_eq!(neuron.bias, neuron.weights.end, "bias must follow weights");
                cursor = neuron.bias + 1;
            }
            assert_eq!(layer.span.end, cursor, "layer span must close the layer");
        }
        assert_eq!(cursor, self.total, "views must cover the whole arena");
    }
}
