use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{InputTransform, Result, layout::ParameterLayout, spec::LayerSpec};

/// Default step length for the in-place gradient-descent update.
pub const DEFAULT_LEARNING_RATE: f32 = 0.001;

/// Weights are drawn uniformly from `[-WEIGHT_INIT_BOUND, WEIGHT_INIT_BOUND]`.
pub const WEIGHT_INIT_BOUND: f32 = 1.0;

/// Hidden biases start slightly positive so no unit is born behind a closed
/// ReLU gate. Output biases start at zero.
pub const HIDDEN_BIAS_INIT: f32 = 0.01;

/// Per-neuron activation record. Weight and bias storage lives in the shared
/// arena, not here.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Activation {
    pub pre: f32,
    pub post: f32,
    pub delta: f32,
}

/// A fixed-topology network: one contiguous parameter arena plus per-neuron
/// views into it, established once at construction.
///
/// Construction performs the only allocation the engine ever does; training,
/// inference and the codec all reuse this storage. The model is a plain
/// owned value passed to every operation, never hidden global state.
#[derive(Clone)]
pub struct Model {
    spec: LayerSpec,
    pub(crate) layout: ParameterLayout,
    pub(crate) arena: Vec<f32>,
    /// Activation records per layer; layer 0 only ever uses `post`.
    pub(crate) acts: Vec<Vec<Activation>>,
    /// Reusable one-hot target, sized to the class count.
    pub(crate) target: Vec<f32>,
    pub(crate) transform: InputTransform,
    pub(crate) learning_rate: f32,
}

impl Model {
    /// Creates and randomly initializes a model.
    ///
    /// # Arguments
    /// * `spec` - The layer topology.
    /// * `transform` - The input transform, fixed for the deployment.
    /// * `learning_rate` - The fixed step length for training updates.
    pub fn new(spec: LayerSpec, transform: InputTransform, learning_rate: f32) -> Self {
        Self::init(spec, transform, learning_rate, &mut rand::rng())
    }

    /// Like [`Model::new`] but with a deterministic generator, for tests and
    /// reproducible runs.
    pub fn seeded(
        spec: LayerSpec,
        transform: InputTransform,
        learning_rate: f32,
        seed: u64,
    ) -> Self {
        Self::init(spec, transform, learning_rate, &mut StdRng::seed_from_u64(seed))
    }

    fn init<R: Rng>(
        spec: LayerSpec,
        transform: InputTransform,
        learning_rate: f32,
        rng: &mut R,
    ) -> Self {
        let layout = ParameterLayout::new(&spec);
        let mut arena = vec![0.0; layout.total_params()];
        let output_layer = spec.num_layers() - 1;

        for layer in 1..spec.num_layers() {
            for neuron in &layout.layer(layer).neurons {
                for w in &mut arena[neuron.weights.clone()] {
                    *w = rng.random_range(-WEIGHT_INIT_BOUND..=WEIGHT_INIT_BOUND);
                }
                arena[neuron.bias] = if layer == output_layer {
                    0.0
                } else {
                    HIDDEN_BIAS_INIT
                };
            }
        }

        let acts = spec
            .widths()
            .iter()
            .map(|&w| vec![Activation::default(); w])
            .collect();

        Self {
            target: vec![0.0; spec.class_count()],
            spec,
            layout,
            arena,
            acts,
            transform,
            learning_rate,
        }
    }

    #[inline]
    pub fn spec(&self) -> &LayerSpec {
        &self.spec
    }

    #[inline]
    pub fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    #[inline]
    pub fn num_params(&self) -> usize {
        self.arena.len()
    }

    /// The flat parameters in canonical order.
    #[inline]
    pub fn params(&self) -> &[f32] {
        &self.arena
    }

    #[inline]
    pub(crate) fn params_mut(&mut self) -> &mut [f32] {
        &mut self.arena
    }

    /// Builds the one-hot target for `label` in the reusable buffer.
    ///
    /// # Returns
    /// `InvalidLabel` if `label` is outside the class range.
    pub(crate) fn set_target(&mut self, label: usize) -> Result<()> {
        if label >= self.spec.class_count() {
            return Err(crate::MlpErr::InvalidLabel {
                got: label,
                classes: self.spec.class_count(),
            });
        }

        self.target.fill(0.0);
        self.target[label] = 1.0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Model {
        let spec = LayerSpec::new(vec![4, 3, 2]).unwrap();
        Model::seeded(spec, InputTransform::InvertBits, DEFAULT_LEARNING_RATE, 7)
    }

    #[test]
    fn init_respects_bias_policy() {
        let m = model();
        let layout = m.layout().clone();

        for neuron in &layout.layer(1).neurons {
            assert_eq!(m.params()[neuron.bias], HIDDEN_BIAS_INIT);
        }
        for neuron in &layout.layer(2).neurons {
            assert_eq!(m.params()[neuron.bias], 0.0);
        }
    }

    #[test]
    fn init_bounds_weights() {
        let m = model();
        let layout = m.layout().clone();

        for layer in 1..m.spec().num_layers() {
            for neuron in &layout.layer(layer).neurons {
                for &w in &m.params()[neuron.weights.clone()] {
                    assert!(w.abs() <= WEIGHT_INIT_BOUND);
                }
            }
        }
    }

    #[test]
    fn seeded_models_are_reproducible() {
        let a = model();
        let b = model();
        assert_eq!(a.params(), b.params());
    }

    #[test]
    fn target_rejects_out_of_range_label() {
        let mut m = model();
        assert!(m.set_target(1).is_ok());
        assert!(matches!(
            m.set_target(2),
            Err(crate::MlpErr::InvalidLabel { got: 2, classes: 2 })
        ));
    }
}
