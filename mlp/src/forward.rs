//! The forward pass: input transform, ReLU hidden layers and a stabilized
//! softmax output.

use crate::{MlpErr, Result, model::Model};

/// Maps raw input values to layer-0 post-activations.
///
/// Pure and deterministic; one policy is fixed per deployment at model
/// construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputTransform {
    /// `value / max`, e.g. `max = 255.0` for 8-bit grayscale.
    Scale { max: f32 },
    /// `1 - value`, for binary patches where the glyph pixels are 0.
    InvertBits,
}

impl InputTransform {
    #[inline]
    pub fn apply(self, value: f32) -> f32 {
        match self {
            InputTransform::Scale { max } => value / max,
            InputTransform::InvertBits => 1.0 - value,
        }
    }
}

impl Model {
    /// Runs one forward pass, updating every activation record.
    ///
    /// Parameters are never touched: the output is a deterministic function
    /// of the arena and `input`.
    ///
    /// # Arguments
    /// * `input` - Raw input values, one per input-layer unit.
    ///
    /// # Returns
    /// `SizeMismatch` if `input` does not match the input width.
    pub fn forward(&mut self, input: &[f32]) -> Result<()> {
        if input.len() != self.spec().input_width() {
            return Err(MlpErr::SizeMismatch {
                what: "input",
                got: input.len(),
                expected: self.spec().input_width(),
            });
        }

        let transform = self.transform;
        for (act, &raw) in self.acts[0].iter_mut().zip(input) {
            act.post = transform.apply(raw);
        }

        let nlayers = self.spec().num_layers();
        for layer in 1..nlayers {
            self.forward_layer(layer);
        }

        self.apply_softmax(nlayers - 1);
        Ok(())
    }

    /// Weighted sums plus ReLU for one layer. The output layer reuses the
    /// same pre-activations; its ReLU result is overwritten by the softmax.
    fn forward_layer(&mut self, layer: usize) {
        let Model {
            layout,
            arena,
            acts,
            ..
        } = self;

        let views = &layout.layer(layer).neurons;
        let (prev_slice, curr_slice) = acts.split_at_mut(layer);
        let prev = &prev_slice[layer - 1];
        let curr = &mut curr_slice[0];

        for (act, view) in curr.iter_mut().zip(views) {
            let mut sum = arena[view.bias];
            for (w, p) in arena[view.weights.clone()].iter().zip(prev.iter()) {
                sum += w * p.post;
            }
            act.pre = sum;
            act.post = sum.max(0.0);
        }
    }

    /// Stabilized softmax over `layer`'s pre-activations: subtract the row
    /// maximum before exponentiating, then normalize.
    fn apply_softmax(&mut self, layer: usize) {
        let outs = &mut self.acts[layer];

        let max = outs
            .iter()
            .map(|a| a.pre)
            .fold(f32::NEG_INFINITY, f32::max);

        let mut sum = 0.0;
        for act in outs.iter_mut() {
            act.post = (act.pre - max).exp();
            sum += act.post;
        }

        for act in outs.iter_mut() {
            act.post /= sum;
        }
    }

    /// The output distribution of the last forward pass.
    pub fn output(&self) -> Vec<f32> {
        self.acts[self.spec().num_layers() - 1]
            .iter()
            .map(|a| a.post)
            .collect()
    }

    /// Runs a forward pass and returns the most probable class.
    pub fn predict(&mut self, input: &[f32]) -> Result<usize> {
        self.forward(input)?;

        let outs = &self.acts[self.spec().num_layers() - 1];
        let mut best = 0;
        for (i, act) in outs.iter().enumerate() {
            if act.post > outs[best].post {
                best = i;
            }
        }
        Ok(best)
    }

    /// Cross-entropy of the last forward pass against `label`.
    pub fn cross_entropy(&self, label: usize) -> Result<f32> {
        if label >= self.spec().class_count() {
            return Err(MlpErr::InvalidLabel {
                got: label,
                classes: self.spec().class_count(),
            });
        }

        let p = self.acts[self.spec().num_layers() - 1][label].post;
        Ok(-(p.max(f32::MIN_POSITIVE)).ln())
    }
}
