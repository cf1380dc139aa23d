//! The backward pass: per-neuron error signals and immediate in-place
//! gradient-descent updates, one example at a time.

use crate::{Result, model::Model};

impl Model {
    /// Trains on a single labeled example: one-hot target, forward pass,
    /// then backpropagation with immediate updates.
    ///
    /// Stochastic by design; there is no batching.
    ///
    /// # Arguments
    /// * `input` - Raw input values, one per input-layer unit.
    /// * `label` - The true class index.
    ///
    /// # Returns
    /// `InvalidLabel` if `label` is out of range, `SizeMismatch` if `input`
    /// does not match the input width. The model is untouched on error.
    pub fn train_one(&mut self, input: &[f32], label: usize) -> Result<()> {
        self.set_target(label)?;
        self.forward(input)?;
        self.backward();
        Ok(())
    }

    fn backward(&mut self) {
        let out = self.spec().num_layers() - 1;

        // Output error: the closed-form combined softmax + cross-entropy
        // gradient.
        {
            let Model { acts, target, .. } = self;
            for (act, &t) in acts[out].iter_mut().zip(target.iter()) {
                act.delta = act.post - t;
            }
        }
        self.update_layer(out);

        // Hidden errors flow down from the layer above, gated by ReLU.
        // Each layer is updated before the one below reads its weights,
        // matching the engine's reference update order.
        for layer in (1..out).rev() {
            self.hidden_deltas(layer);
            self.update_layer(layer);
        }
    }

    fn hidden_deltas(&mut self, layer: usize) {
        let Model {
            layout,
            arena,
            acts,
            ..
        } = self;

        let next_views = &layout.layer(layer + 1).neurons;
        let (curr_slice, next_slice) = acts.split_at_mut(layer + 1);
        let curr = &mut curr_slice[layer];
        let next = &next_slice[0];

        for (n, act) in curr.iter_mut().enumerate() {
            if act.pre <= 0.0 {
                act.delta = 0.0;
                continue;
            }

            let mut sum = 0.0;
            for (view, above) in next_views.iter().zip(next.iter()) {
                sum += arena[view.weights.start + n] * above.delta;
            }
            act.delta = sum;
        }
    }

    /// `w[i] -= lr * delta * prev_post[i]`, `bias -= lr * delta`.
    fn update_layer(&mut self, layer: usize) {
        let lr = self.learning_rate;
        let Model {
            layout,
            arena,
            acts,
            ..
        } = self;

        let views = &layout.layer(layer).neurons;
        let prev = &acts[layer - 1];
        let curr = &acts[layer];

        for (view, act) in views.iter().zip(curr.iter()) {
            let step = lr * act.delta;
            for (w, p) in arena[view.weights.clone()].iter_mut().zip(prev.iter()) {
                *w -= step * p.post;
            }
            arena[view.bias] -= step;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        InputTransform, LayerSpec, MlpErr, Model, model::DEFAULT_LEARNING_RATE,
    };

    fn model(seed: u64) -> Model {
        let spec = LayerSpec::new(vec![4, 3, 2]).unwrap();
        Model::seeded(
            spec,
            InputTransform::Scale { max: 1.0 },
            DEFAULT_LEARNING_RATE,
            seed,
        )
    }

    #[test]
    fn one_step_decreases_cross_entropy() {
        let input = [1.0, 0.0, 0.0, 0.0];
        let label = 1;

        // The property must hold regardless of the starting point.
        for seed in 0..8 {
            let mut m = model(seed);

            m.forward(&input).unwrap();
            let before = m.cross_entropy(label).unwrap();

            m.train_one(&input, label).unwrap();

            m.forward(&input).unwrap();
            let after = m.cross_entropy(label).unwrap();

            assert!(
                after < before,
                "seed {seed}: loss went from {before} to {after}"
            );
        }
    }

    #[test]
    fn invalid_label_leaves_model_untouched() {
        let mut m = model(5);
        let before = m.params().to_vec();

        let err = m.train_one(&[1.0, 0.0, 0.0, 0.0], 9).unwrap_err();
        assert!(matches!(err, MlpErr::InvalidLabel { got: 9, classes: 2 }));
        assert_eq!(m.params(), &before[..]);
    }

    #[test]
    fn training_moves_parameters() {
        let mut m = model(5);
        let before = m.params().to_vec();

        m.train_one(&[0.0, 1.0, 1.0, 0.0], 0).unwrap();
        assert_ne!(m.params(), &before[..]);
    }

    #[test]
    fn repeated_training_converges_on_tiny_task() {
        let mut m = model(1);
        let samples = [([1.0, 0.0, 0.0, 0.0], 0), ([0.0, 0.0, 0.0, 1.0], 1)];

        for _ in 0..2000 {
            for (x, y) in &samples {
                m.train_one(x, *y).unwrap();
            }
        }

        for (x, y) in &samples {
            assert_eq!(m.predict(x).unwrap(), *y);
        }
    }
}
