use mlp::MlpErr;

use crate::Result;

/// An in-memory labeled patch set. Samples are visited one at a time, in
/// insertion order; there is no batching.
pub struct Dataset {
    input_width: usize,
    classes: usize,
    inputs: Vec<Vec<f32>>,
    labels: Vec<usize>,
}

impl Dataset {
    /// Creates an empty dataset for `classes` classes of `input_width`-wide
    /// samples.
    pub fn new(input_width: usize, classes: usize) -> Self {
        Self {
            input_width,
            classes,
            inputs: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Appends one labeled sample.
    ///
    /// # Returns
    /// `SizeMismatch` for a wrong input width, `InvalidLabel` for a label
    /// outside the class range.
    pub fn push(&mut self, input: Vec<f32>, label: usize) -> Result<()> {
        if input.len() != self.input_width {
            return Err(MlpErr::SizeMismatch {
                what: "sample",
                got: input.len(),
                expected: self.input_width,
            }
            .into());
        }
        if label >= self.classes {
            return Err(MlpErr::InvalidLabel {
                got: label,
                classes: self.classes,
            }
            .into());
        }

        self.inputs.push(input);
        self.labels.push(label);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[f32], usize)> {
        self.inputs
            .iter()
            .map(Vec::as_slice)
            .zip(self.labels.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_validates_shape_and_label() {
        let mut data = Dataset::new(4, 2);

        data.push(vec![0.0; 4], 1).unwrap();
        assert!(data.push(vec![0.0; 3], 1).is_err());
        assert!(data.push(vec![0.0; 4], 2).is_err());
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut data = Dataset::new(2, 3);
        data.push(vec![1.0, 0.0], 0).unwrap();
        data.push(vec![0.0, 1.0], 2).unwrap();

        let labels: Vec<usize> = data.iter().map(|(_, y)| y).collect();
        assert_eq!(labels, vec![0, 2]);
    }
}
