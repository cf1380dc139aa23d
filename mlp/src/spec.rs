use crate::{MlpErr, Result};

/// Immutable ordered layer widths of a fixed-topology network.
///
/// The first width is the input width, the last the class count. The
/// topology never changes after construction; every buffer size in the
/// engine derives from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSpec {
    widths: Vec<usize>,
}

impl LayerSpec {
    /// Creates a new `LayerSpec`.
    ///
    /// # Arguments
    /// * `widths` - The layer widths, input first, classes last.
    ///
    /// # Returns
    /// The spec, or `Topology` if there are fewer than two layers or any
    /// width is zero.
    pub fn new(widths: Vec<usize>) -> Result<Self> {
        if widths.len() < 2 {
            return Err(MlpErr::Topology {
                detail: "a network needs at least an input and an output layer",
            });
        }

        if widths.iter().any(|&w| w == 0) {
            return Err(MlpErr::Topology {
                detail: "layer widths must be nonzero",
            });
        }

        Ok(Self { widths })
    }

    #[inline]
    pub fn input_width(&self) -> usize {
        self.widths[0]
    }

    /// Width of the output layer, one unit per class.
    #[inline]
    pub fn class_count(&self) -> usize {
        self.widths[self.widths.len() - 1]
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.widths.len()
    }

    #[inline]
    pub fn widths(&self) -> &[usize] {
        &self.widths
    }

    /// Total parameter count of the flat arena:
    /// `sum over l of (w_l + 1) * w_{l+1}`, one weight per input plus one
    /// bias per neuron.
    pub fn num_params(&self) -> usize {
        self.widths
            .windows(2)
            .map(|pair| (pair[0] + 1) * pair[1])
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_params_matches_topology() {
        let spec = LayerSpec::new(vec![4, 3, 2]).unwrap();
        assert_eq!(spec.num_params(), (4 + 1) * 3 + (3 + 1) * 2);
    }

    #[test]
    fn default_deployment_param_count() {
        // 32x32 patch, 10 hidden units, 4 classes.
        let spec = LayerSpec::new(vec![1024, 10, 4]).unwrap();
        assert_eq!(spec.num_params(), 10_294);
    }

    #[test]
    fn rejects_degenerate_topologies() {
        assert!(LayerSpec::new(vec![8]).is_err());
        assert!(LayerSpec::new(vec![8, 0, 2]).is_err());
    }

    #[test]
    fn accessors() {
        let spec = LayerSpec::new(vec![16, 8, 3]).unwrap();
        assert_eq!(spec.input_width(), 16);
        assert_eq!(spec.class_count(), 3);
        assert_eq!(spec.num_layers(), 3);
    }
}
