//! The weight codec: canonical flat packing of the parameter arena and the
//! two-way averaging merge used to reconcile paired models.
//!
//! The arena itself is stored in the canonical order (see
//! [`crate::layout::ParameterLayout`]), so packing is a straight copy — the
//! layout, not this module, carries the ordering invariant.

use crate::{MlpErr, Result, model::Model};

/// Serializes the model's parameters into `buf` in canonical order.
///
/// # Arguments
/// * `buf` - The destination transfer buffer; cleared and refilled.
///
/// # Returns
/// The element count, always equal to `model.num_params()`.
pub fn pack(model: &Model, buf: &mut Vec<f32>) -> usize {
    buf.clear();
    buf.extend_from_slice(model.params());
    buf.len()
}

/// Writes `buf` into the model's parameters, inverse of [`pack`].
///
/// All-or-nothing: on `SizeMismatch` the model is left bit-identical to its
/// pre-call state.
pub fn unpack(buf: &[f32], model: &mut Model) -> Result<()> {
    if buf.len() != model.num_params() {
        return Err(MlpErr::SizeMismatch {
            what: "transfer buffer",
            got: buf.len(),
            expected: model.num_params(),
        });
    }

    model.params_mut().copy_from_slice(buf);
    Ok(())
}

/// Merges remote parameters into the model by elementwise mean, writing the
/// result into *both* the model and `buf`.
///
/// Strictly a symmetric two-way, unweighted merge: both peers run it with
/// each other's buffer and converge to the same parameters. It does not
/// generalize to more peers or weight by local sample count.
pub fn average(buf: &mut [f32], model: &mut Model) -> Result<()> {
    if buf.len() != model.num_params() {
        return Err(MlpErr::SizeMismatch {
            what: "transfer buffer",
            got: buf.len(),
            expected: model.num_params(),
        });
    }

    for (remote, local) in buf.iter_mut().zip(model.params_mut()) {
        let mean = (*remote + *local) / 2.0;
        *remote = mean;
        *local = mean;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InputTransform, LayerSpec, model::DEFAULT_LEARNING_RATE};

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
    fn pack_unpack_round_trip() {
        let mut m = model(2);

        // Any buffer of the right length survives unpack followed by pack.
        let source: Vec<f32> = (0..m.num_params()).map(|i| i as f32 * 0.5 - 3.0).collect();
        unpack(&source, &mut m).unwrap();

        let mut packed = Vec::new();
        let count = pack(&m, &mut packed);

        assert_eq!(count, m.num_params());
        assert_eq!(packed, source);
    }

    #[test]
    fn unpack_rejects_short_buffer_atomically() {
        let mut m = model(2);
        let before = m.params().to_vec();

        let short = vec![0.0; m.num_params() - 1];
        let err = unpack(&short, &mut m).unwrap_err();

        assert!(matches!(err, MlpErr::SizeMismatch { .. }));
        // Bit-identical to the pre-call parameters.
        assert_eq!(m.params(), &before[..]);
    }

    #[test]
    fn average_of_equal_inputs_is_a_noop() {
        let mut m = model(4);
        let mut buf = Vec::new();
        pack(&m, &mut buf);
        let before = buf.clone();

        average(&mut buf, &mut m).unwrap();

        assert_eq!(buf, before);
        assert_eq!(m.params(), &before[..]);
    }

    #[test]
    fn average_writes_the_mean_into_both_sides() {
        let mut m = model(4);
        let local_before = m.params().to_vec();
        let mut buf: Vec<f32> = (0..m.num_params()).map(|i| i as f32).collect();
        let remote_before = buf.clone();

        average(&mut buf, &mut m).unwrap();

        for i in 0..m.num_params() {
            let mean = (local_before[i] + remote_before[i]) / 2.0;
            assert_eq!(buf[i], mean);
            assert_eq!(m.params()[i], mean);
        }
    }

    #[test]
    fn average_rejects_mismatched_buffer() {
        let mut m = model(4);
        let mut buf = vec![0.0; m.num_params() + 1];
        assert!(matches!(
            average(&mut buf, &mut m),
            Err(MlpErr::SizeMismatch { .. })
        ));
    }
}
