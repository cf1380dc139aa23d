//! Fixed-topology multilayer perceptron engine: one contiguous parameter
//! arena, per-neuron views into it, stochastic gradient-descent training and
//! the canonical flat packing used for persistence and transfer.

pub mod codec;
pub mod error;
pub mod forward;
pub mod layout;
pub mod model;
pub mod spec;

mod backward;

pub use error::{MlpErr, Result};
pub use forward::InputTransform;
pub use model::Model;
pub use spec::LayerSpec;
