//! Two-node federated-learning loop: local training rounds, canonical
//! parameter packing, role-based weight exchange over the transfer layer and
//! the two-way averaging merge.

pub mod cropper;
pub mod dataset;
pub mod error;
pub mod round;

mod test;

pub use dataset::Dataset;
pub use error::{FederationErr, Result};
pub use round::{Federation, Role, RoundStats};
