use std::{error::Error, fmt};

use link::LinkErr;
use mlp::MlpErr;

/// The federation loop's result type.
pub type Result<T> = std::result::Result<T, FederationErr>;

/// Round-level failures. None is fatal to the process: the caller retries
/// the whole round.
#[derive(Debug, PartialEq)]
pub enum FederationErr {
    Model(MlpErr),
    Link(LinkErr),
    Image { got: usize, expected: usize },
    EmptyDataset,
}

impl fmt::Display for FederationErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FederationErr::Model(e) => write!(f, "model error: {e}"),
            FederationErr::Link(e) => write!(f, "link error: {e}"),
            FederationErr::Image { got, expected } => {
                write!(f, "packed image is {got} bytes, expected {expected}")
            }
            FederationErr::EmptyDataset => write!(f, "cannot train a round on an empty dataset"),
        }
    }
}

impl Error for FederationErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FederationErr::Model(e) => Some(e),
            FederationErr::Link(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlpErr> for FederationErr {
    fn from(value: MlpErr) -> Self {
        Self::Model(value)
    }
}

impl From<LinkErr> for FederationErr {
    fn from(value: LinkErr) -> Self {
        Self::Link(value)
    }
}
