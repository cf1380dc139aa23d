use std::{error::Error, fmt};

/// The engine's result type.
pub type Result<T> = std::result::Result<T, MlpErr>;

/// Failures of the network engine.
#[derive(Debug, PartialEq, Eq)]
pub enum MlpErr {
    Topology {
        detail: &'static str,
    },
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidLabel {
        got: usize,
        classes: usize,
    },
}

impl fmt::Display for MlpErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlpErr::Topology { detail } => write!(f, "invalid layer topology: {detail}"),
            MlpErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(f, "{what} length mismatch: got {got}, expected {expected}"),
            MlpErr::InvalidLabel { got, classes } => {
                write!(f, "label {got} is outside the class range 0..{classes}")
            }
        }
    }
}

impl Error for MlpErr {}
