use std::{error::Error, fmt};

/// The transfer layer's result type.
pub type Result<T> = std::result::Result<T, LinkErr>;

/// Transfer-layer failures. None is fatal: every variant is recoverable by
/// retrying the enclosing federation round.
#[derive(Debug, PartialEq, Eq)]
pub enum LinkErr {
    /// Discovery/connect retries exhausted; the only built-in cancellation
    /// path of the connect handshake.
    ConnectionFailed { attempts: usize },
    /// A read or write moved a different byte count than the protocol
    /// expects, or the header declared an impossible length. Aborts the
    /// current transfer attempt; the caller decides whether to restart.
    Protocol {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// A wait loop outlived its deadline with the peer silent.
    TimedOut { what: &'static str },
    /// The peer connection dropped mid-operation.
    Disconnected,
}

impl fmt::Display for LinkErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkErr::ConnectionFailed { attempts } => {
                write!(f, "connection failed after {attempts} discovery attempts")
            }
            LinkErr::Protocol {
                what,
                got,
                expected,
            } => write!(f, "protocol error: {what} moved {got} bytes, expected {expected}"),
            LinkErr::TimedOut { what } => write!(f, "timed out waiting for {what}"),
            LinkErr::Disconnected => write!(f, "peer disconnected"),
        }
    }
}

impl Error for LinkErr {}
