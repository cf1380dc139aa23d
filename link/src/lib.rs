//! Weight-exchange transfer layer: a GATT-style link abstraction, bounded
//! discovery, a rendezvous barrier and the chunked length-prefixed transfer
//! protocol, implemented symmetrically for an initiating and a responding
//! role.

pub mod barrier;
pub mod config;
pub mod discovery;
pub mod error;
pub mod gatt;
pub mod loopback;
pub mod transfer;


pub use config::LinkConfig;
pub use error::{LinkErr, Result};
pub use gatt::{LinkHandle, Radio, ServiceId};
pub use transfer::{Initiator, Responder};

/// Size of the length-prefix header and of one wire value.
pub const HEADER_BYTES: usize = 4;
pub const VALUE_BYTES: usize = size_of::<f32>();
