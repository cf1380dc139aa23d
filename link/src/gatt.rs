//! The link contract the protocol runs over: a connected GATT-style handle
//! with one write endpoint (initiator to responder, payload and control) and
//! one notify endpoint (responder to initiator), plus a scanning radio.

use crate::Result;

/// Identifier of the advertised transfer service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceId(pub &'static str);

/// The service the paired devices rendezvous on.
pub const WEIGHT_SERVICE: ServiceId = ServiceId("19b10000-e8f2-537e-4f6c-d104768a1214");

/// A connected point-to-point link.
///
/// The underlying channel is assumed ordered, lossless and
/// connection-oriented; the protocol adds no per-chunk acknowledgement on
/// top. `service` is the system's only suspension point and must be invoked
/// inside every wait loop, otherwise the link stack starves.
#[trait_variant::make(LinkHandle: Send)]
pub trait LocalLinkHandle {
    /// Services the link stack; non-blocking.
    async fn service(&mut self);

    /// True while the peer connection is up.
    fn connected(&self) -> bool;

    /// One attribute-discovery attempt. The initiator retries this under
    /// the configured bound after connecting.
    async fn discover_attributes(&mut self) -> bool;

    /// Writes to the peer's write endpoint.
    ///
    /// # Returns
    /// The byte count the link accepted; the protocol treats anything other
    /// than `data.len()` as a transient error.
    async fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Pushes a notification on the notify endpoint.
    ///
    /// # Returns
    /// The byte count the link accepted.
    async fn notify(&mut self, data: &[u8]) -> Result<usize>;

    /// Drains one pending inbound write, if any.
    ///
    /// Copies at most `buf.len()` bytes but always reports the full message
    /// length, so callers can detect oversized arrivals.
    fn take_written(&mut self, buf: &mut [u8]) -> Option<usize>;

    /// Drains one pending inbound notification, if any. Same contract as
    /// [`LocalLinkHandle::take_written`].
    fn take_notified(&mut self, buf: &mut [u8]) -> Option<usize>;
}

/// A scanning radio that can produce connected links.
#[trait_variant::make(Radio: Send)]
pub trait LocalRadio {
    type Link: LinkHandle + Send;

    /// Services the radio stack; non-blocking.
    async fn service(&mut self);

    /// One non-blocking scan step.
    ///
    /// # Returns
    /// A connected peer advertising `service`, if the scan has found one.
    async fn try_connect(&mut self, service: &ServiceId) -> Result<Option<Self::Link>>;
}
