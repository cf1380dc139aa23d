use std::time::Duration;

/// Tunables of the transfer protocol and the connect handshake.
///
/// The defaults are sized for a BLE-class link: chunks stay under the
/// ~244-byte write limit and the inter-chunk delay gives the link stack room
/// to drain its buffers.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Payload bytes per chunk write.
    pub chunk_bytes: usize,
    /// Pause between chunk writes; respects the link's buffering limit.
    pub chunk_delay: Duration,
    /// Pause after the header write before the first chunk.
    pub header_delay: Duration,
    /// Per-iteration delay of every wait loop, between link services.
    pub poll_delay: Duration,
    /// Attribute-discovery attempts before giving up on a peer.
    pub discovery_retries: usize,
    /// Backoff between discovery attempts.
    pub discovery_backoff: Duration,
    /// Overall deadline for the scan/connect loop.
    pub connect_timeout: Duration,
    /// Overall deadline for receiving one payload or barrier signal.
    pub recv_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: 200,
            chunk_delay: Duration::from_millis(10),
            header_delay: Duration::from_millis(20),
            poll_delay: Duration::from_millis(5),
            discovery_retries: 20,
            discovery_backoff: Duration::from_millis(300),
            connect_timeout: Duration::from_secs(30),
            recv_timeout: Duration::from_secs(60),
        }
    }
}

impl LinkConfig {
    /// A configuration with negligible delays, for tests and loopback runs.
    pub fn fast() -> Self {
        Self {
            chunk_delay: Duration::ZERO,
            header_delay: Duration::ZERO,
            poll_delay: Duration::from_micros(50),
            discovery_backoff: Duration::from_millis(1),
            connect_timeout: Duration::from_secs(2),
            recv_timeout: Duration::from_secs(2),
            ..Self::default()
        }
    }
}
