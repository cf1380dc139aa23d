//! The chunked, length-prefixed transfer protocol.
//!
//! Header: one 4-byte little-endian signed integer, the total payload byte
//! count. Payload: the parameter buffer's bytes in canonical pack order,
//! split into fixed-size chunks sent back-to-back. There is no per-chunk
//! acknowledgement; reliability rests on the link being ordered and
//! lossless, plus the receiver's byte-count check against the declared
//! total. Completion is detected purely by count equality.

use log::debug;
use tokio::time::{Instant, sleep};

use crate::{
    HEADER_BYTES, LinkConfig, LinkErr, Result, VALUE_BYTES, barrier, gatt::LinkHandle,
};

// The wire is little-endian throughout. The framed path moves `f32` buffers
// by direct byte cast, which only matches the wire order on little-endian
// targets; the per-value mode converts explicitly and has no such
// restriction.
#[cfg(target_endian = "big")]
compile_error!("framed transfers cast f32 payloads directly and require a little-endian target");

/// Which endpoint a payload travels over. Write carries initiator to
/// responder traffic, Notify the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endpoint {
    Write,
    Notify,
}

pub(crate) async fn push<L: LinkHandle>(link: &mut L, ep: Endpoint, data: &[u8]) -> Result<usize> {
    match ep {
        Endpoint::Write => link.write(data).await,
        Endpoint::Notify => link.notify(data).await,
    }
}

pub(crate) fn pull<L: LinkHandle>(link: &mut L, ep: Endpoint, buf: &mut [u8]) -> Option<usize> {
    match ep {
        Endpoint::Write => link.take_written(buf),
        Endpoint::Notify => link.take_notified(buf),
    }
}

/// Cumulative receive progress; terminal exactly when the received count
/// reaches the expected total.
///
/// There is deliberately one counter for the whole receive loop: the loop's
/// exit condition reads the same counter every arrival advances.
#[derive(Debug)]
pub struct RecvProgress {
    expected: usize,
    received: usize,
}

impl RecvProgress {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            received: 0,
        }
    }

    /// Accounts for `n` more received bytes.
    ///
    /// # Returns
    /// `Protocol` if the cumulative count would exceed the expected total.
    pub fn advance(&mut self, n: usize) -> Result<()> {
        if self.received + n > self.expected {
            return Err(LinkErr::Protocol {
                what: "received bytes",
                got: self.received + n,
                expected: self.expected,
            });
        }
        self.received += n;
        Ok(())
    }

    #[inline]
    pub fn received(&self) -> usize {
        self.received
    }

    #[inline]
    pub fn done(&self) -> bool {
        self.received == self.expected
    }
}

/// Writes the header and the payload in fixed-size chunks, servicing the
/// link and pausing between writes so the link stack can drain.
pub(crate) async fn send_framed<L: LinkHandle>(
    link: &mut L,
    ep: Endpoint,
    cfg: &LinkConfig,
    payload: &[f32],
) -> Result<()> {
    let bytes: &[u8] = bytemuck::cast_slice(payload);
    let header = (bytes.len() as i32).to_le_bytes();

    let accepted = push(link, ep, &header).await?;
    if accepted != HEADER_BYTES {
        return Err(LinkErr::Protocol {
            what: "header write",
            got: accepted,
            expected: HEADER_BYTES,
        });
    }

    link.service().await;
    sleep(cfg.header_delay).await;

    let mut chunks = 0usize;
    for chunk in bytes.chunks(cfg.chunk_bytes) {
        let accepted = push(link, ep, chunk).await?;
        if accepted != chunk.len() {
            return Err(LinkErr::Protocol {
                what: "chunk write",
                got: accepted,
                expected: chunk.len(),
            });
        }

        chunks += 1;
        link.service().await;
        sleep(cfg.chunk_delay).await;
    }

    debug!(chunks = chunks, bytes = bytes.len(); "payload sent");
    Ok(())
}

/// Receives one framed payload into `out`, draining arrivals opportunistically.
///
/// The declared length must match `out` exactly; the receive loop exits when
/// the cumulative received count reaches it, errors if an arrival would
/// overshoot it, and gives up at the configured deadline or on disconnect.
pub(crate) async fn recv_framed<L: LinkHandle>(
    link: &mut L,
    ep: Endpoint,
    cfg: &LinkConfig,
    out: &mut [f32],
) -> Result<()> {
    let out_bytes: &mut [u8] = bytemuck::cast_slice_mut(out);
    let expected = out_bytes.len();
    let deadline = Instant::now() + cfg.recv_timeout;

    let mut header = [0u8; HEADER_BYTES];
    loop {
        link.service().await;

        if let Some(n) = pull(link, ep, &mut header) {
            if n != HEADER_BYTES {
                return Err(LinkErr::Protocol {
                    what: "header",
                    got: n,
                    expected: HEADER_BYTES,
                });
            }
            break;
        }

        if !link.connected() {
            return Err(LinkErr::Disconnected);
        }
        if Instant::now() >= deadline {
            return Err(LinkErr::TimedOut { what: "header" });
        }
        sleep(cfg.poll_delay).await;
    }

    let declared = i32::from_le_bytes(header);
    if declared < 0 || declared as usize != expected {
        return Err(LinkErr::Protocol {
            what: "declared payload length",
            got: declared.max(0) as usize,
            expected,
        });
    }

    let mut progress = RecvProgress::new(expected);
    while !progress.done() {
        link.service().await;

        let remaining = &mut out_bytes[progress.received()..];
        if let Some(n) = pull(link, ep, remaining) {
            if n > remaining.len() {
                return Err(LinkErr::Protocol {
                    what: "chunk",
                    got: n,
                    expected: remaining.len(),
                });
            }
            progress.advance(n)?;
            // Drain back-to-back arrivals before yielding again.
            continue;
        }

        if !link.connected() {
            return Err(LinkErr::Disconnected);
        }
        if Instant::now() >= deadline {
            return Err(LinkErr::TimedOut { what: "payload" });
        }
        sleep(cfg.poll_delay).await;
    }

    debug!(bytes = expected; "payload received");
    Ok(())
}

/// Narrow-bandwidth mode: every value is its own message unit.
pub(crate) async fn send_per_value<L: LinkHandle>(
    link: &mut L,
    ep: Endpoint,
    cfg: &LinkConfig,
    payload: &[f32],
) -> Result<()> {
    for &value in payload {
        let accepted = push(link, ep, &value.to_le_bytes()).await?;
        if accepted != VALUE_BYTES {
            return Err(LinkErr::Protocol {
                what: "value write",
                got: accepted,
                expected: VALUE_BYTES,
            });
        }

        link.service().await;
        sleep(cfg.chunk_delay).await;
    }
    Ok(())
}

/// Counterpart of [`send_per_value`]: counts valid receipts and completes
/// when the count reaches the statically known total, i.e. `out.len()`.
pub(crate) async fn recv_per_value<L: LinkHandle>(
    link: &mut L,
    ep: Endpoint,
    cfg: &LinkConfig,
    out: &mut [f32],
) -> Result<()> {
    let deadline = Instant::now() + cfg.recv_timeout;
    let mut count = 0;

    while count < out.len() {
        link.service().await;

        let mut buf = [0u8; VALUE_BYTES];
        if let Some(n) = pull(link, ep, &mut buf) {
            if n != VALUE_BYTES {
                return Err(LinkErr::Protocol {
                    what: "value",
                    got: n,
                    expected: VALUE_BYTES,
                });
            }
            out[count] = f32::from_le_bytes(buf);
            count += 1;
            continue;
        }

        if !link.connected() {
            return Err(LinkErr::Disconnected);
        }
        if Instant::now() >= deadline {
            return Err(LinkErr::TimedOut { what: "value stream" });
        }
        sleep(cfg.poll_delay).await;
    }

    Ok(())
}

/// The role that drives the schedule: it connects, signals the start of the
/// round and times every chunk write.
pub struct Initiator<'a, L: LinkHandle> {
    link: &'a mut L,
    cfg: &'a LinkConfig,
}

impl<'a, L: LinkHandle> Initiator<'a, L> {
    pub fn new(link: &'a mut L, cfg: &'a LinkConfig) -> Self {
        Self { link, cfg }
    }

    /// Signals the rendezvous barrier; the responder must observe this
    /// before any payload flows.
    pub async fn signal_start(&mut self) -> Result<()> {
        barrier::signal_start(self.link).await
    }

    /// Sends the local parameter buffer over the write endpoint.
    pub async fn send(&mut self, payload: &[f32]) -> Result<()> {
        send_framed(self.link, Endpoint::Write, self.cfg, payload).await
    }

    /// Receives the peer's parameter buffer from the notify endpoint.
    pub async fn recv(&mut self, out: &mut [f32]) -> Result<()> {
        recv_framed(self.link, Endpoint::Notify, self.cfg, out).await
    }

    /// Narrow-bandwidth variant of [`Initiator::send`].
    pub async fn send_per_value(&mut self, payload: &[f32]) -> Result<()> {
        send_per_value(self.link, Endpoint::Write, self.cfg, payload).await
    }

    /// Narrow-bandwidth variant of [`Initiator::recv`].
    pub async fn recv_per_value(&mut self, out: &mut [f32]) -> Result<()> {
        recv_per_value(self.link, Endpoint::Notify, self.cfg, out).await
    }
}

/// The passive role: it drains arrivals as they come and never drives
/// timing, except for pacing its own notify replies.
pub struct Responder<'a, L: LinkHandle> {
    link: &'a mut L,
    cfg: &'a LinkConfig,
}

impl<'a, L: LinkHandle> Responder<'a, L> {
    pub fn new(link: &'a mut L, cfg: &'a LinkConfig) -> Self {
        Self { link, cfg }
    }

    /// Blocks (servicing the link) until the initiator signals the barrier.
    pub async fn wait_start(&mut self) -> Result<()> {
        barrier::wait_start(self.link, self.cfg).await
    }

    /// Receives the initiator's parameter buffer from the write endpoint.
    pub async fn recv(&mut self, out: &mut [f32]) -> Result<()> {
        recv_framed(self.link, Endpoint::Write, self.cfg, out).await
    }

    /// Sends the local parameter buffer over the notify endpoint.
    pub async fn send(&mut self, payload: &[f32]) -> Result<()> {
        send_framed(self.link, Endpoint::Notify, self.cfg, payload).await
    }

    /// Narrow-bandwidth variant of [`Responder::recv`].
    pub async fn recv_per_value(&mut self, out: &mut [f32]) -> Result<()> {
        recv_per_value(self.link, Endpoint::Write, self.cfg, out).await
    }

    /// Narrow-bandwidth variant of [`Responder::send`].
    pub async fn send_per_value(&mut self, payload: &[f32]) -> Result<()> {
        send_per_value(self.link, Endpoint::Notify, self.cfg, payload).await
    }
}
