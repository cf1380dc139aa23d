//! An in-memory link pair with the same endpoint semantics as the real
//! radio: writes land in the peer's written queue, notifications in the
//! peer's notified queue, in order and without loss. Used by every protocol
//! test and by the two-node demo harness.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    task::yield_now,
};

use crate::{
    LinkErr, Result,
    gatt::{LinkHandle, Radio, ServiceId},
};

/// One end of an in-memory link pair.
#[derive(Debug)]
pub struct LoopbackLink {
    written_in: UnboundedReceiver<Vec<u8>>,
    notified_in: UnboundedReceiver<Vec<u8>>,
    write_out: UnboundedSender<Vec<u8>>,
    notify_out: UnboundedSender<Vec<u8>>,
    connected: Arc<AtomicBool>,

    // Fault injection knobs.
    write_cap: Option<usize>,
    discovery_failures: usize,

    writes_sent: usize,
    notifies_sent: usize,
}

/// Creates a connected pair sharing one connection flag; [`LoopbackLink::disconnect`]
/// on either end drops both.
pub fn pair() -> (LoopbackLink, LoopbackLink) {
    let (a_writes, b_written) = unbounded_channel();
    let (b_writes, a_written) = unbounded_channel();
    let (a_notifies, b_notified) = unbounded_channel();
    let (b_notifies, a_notified) = unbounded_channel();
    let connected = Arc::new(AtomicBool::new(true));

    let a = LoopbackLink {
        written_in: a_written,
        notified_in: a_notified,
        write_out: a_writes,
        notify_out: a_notifies,
        connected: Arc::clone(&connected),
        write_cap: None,
        discovery_failures: 0,
        writes_sent: 0,
        notifies_sent: 0,
    };

    let b = LoopbackLink {
        written_in: b_written,
        notified_in: b_notified,
        write_out: b_writes,
        notify_out: b_notifies,
        connected,
        write_cap: None,
        discovery_failures: 0,
        writes_sent: 0,
        notifies_sent: 0,
    };

    (a, b)
}

impl LoopbackLink {
    /// Caps how many bytes a single write is accepted for, to provoke short
    /// writes.
    pub fn cap_writes(&mut self, cap: usize) {
        self.write_cap = Some(cap);
    }

    /// Makes the next `n` attribute-discovery attempts fail.
    pub fn fail_discoveries(&mut self, n: usize) {
        self.discovery_failures = n;
    }

    /// Drops the connection without consuming the link.
    pub fn disconnect(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Messages sent on the write endpoint so far.
    pub fn writes_sent(&self) -> usize {
        self.writes_sent
    }

    /// Messages sent on the notify endpoint so far.
    pub fn notifies_sent(&self) -> usize {
        self.notifies_sent
    }

    fn push(
        out: &UnboundedSender<Vec<u8>>,
        cap: Option<usize>,
        data: &[u8],
    ) -> Result<usize> {
        let accepted = cap.map_or(data.len(), |c| c.min(data.len()));
        out.send(data[..accepted].to_vec())
            .map_err(|_| LinkErr::Disconnected)?;
        Ok(accepted)
    }

    fn take(queue: &mut UnboundedReceiver<Vec<u8>>, buf: &mut [u8]) -> Option<usize> {
        let msg = queue.try_recv().ok()?;
        let n = msg.len().min(buf.len());
        buf[..n].copy_from_slice(&msg[..n]);
        Some(msg.len())
    }
}

impl LinkHandle for LoopbackLink {
    async fn service(&mut self) {
        // The loopback "stack" has nothing to drive; yielding keeps the
        // cooperative contract so paired tasks make progress.
        yield_now().await;
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn discover_attributes(&mut self) -> bool {
        yield_now().await;
        if self.discovery_failures > 0 {
            self.discovery_failures -= 1;
            return false;
        }
        true
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        if !self.connected() {
            return Err(LinkErr::Disconnected);
        }
        let n = Self::push(&self.write_out, self.write_cap, data)?;
        self.writes_sent += 1;
        Ok(n)
    }

    async fn notify(&mut self, data: &[u8]) -> Result<usize> {
        if !self.connected() {
            return Err(LinkErr::Disconnected);
        }
        let n = Self::push(&self.notify_out, None, data)?;
        self.notifies_sent += 1;
        Ok(n)
    }

    fn take_written(&mut self, buf: &mut [u8]) -> Option<usize> {
        Self::take(&mut self.written_in, buf)
    }

    fn take_notified(&mut self, buf: &mut [u8]) -> Option<usize> {
        Self::take(&mut self.notified_in, buf)
    }
}

/// A radio that advertises one pre-paired link, after a configurable number
/// of empty scan polls.
pub struct LoopbackRadio {
    advertised: ServiceId,
    link: Option<LoopbackLink>,
    polls_until_found: usize,
}

impl LoopbackRadio {
    pub fn new(advertised: ServiceId, link: LoopbackLink) -> Self {
        Self {
            advertised,
            link: Some(link),
            polls_until_found: 0,
        }
    }

    /// The peer only shows up after `polls` scan iterations.
    pub fn appear_after(mut self, polls: usize) -> Self {
        self.polls_until_found = polls;
        self
    }
}

impl Radio for LoopbackRadio {
    type Link = LoopbackLink;

    async fn service(&mut self) {
        yield_now().await;
    }

    async fn try_connect(&mut self, service: &ServiceId) -> Result<Option<LoopbackLink>> {
        if *service != self.advertised {
            return Ok(None);
        }
        if self.polls_until_found > 0 {
            self.polls_until_found -= 1;
            return Ok(None);
        }
        Ok(self.link.take())
    }
}
