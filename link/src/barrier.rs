//! The rendezvous barrier: both peers must reach it before a transfer round
//! starts. The initiator writes a sentinel value on the control/write
//! endpoint; the responder polls for it, servicing the link every iteration.

use log::debug;
use tokio::time::{Instant, sleep};

use crate::{
    HEADER_BYTES, LinkConfig, LinkErr, Result, VALUE_BYTES,
    gatt::LinkHandle,
    transfer::{Endpoint, pull, push},
};

/// The value the initiator writes to release the barrier.
pub const START_SENTINEL: f32 = 1.0;

/// Releases the barrier from the initiating side.
pub async fn signal_start<L: LinkHandle>(link: &mut L) -> Result<()> {
    let accepted = push(link, Endpoint::Write, &START_SENTINEL.to_le_bytes()).await?;
    if accepted != VALUE_BYTES {
        return Err(LinkErr::Protocol {
            what: "barrier write",
            got: accepted,
            expected: VALUE_BYTES,
        });
    }

    link.service().await;
    debug!("barrier released");
    Ok(())
}

/// Blocks until the sentinel arrives from the peer.
///
/// Non-sentinel 4-byte values are ignored and the wait continues; arrivals
/// of any other size are protocol errors. The deadline bounds peer silence.
pub async fn wait_start<L: LinkHandle>(link: &mut L, cfg: &LinkConfig) -> Result<()> {
    let deadline = Instant::now() + cfg.recv_timeout;
    debug!("waiting at the barrier");

    loop {
        link.service().await;

        let mut buf = [0u8; HEADER_BYTES];
        if let Some(n) = pull(link, Endpoint::Write, &mut buf) {
            if n != VALUE_BYTES {
                return Err(LinkErr::Protocol {
                    what: "barrier signal",
                    got: n,
                    expected: VALUE_BYTES,
                });
            }

            if f32::from_le_bytes(buf) == START_SENTINEL {
                debug!("barrier passed");
                return Ok(());
            }
        }

        if !link.connected() {
            return Err(LinkErr::Disconnected);
        }
        if Instant::now() >= deadline {
            return Err(LinkErr::TimedOut { what: "barrier" });
        }
        sleep(cfg.poll_delay).await;
    }
}
