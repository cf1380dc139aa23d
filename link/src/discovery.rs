//! The initiator's connect handshake: scan for the peer advertising the
//! transfer service, connect, then retry attribute discovery under a fixed
//! bound with backoff. Exhausting the bound is the handshake's only
//! cancellation path besides the scan deadline.

use log::{debug, info, warn};
use tokio::time::{Instant, sleep};

use crate::{
    LinkConfig, LinkErr, Result,
    gatt::{LinkHandle, Radio, ServiceId},
};

/// Scans for and connects to the peer, returning a link with discovered
/// attributes.
///
/// # Arguments
/// * `radio` - The scanning radio.
/// * `service` - The service identifier the peer advertises.
/// * `cfg` - Retry bound, backoff and scan deadline.
///
/// # Returns
/// `ConnectionFailed` when discovery retries are exhausted, `TimedOut` when
/// no peer appears within the scan deadline.
pub async fn connect<R: Radio>(
    radio: &mut R,
    service: &ServiceId,
    cfg: &LinkConfig,
) -> Result<R::Link> {
    let deadline = Instant::now() + cfg.connect_timeout;
    info!("scanning for peer service {}", service.0);

    let mut link = loop {
        radio.service().await;

        if let Some(link) = radio.try_connect(service).await? {
            break link;
        }

        if Instant::now() >= deadline {
            return Err(LinkErr::TimedOut { what: "peer scan" });
        }
        sleep(cfg.poll_delay).await;
    };

    info!("peer connected, discovering attributes");

    for attempt in 1..=cfg.discovery_retries {
        if link.discover_attributes().await {
            debug!(attempt = attempt; "attributes discovered");
            return Ok(link);
        }

        warn!(attempt = attempt; "attribute discovery failed, backing off");
        sleep(cfg.discovery_backoff).await;
        link.service().await;
    }

    Err(LinkErr::ConnectionFailed {
        attempts: cfg.discovery_retries,
    })
}
