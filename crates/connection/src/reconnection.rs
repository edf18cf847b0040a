//! Link establishment and the fixed-interval reconnect loop.
//!
//! Contains the shared [`LinkContext`], the single `establish` path used by
//! both user-initiated connects and the retry loop, and the idempotent
//! reconnect scheduler. The retry policy is deliberately simple: a fixed
//! interval, no backoff, no attempt cap — the loop runs until the link comes
//! back or the consumer withdraws interest.

use std::net::Ipv4Addr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{RwLock, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::pumps::{read_pump, write_pump};
use crate::registry::HubRegistry;
use crate::types::{ConnectionError, ConnectionState, HubEvent};

/// Shared state handed to pumps and reconnect loops. Avoids threading half a
/// dozen `Arc` parameters through every spawn.
#[derive(Clone)]
pub(crate) struct LinkContext {
    pub registry: Arc<RwLock<HubRegistry>>,
    pub events_tx: mpsc::Sender<HubEvent>,
    pub port: u16,
    pub reconnect_interval: Duration,
}

/// Opens the persistent link for a hub, replacing any prior transport.
///
/// On success the entry holds the new writer and transport token, the read
/// and write pumps are running, a `Connected` event is out, and any pending
/// reconnect timer is cancelled. On failure the entry is `Disconnected` and
/// a reconnect is scheduled (a no-op when one is already pending).
pub(crate) async fn establish(
    ctx: &LinkContext,
    address: Ipv4Addr,
) -> Result<(), ConnectionError> {
    let generation = {
        let mut reg = ctx.registry.write().await;
        let entry = reg.entry_mut(address);
        entry.watched = true;
        // Exactly one live transport per address: kill the old one first.
        // The generation is bumped in the same critical section, so the
        // replaced pump's teardown is already stale while the new connect
        // is still in flight.
        entry.generation += 1;
        if let Some(old) = entry.transport.take() {
            old.cancel();
        }
        entry.writer = None;
        entry.state = ConnectionState::Connecting;
        entry.generation
    };
    debug!(hub = %address, port = ctx.port, "connecting");

    let stream = match TcpStream::connect((address, ctx.port)).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(hub = %address, error = %e, "connect failed");
            {
                let mut reg = ctx.registry.write().await;
                let entry = reg.entry_mut(address);
                entry.state = ConnectionState::Disconnected;
            }
            schedule_reconnect(ctx, address).await;
            return Err(e.into());
        }
    };

    let (read_half, write_half) = stream.into_split();
    let cancel = CancellationToken::new();
    let (write_tx, write_rx) = mpsc::channel::<String>(16);

    {
        let mut reg = ctx.registry.write().await;
        let entry = reg.entry_mut(address);
        entry.writer = Some(write_tx);
        entry.transport = Some(cancel.clone());
        entry.state = ConnectionState::Connected;
        // The loop (or a raced schedule) is obsolete the moment we are up.
        if let Some(timer) = entry.reconnect.take() {
            timer.cancel();
        }
    }

    info!(hub = %address, port = ctx.port, "connected");
    let _ = ctx.events_tx.send(HubEvent::Connected { address }).await;

    tokio::spawn(write_pump(address, write_half, write_rx, cancel.clone()));
    tokio::spawn(read_pump(address, read_half, ctx.clone(), cancel, generation));
    Ok(())
}

/// Teardown shared by every way a transport ends.
///
/// Called from the read pump when its link closes, errors, or is cancelled.
/// `generation` guards against a stale pump wiping the state of a
/// replacement link. A cancelled exit never reschedules — cancellation is
/// always deliberate (user disconnect, release, replacement, shutdown).
pub(crate) async fn on_transport_closed(
    ctx: &LinkContext,
    address: Ipv4Addr,
    generation: u64,
    was_cancelled: bool,
) {
    let reconnect = {
        let mut reg = ctx.registry.write().await;
        let Some(entry) = reg.get_mut(address) else {
            // Released while the pump was draining; release emitted the event.
            return;
        };
        if entry.generation != generation {
            return;
        }
        entry.writer = None;
        if let Some(token) = entry.transport.take() {
            token.cancel();
        }
        entry.state = ConnectionState::Disconnected;
        let manual = std::mem::take(&mut entry.manual_disconnect);
        !was_cancelled && !manual && entry.watched
    };

    let _ = ctx.events_tx.send(HubEvent::Disconnected { address }).await;

    if reconnect {
        schedule_reconnect(ctx, address).await;
    }
}

/// Starts the reconnect loop for an address, if none is pending.
///
/// Idempotent: a second call while a timer exists, or while a transport is
/// up, does nothing.
pub(crate) async fn schedule_reconnect(ctx: &LinkContext, address: Ipv4Addr) {
    let token = {
        let mut reg = ctx.registry.write().await;
        let Some(entry) = reg.get_mut(address) else {
            return;
        };
        if !entry.watched || entry.reconnect.is_some() || entry.transport.is_some() {
            return;
        }
        let token = CancellationToken::new();
        entry.reconnect = Some(token.clone());
        entry.state = ConnectionState::Reconnecting;
        token
    };

    info!(
        hub = %address,
        interval_ms = ctx.reconnect_interval.as_millis() as u64,
        "starting reconnect loop"
    );
    tokio::spawn(reconnect_loop(address, ctx.clone(), token));
}

/// Fixed-interval retry loop for one address.
///
/// Each tick re-checks that the hub is still of interest and that no
/// transport raced ahead, then attempts a connect. Success or interest
/// withdrawal ends the loop; failure just means another tick.
///
/// Returns a boxed future to break the type cycle with `establish`, which
/// spawns this loop from its failure path.
pub(crate) fn reconnect_loop(
    address: Ipv4Addr,
    ctx: LinkContext,
    cancel: CancellationToken,
) -> Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
    Box::pin(async move {
        let mut ticker = tokio::time::interval(ctx.reconnect_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(hub = %address, "reconnect cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            {
                let reg = ctx.registry.read().await;
                match reg.get(address) {
                    None => break,
                    Some(entry) if !entry.watched => break,
                    // Connection raced ahead of the timer.
                    Some(entry) if entry.transport.is_some() => break,
                    Some(_) => {}
                }
            }

            debug!(hub = %address, "attempting reconnect");
            match establish(&ctx, address).await {
                Ok(()) => {
                    // establish() took and cancelled our token.
                    info!(hub = %address, "reconnected");
                    return;
                }
                Err(e) => {
                    debug!(hub = %address, error = %e, "reconnect attempt failed");
                    let mut reg = ctx.registry.write().await;
                    if let Some(entry) = reg.get_mut(address) {
                        entry.state = ConnectionState::Reconnecting;
                    }
                }
            }

            if cancel.is_cancelled() {
                return;
            }
        }

        // Aborted without anyone cancelling us: clear our own token.
        if !cancel.is_cancelled() {
            let mut reg = ctx.registry.write().await;
            if let Some(entry) = reg.get_mut(address) {
                entry.reconnect = None;
                if entry.transport.is_none() && entry.state == ConnectionState::Reconnecting {
                    entry.state = ConnectionState::Disconnected;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ctx(interval: Duration) -> (LinkContext, mpsc::Receiver<HubEvent>) {
        let (events_tx, events_rx) = mpsc::channel(64);
        let ctx = LinkContext {
            registry: Arc::new(RwLock::new(HubRegistry::new())),
            events_tx,
            port: 1, // nothing listens on port 1
            reconnect_interval: interval,
        };
        (ctx, events_rx)
    }

    const HUB: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 1);

    #[tokio::test]
    async fn schedule_is_noop_without_an_entry() {
        let (ctx, _rx) = test_ctx(Duration::from_millis(50));
        schedule_reconnect(&ctx, HUB).await;
        assert!(ctx.registry.read().await.get(HUB).is_none());
    }

    #[tokio::test]
    async fn schedule_is_noop_for_unwatched_entry() {
        let (ctx, _rx) = test_ctx(Duration::from_millis(50));
        ctx.registry.write().await.entry_mut(HUB);
        schedule_reconnect(&ctx, HUB).await;
        assert!(ctx.registry.read().await.get(HUB).unwrap().reconnect.is_none());
    }

    #[tokio::test]
    async fn schedule_twice_keeps_one_timer() {
        let (ctx, _rx) = test_ctx(Duration::from_secs(60));
        ctx.registry.write().await.entry_mut(HUB).watched = true;

        schedule_reconnect(&ctx, HUB).await;
        let first = ctx
            .registry
            .read()
            .await
            .get(HUB)
            .unwrap()
            .reconnect
            .clone()
            .unwrap();

        schedule_reconnect(&ctx, HUB).await;
        let second = ctx
            .registry
            .read()
            .await
            .get(HUB)
            .unwrap()
            .reconnect
            .clone()
            .unwrap();

        // Second call must not have replaced the pending token.
        assert!(!first.is_cancelled());
        drop(second);
        first.cancel();
    }

    #[tokio::test]
    async fn schedule_sets_reconnecting_state() {
        let (ctx, _rx) = test_ctx(Duration::from_secs(60));
        ctx.registry.write().await.entry_mut(HUB).watched = true;
        schedule_reconnect(&ctx, HUB).await;
        assert_eq!(
            ctx.registry.read().await.state(HUB),
            Some(ConnectionState::Reconnecting)
        );
    }

    #[tokio::test]
    async fn loop_stops_when_entry_is_removed() {
        let (ctx, _rx) = test_ctx(Duration::from_millis(20));
        ctx.registry.write().await.entry_mut(HUB).watched = true;
        schedule_reconnect(&ctx, HUB).await;

        // Withdraw interest the way release() does.
        let removed = ctx.registry.write().await.remove(HUB).unwrap();
        removed.reconnect.unwrap().cancel();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(ctx.registry.read().await.get(HUB).is_none());
    }

    #[tokio::test]
    async fn stale_teardown_never_clobbers_a_replacement() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind((HUB, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let (events_tx, mut events_rx) = mpsc::channel(64);
        let ctx = LinkContext {
            registry: Arc::new(RwLock::new(HubRegistry::new())),
            events_tx,
            port,
            reconnect_interval: Duration::from_secs(60),
        };

        establish(&ctx, HUB).await.unwrap();
        let stale = ctx.registry.read().await.get(HUB).unwrap().generation;
        establish(&ctx, HUB).await.unwrap();

        // What the replaced pump runs once its cancelled read loop unwinds.
        // It must recognize itself as stale against the replacement link.
        on_transport_closed(&ctx, HUB, stale, true).await;

        {
            let reg = ctx.registry.read().await;
            let entry = reg.get(HUB).unwrap();
            assert_eq!(entry.state, ConnectionState::Connected);
            assert!(entry.transport.is_some());
            assert!(entry.writer.is_some());
        }

        // Two Connected events and nothing else: the stale teardown stays
        // silent instead of emitting a mid-replacement Disconnected.
        assert!(matches!(
            events_rx.try_recv(),
            Ok(HubEvent::Connected { .. })
        ));
        assert!(matches!(
            events_rx.try_recv(),
            Ok(HubEvent::Connected { .. })
        ));
        assert!(events_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn loop_aborts_when_transport_races_ahead() {
        let (ctx, _rx) = test_ctx(Duration::from_millis(20));
        {
            let mut reg = ctx.registry.write().await;
            let entry = reg.entry_mut(HUB);
            entry.watched = true;
        }
        schedule_reconnect(&ctx, HUB).await;

        // Simulate a connect that raced ahead of the timer.
        {
            let mut reg = ctx.registry.write().await;
            let entry = reg.get_mut(HUB).unwrap();
            entry.transport = Some(CancellationToken::new());
            entry.state = ConnectionState::Connected;
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        let reg = ctx.registry.read().await;
        let entry = reg.get(HUB).unwrap();
        assert!(entry.reconnect.is_none(), "loop cleared its own timer");
        assert_eq!(entry.state, ConnectionState::Connected);
    }
}
