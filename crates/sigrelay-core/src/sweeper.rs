//! Background eviction of silent peers.

use crate::relay::Relay;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Run [`Relay::sweep`] every `sweep_interval` until `shutdown` flips to
/// `true` or its sender is dropped.
pub fn spawn_sweeper(relay: Arc<Relay>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    let period = relay.config().sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; the registry is empty at startup.
        ticker.tick().await;
        info!(?period, "stale peer sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!("checking for stale peers");
                    relay.sweep(Instant::now());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("stale peer sweeper stopped");
    })
}
