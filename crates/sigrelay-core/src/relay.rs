//! The relay: registry plus long-poll delivery.
//!
//! `receive` is the only operation that suspends. It races the peer's
//! mailbox against a cancellation future; whichever resolves first wins.
//! The waiting mark is held by a guard, so it is cleared on delivery, on
//! cancellation, and when the caller simply drops the future (a client
//! hanging up mid-poll).

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::mailbox::Mailbox;
use crate::peer::{Envelope, Peer, PeerId};
use crate::registry::{Registration, Registry, RegistryStats};
use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// In-memory rendezvous relay. Share it as `Arc<Relay>`.
#[derive(Debug)]
pub struct Relay {
    registry: Registry,
    config: RelayConfig,
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            registry: Registry::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn lookup(&self, id: PeerId) -> Option<Peer> {
        self.registry.lookup(id)
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    /// Sign a peer in. See [`Registration::body`] for the response text.
    pub fn register(&self, name: &str) -> Result<Registration> {
        let registration = self.registry.register(name)?;
        info!(
            peer = %registration.peer,
            role = %registration.peer.role,
            counterparts = registration.counterparts.len(),
            "sign-in"
        );
        if !registration.dropped_notifications.is_empty() {
            warn!(
                peer = %registration.peer,
                missed = registration.dropped_notifications.len(),
                "counterparts missed the presence notification"
            );
        }
        info!("{}", self.registry.stats());
        Ok(registration)
    }

    /// Sign a peer out.
    pub fn deregister(&self, id: PeerId) -> Result<Peer> {
        let removal = self.registry.deregister(id)?;
        info!(peer = %removal.peer, discarded = removal.discarded, "sign-out");
        for freed in &removal.freed {
            debug!(peer = %freed, "pairing cleared");
        }
        info!("{}", self.registry.stats());
        Ok(removal.peer)
    }

    /// Queue a message from `from` to `to`. Never blocks.
    pub fn send(&self, from: PeerId, to: PeerId, body: impl Into<Bytes>) -> Result<()> {
        let body = body.into();
        let len = body.len();
        let link = self.registry.route(from, to, body)?;
        if let Some(paired) = link.outside_pairing {
            warn!(
                from = %from,
                to = %to,
                paired_with = %paired,
                "peer sending message to recipient outside its pairing"
            );
        }
        debug!(from = %from, to = %to, bytes = len, "message queued");
        Ok(())
    }

    /// Wait for the next message for `id`.
    pub async fn receive(&self, id: PeerId) -> Result<Envelope> {
        self.receive_until(id, std::future::pending())
            .await?
            .ok_or_else(|| Error::unknown(id))
    }

    /// Wait for the next message for `id`, giving up when `cancel` resolves.
    ///
    /// Returns `Ok(None)` on cancellation. Fails with
    /// [`Error::UnknownPeer`] if the peer is not registered, or is removed
    /// while waiting.
    pub async fn receive_until<F>(&self, id: PeerId, cancel: F) -> Result<Option<Envelope>>
    where
        F: Future<Output = ()>,
    {
        let guard = WaitGuard::enter(&self.registry, id)?;
        let mailbox = Arc::clone(&guard.mailbox);
        debug!(peer = %id, "waiting");

        tokio::select! {
            biased;

            envelope = mailbox.recv() => {
                drop(guard);
                match envelope {
                    Some(envelope) => {
                        self.registry.touch(id);
                        debug!(peer = %id, from = %envelope.from, bytes = envelope.body.len(), "delivered");
                        Ok(Some(envelope))
                    }
                    None => {
                        debug!(peer = %id, "peer removed while waiting");
                        Err(Error::unknown(id))
                    }
                }
            }
            _ = cancel => {
                drop(guard);
                info!(peer = %id, "wait cancelled");
                Ok(None)
            }
        }
    }

    /// Evict peers idle past the configured timeout as of `now`. Peers with a
    /// suspended long-poll are kept no matter how old their last contact is.
    pub fn sweep(&self, now: Instant) -> Vec<Peer> {
        let removed = self.registry.evict_stale(now, self.config.idle_timeout);
        for removal in &removed {
            info!(peer = %removal.peer, idle = ?removal.peer.idle, "removing stale peer");
            for freed in &removal.freed {
                info!(peer = %freed, stale = %removal.peer.id, "disconnecting peer from stale counterpart");
            }
        }
        info!("{}", self.registry.stats());
        removed.into_iter().map(|r| r.peer).collect()
    }
}

/// Holds a peer's waiting mark for the duration of a long-poll.
struct WaitGuard<'a> {
    registry: &'a Registry,
    id: PeerId,
    mailbox: Arc<Mailbox>,
}

impl<'a> WaitGuard<'a> {
    fn enter(registry: &'a Registry, id: PeerId) -> Result<Self> {
        let mailbox = registry.begin_wait(id)?;
        Ok(Self {
            registry,
            id,
            mailbox,
        })
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.registry.end_wait(self.id);
    }
}
