//! Peer registry.
//!
//! The registry is the single owner of all peer records. Every structural
//! change and every field update happens under one write lock, so compound
//! steps like "check capacity, then enqueue" or "check existence, then
//! remove" cannot interleave with a concurrent sign-out or sweep.

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::mailbox::{Mailbox, PushError};
use crate::pairing::{self, Link};
use crate::peer::{Envelope, Peer, PeerDescriptor, PeerId, Role};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub(crate) type PeerTable = HashMap<PeerId, PeerRecord>;

/// Mutable per-peer state, only reachable through the registry lock.
#[derive(Debug)]
pub(crate) struct PeerRecord {
    pub(crate) name: String,
    pub(crate) role: Role,
    pub(crate) mailbox: Arc<Mailbox>,
    pub(crate) connected_with: Option<PeerId>,
    pub(crate) last_contact: Instant,
    /// Number of suspended long-polls. The peer counts as waiting while > 0.
    pub(crate) waiters: usize,
}

impl PeerRecord {
    pub(crate) fn new(name: String, role: Role, capacity: usize, now: Instant) -> Self {
        Self {
            name,
            role,
            mailbox: Arc::new(Mailbox::new(capacity)),
            connected_with: None,
            last_contact: now,
            waiters: 0,
        }
    }

    fn descriptor(&self, id: PeerId) -> PeerDescriptor {
        PeerDescriptor {
            name: self.name.clone(),
            id,
        }
    }

    fn snapshot(&self, id: PeerId, now: Instant) -> Peer {
        Peer {
            id,
            name: self.name.clone(),
            role: self.role,
            connected_with: self.connected_with,
            idle: now.saturating_duration_since(self.last_contact),
            waiting: self.waiters > 0,
            queued: self.mailbox.len(),
        }
    }

    fn is_stale(&self, now: Instant, idle_timeout: Duration) -> bool {
        self.waiters == 0 && now.saturating_duration_since(self.last_contact) > idle_timeout
    }
}

/// Result of a successful sign-in.
#[derive(Debug, Clone)]
pub struct Registration {
    /// The new peer.
    pub peer: Peer,
    /// Available peers of the opposite role, in id order.
    pub counterparts: Vec<PeerDescriptor>,
    /// Counterparts whose presence notification was dropped (mailbox full).
    pub dropped_notifications: Vec<PeerId>,
}

impl Registration {
    /// Sign-in response body: own descriptor line, then one line per counterpart.
    pub fn body(&self) -> String {
        std::iter::once(self.peer.descriptor())
            .chain(self.counterparts.iter().cloned())
            .map(|d| d.line())
            .collect()
    }
}

/// A peer taken out of the registry.
#[derive(Debug, Clone)]
pub struct Removal {
    pub peer: Peer,
    /// Peers whose pairing pointed at the removed peer and was cleared.
    pub freed: Vec<PeerId>,
    /// Undelivered messages thrown away with the mailbox.
    pub discarded: usize,
}

/// Registry population by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    pub total: usize,
    pub responders: usize,
    pub initiators: usize,
    pub waiting: usize,
}

impl fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TotalPeers: {}, Responders: {}, Initiators: {}, Waiting: {}",
            self.total, self.responders, self.initiators, self.waiting
        )
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    peers: PeerTable,
    /// Last id handed out. Ids start at 1 and are never reused.
    last_id: u64,
}

/// Authoritative set of registered peers.
#[derive(Debug)]
pub struct Registry {
    inner: RwLock<RegistryInner>,
    mailbox_capacity: usize,
    responder_prefix: String,
}

impl Registry {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            mailbox_capacity: config.mailbox_capacity,
            responder_prefix: config.responder_prefix.clone(),
        }
    }

    /// Sign a peer in and announce it to every available counterpart.
    ///
    /// Presence notifications are best effort: a counterpart whose mailbox
    /// is full simply misses the announcement.
    pub fn register(&self, name: &str) -> Result<Registration> {
        if name.is_empty() {
            return Err(Error::InvalidName);
        }
        let role = Role::classify(name, &self.responder_prefix);
        let now = Instant::now();

        let mut inner = self.inner.write();
        inner.last_id += 1;
        let id = PeerId(inner.last_id);
        let record = PeerRecord::new(name.to_string(), role, self.mailbox_capacity, now);
        let own = record.descriptor(id);
        let peer = record.snapshot(id, now);
        inner.peers.insert(id, record);

        let announcement = Bytes::from(own.line());
        let mut counterparts = Vec::new();
        let mut dropped_notifications = Vec::new();
        for other in pairing::available_counterparts(&inner.peers, id) {
            let Some(rec) = inner.peers.get(&other) else {
                continue;
            };
            counterparts.push(rec.descriptor(other));
            if let Err(e) = rec.mailbox.try_push(Envelope::new(id, announcement.clone())) {
                warn!(peer = %rec.descriptor(other), reason = ?e, "dropped presence notification");
                dropped_notifications.push(other);
            }
        }

        Ok(Registration {
            peer,
            counterparts,
            dropped_notifications,
        })
    }

    /// Sign a peer out, clearing every pairing that pointed at it.
    pub fn deregister(&self, id: PeerId) -> Result<Removal> {
        let mut inner = self.inner.write();
        Self::remove_locked(&mut inner.peers, id).ok_or_else(|| Error::unknown(id))
    }

    fn remove_locked(peers: &mut PeerTable, id: PeerId) -> Option<Removal> {
        let record = peers.remove(&id)?;
        let freed = pairing::unlink(peers, id);
        let discarded = record.mailbox.close();
        Some(Removal {
            peer: record.snapshot(id, Instant::now()),
            freed,
            discarded,
        })
    }

    pub fn lookup(&self, id: PeerId) -> Option<Peer> {
        let now = Instant::now();
        self.inner.read().peers.get(&id).map(|p| p.snapshot(id, now))
    }

    pub fn len(&self) -> usize {
        self.inner.read().peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().peers.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.read();
        let mut stats = RegistryStats {
            total: inner.peers.len(),
            ..Default::default()
        };
        for peer in inner.peers.values() {
            match peer.role {
                Role::Responder => stats.responders += 1,
                Role::Initiator => stats.initiators += 1,
            }
            if peer.waiters > 0 {
                stats.waiting += 1;
            }
        }
        stats
    }

    /// Queue `body` for `to`, pairing the two peers if either is free.
    ///
    /// Pairing is recorded before the capacity check, so a send rejected
    /// with [`Error::MailboxFull`] still pairs the peers.
    pub fn route(&self, from: PeerId, to: PeerId, body: Bytes) -> Result<Link> {
        let mut inner = self.inner.write();
        let peers = &mut inner.peers;

        if !peers.contains_key(&to) {
            return Err(Error::unknown(to));
        }
        let sender = peers.get_mut(&from).ok_or_else(|| Error::unknown(from))?;
        sender.last_contact = Instant::now();

        let link = pairing::link(peers, from, to);
        if link.sender_paired || link.recipient_paired {
            info!(from = %from, to = %to, "connecting peers");
        }

        let recipient = peers.get(&to).ok_or_else(|| Error::unknown(to))?;
        match recipient.mailbox.try_push(Envelope::new(from, body)) {
            Ok(()) => Ok(link),
            Err(PushError::Full) => Err(Error::MailboxFull(to)),
            Err(PushError::Closed) => Err(Error::unknown(to)),
        }
    }

    /// Mark a long-poll as started and hand out the peer's mailbox.
    pub(crate) fn begin_wait(&self, id: PeerId) -> Result<Arc<Mailbox>> {
        let mut inner = self.inner.write();
        let peer = inner.peers.get_mut(&id).ok_or_else(|| Error::unknown(id))?;
        peer.waiters += 1;
        peer.last_contact = Instant::now();
        Ok(Arc::clone(&peer.mailbox))
    }

    /// Mark a long-poll as finished. A no-op if the peer is already gone.
    pub(crate) fn end_wait(&self, id: PeerId) {
        if let Some(peer) = self.inner.write().peers.get_mut(&id) {
            peer.waiters = peer.waiters.saturating_sub(1);
        }
    }

    /// Record contact from `id`. Returns false if the peer is unknown.
    pub fn touch(&self, id: PeerId) -> bool {
        match self.inner.write().peers.get_mut(&id) {
            Some(peer) => {
                peer.last_contact = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Remove every peer that is not waiting and has been silent for longer
    /// than `idle_timeout` as of `now`.
    pub fn evict_stale(&self, now: Instant, idle_timeout: Duration) -> Vec<Removal> {
        let mut inner = self.inner.write();
        let mut stale: Vec<PeerId> = inner
            .peers
            .iter()
            .filter(|(_, p)| p.is_stale(now, idle_timeout))
            .map(|(id, _)| *id)
            .collect();
        stale.sort_unstable();

        let mut removed = Vec::with_capacity(stale.len());
        for id in stale {
            match Self::remove_locked(&mut inner.peers, id) {
                Some(removal) => removed.push(removal),
                None => debug!(peer = %id, "stale peer vanished before eviction, skipping"),
            }
        }
        removed
    }
}
