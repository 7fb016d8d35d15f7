//! Peer identity, role classification and the wire descriptor format.

use bytes::Bytes;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Registry-assigned peer identifier.
///
/// Ids come from a monotonically increasing counter and are never reused
/// for the lifetime of a registry, so a stale `connected_with` can never
/// alias a newer peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PeerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(PeerId)
    }
}

/// Which side of a rendezvous a peer plays.
///
/// Responders are the long-lived endpoints (rendering servers); initiators
/// are the clients that look for one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    /// Classify a registration name. Names starting with `responder_prefix`
    /// are responders, everything else is an initiator.
    pub fn classify(name: &str, responder_prefix: &str) -> Self {
        if !responder_prefix.is_empty() && name.starts_with(responder_prefix) {
            Role::Responder
        } else {
            Role::Initiator
        }
    }

    /// The role a peer of this role gets paired with.
    pub fn opposite(self) -> Self {
        match self {
            Role::Initiator => Role::Responder,
            Role::Responder => Role::Initiator,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => f.write_str("initiator"),
            Role::Responder => f.write_str("responder"),
        }
    }
}

/// `name,id,1` – the line format clients parse from sign-in bodies and
/// presence notifications. The trailing `1` is a legacy flag kept as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDescriptor {
    pub name: String,
    pub id: PeerId,
}

impl PeerDescriptor {
    /// Descriptor followed by a newline.
    pub fn line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for PeerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},1", self.name, self.id)
    }
}

/// A queued message: opaque bytes plus the id of whoever sent them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from: PeerId,
    pub body: Bytes,
}

impl Envelope {
    pub fn new(from: PeerId, body: impl Into<Bytes>) -> Self {
        Self {
            from,
            body: body.into(),
        }
    }
}

/// Point-in-time view of a registered peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: PeerId,
    pub name: String,
    pub role: Role,
    /// Advisory pairing; `None` means available.
    pub connected_with: Option<PeerId>,
    /// Time since the peer last made a request.
    pub idle: Duration,
    /// True while at least one long-poll on this peer is suspended.
    pub waiting: bool,
    /// Messages queued and not yet fetched.
    pub queued: usize,
}

impl Peer {
    pub fn descriptor(&self) -> PeerDescriptor {
        PeerDescriptor {
            name: self.name.clone(),
            id: self.id,
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.connected_with {
            Some(other) => write!(f, "{}@{}[{}]", self.name, self.id, other),
            None => write!(f, "{}@{}[]", self.name, self.id),
        }
    }
}
