//! Pairing rules.
//!
//! Pairing is advisory: it decides who gets advertised to whom at sign-in
//! and records the first counterpart a peer talks to, but it never blocks a
//! send. All functions here run with the registry write lock held.

use crate::peer::PeerId;
use crate::registry::PeerTable;

/// Outcome of recording a send between two peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Link {
    /// The sender had no counterpart and is now paired with the recipient.
    pub sender_paired: bool,
    /// The recipient had no counterpart and is now paired with the sender.
    pub recipient_paired: bool,
    /// The sender is paired with someone other than the recipient.
    pub outside_pairing: Option<PeerId>,
}

/// Registered peers of the opposite role to `newcomer` that are not paired
/// yet, in id order.
pub(crate) fn available_counterparts(peers: &PeerTable, newcomer: PeerId) -> Vec<PeerId> {
    let Some(wanted) = peers.get(&newcomer).map(|p| p.role.opposite()) else {
        return Vec::new();
    };

    let mut ids: Vec<PeerId> = peers
        .iter()
        .filter(|(id, p)| **id != newcomer && p.role == wanted && p.connected_with.is_none())
        .map(|(id, _)| *id)
        .collect();
    ids.sort_unstable();
    ids
}

/// Lazily pair `from` and `to` on a send. Both ids must be present.
///
/// A peer sending to itself is delivered to but never paired with itself.
pub(crate) fn link(peers: &mut PeerTable, from: PeerId, to: PeerId) -> Link {
    let mut link = Link::default();
    if from == to {
        return link;
    }

    if let Some(sender) = peers.get_mut(&from) {
        match sender.connected_with {
            None => {
                sender.connected_with = Some(to);
                link.sender_paired = true;
            }
            Some(other) if other != to => link.outside_pairing = Some(other),
            Some(_) => {}
        }
    }

    if let Some(recipient) = peers.get_mut(&to) {
        if recipient.connected_with.is_none() {
            recipient.connected_with = Some(from);
            link.recipient_paired = true;
        }
    }

    link
}

/// Clear every pairing that points at `removed`. Returns the peers that
/// became available again.
pub(crate) fn unlink(peers: &mut PeerTable, removed: PeerId) -> Vec<PeerId> {
    let mut freed: Vec<PeerId> = peers
        .iter_mut()
        .filter(|(_, p)| p.connected_with == Some(removed))
        .map(|(id, p)| {
            p.connected_with = None;
            *id
        })
        .collect();
    freed.sort_unstable();
    freed
}
