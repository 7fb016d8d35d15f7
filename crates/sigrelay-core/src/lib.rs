//! sigrelay core - rendezvous state for the signaling relay.
//!
//! Peers sign in under a name, learn about available peers of the opposite
//! role, and exchange opaque messages through per-peer mailboxes until they
//! sign out or go silent.
//!
//! # Architecture
//!
//! - **Registry**: every registered peer behind a single lock, ids from a
//!   never-reused counter
//! - **Mailbox**: bounded FIFO per peer, non-blocking push, async receive
//! - **Pairing**: advisory one-to-one association set on first send
//! - **Relay**: the registry plus long-poll delivery with cancellation
//! - **Sweeper**: periodic eviction of idle peers that are not long-polling
//!
//! Nothing here knows about HTTP; the transport lives in `sigrelay-node`.
//!
//! # Example
//!
//! ```
//! use sigrelay_core::Relay;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> sigrelay_core::Result<()> {
//! let relay = Relay::default();
//! let alice = relay.register("alice")?;
//! let bob = relay.register("renderingserver_bob")?;
//! assert_eq!(bob.body(), "renderingserver_bob,2,1\nalice,1,1\n");
//!
//! relay.send(alice.peer.id, bob.peer.id, "offer")?;
//! let msg = relay.receive(bob.peer.id).await?;
//! assert_eq!(msg.from, alice.peer.id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod mailbox;
pub mod pairing;
pub mod peer;
pub mod registry;
pub mod relay;
pub mod sweeper;

pub use config::RelayConfig;
pub use error::{Error, Result};
pub use mailbox::{Mailbox, PushError};
pub use pairing::Link;
pub use peer::{Envelope, Peer, PeerDescriptor, PeerId, Role};
pub use registry::{Registration, Registry, RegistryStats, Removal};
pub use relay::Relay;
pub use sweeper::spawn_sweeper;
