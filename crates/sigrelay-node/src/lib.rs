//! sigrelay node - HTTP front end for the signaling relay.
//!
//! Turns HTTP requests into relay operations and relay results back into
//! responses. All rendezvous state lives in [`sigrelay_core::Relay`].
//!
//! # Architecture
//!
//! - **Config**: environment-driven node settings
//! - **API**: `/sign_in`, `/sign_out`, `/message`, `/wait` plus common headers
//! - **Node**: listener, sweeper task and graceful shutdown
//!
//! # Example
//!
//! ```no_run
//! use sigrelay_node::{NodeConfig, RelayNode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::from_env()?;
//!     let node = RelayNode::new(config)?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod node;

pub use api::{build_router, AppState};
pub use config::NodeConfig;
pub use error::{Error, Result};
pub use node::RelayNode;
