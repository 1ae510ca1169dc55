//! # Voxel Combat Server Library
//!
//! The authoritative server for a turn-based puzzle game played with 3D
//! voxel pieces. Each match generates a random target shape, cuts it into
//! one piece per player, and then lets the players rebuild it turn by turn
//! by rotating and translating their pieces into shared units.
//!
//! ## Architecture
//!
//! ### Actors and Mailboxes
//! Every match, the hub and every connection own a processing loop and a
//! bounded [`mailbox`]. Actors only talk by sending commands into each
//! other's mailboxes, so match state is only ever touched by its own loop
//! and no locks are needed. A full mailbox makes the sender wait.
//!
//! ### Match Preparation
//! When a match fills up it grows a target with the [`generator`] and
//! partitions it with the [`splitter`]. Both run on a separate task so the
//! match keeps answering while they work; the result comes back through
//! the match's own mailbox.
//!
//! ### Transport
//! Clients speak line-delimited JSON over TCP. The wire types live in the
//! `shared` crate so a client can depend on them directly.
//!
//! ## Module Organization
//!
//! - [`generator`]: weighted flood-fill growth of connected target shapes
//! - [`splitter`]: lock-step partitioning of a shape into territories
//! - [`combat`]: the match state machine and its command set
//! - [`hub`]: the match registry and request routing
//! - [`network`]: TCP accept loop and per-connection read/write pumps
//! - [`player`], [`mailbox`], [`ids`]: the small pieces the actors share
//! - [`config`]: command-line configuration
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use server::combat::CombatSettings;
//! use server::hub::Hub;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (hub, handle) = Hub::new(CombatSettings::default(), 2, 2048, StdRng::from_entropy());
//!     tokio::spawn(hub.run());
//!
//!     let server = Server::bind("127.0.0.1:9003", handle, 8).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod combat;
pub mod config;
pub mod generator;
pub mod hub;
pub mod ids;
pub mod mailbox;
pub mod network;
pub mod player;
pub mod splitter;
