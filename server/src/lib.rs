//! # Game Server Library
//!
//! This library implements the authoritative server for the networked
//! code-guessing game. It owns every session's lifecycle, scores each
//! guess against the secret, and keeps the durable records the leaderboard
//! is built from.
//!
//! ## Core Responsibilities
//!
//! ### Session Authority
//! A player has at most one active session at any time. The server creates
//! sessions, accepts or rejects each trial by its number and deadline, and
//! terminates sessions on a win, on the trial cap, on timeout or on a
//! player's quit - archiving every one of them.
//!
//! ### Request Dispatch
//! Each inbound message is classified by its three-letter identifier and
//! routed through a per-player lock, so a re-sent datagram can never race
//! a fresh request for the same player into a half-applied state.
//!
//! ### Durable Records
//! Session records and score entries are small text files whose layout is
//! an external contract. The state machine recovers everything it needs
//! (expected trial number, secret, elapsed time) by re-reading the
//! player's record, so a restarted server picks up exactly where it left.
//!
//! ## Module Organization
//!
//! ### Store Module (`store`)
//! The flat-file session store: active records, per-player archives and
//! the score directory, plus the parsing for each record shape.
//!
//! ### Session Module (`session`)
//! The game rules. One function per command turns a decoded request plus
//! the stored session state into a response status.
//!
//! ### Dispatcher Module (`dispatcher`)
//! The command table, transport binding enforcement and the per-player
//! lock map.
//!
//! ### Secret Module (`secret`)
//! Secret generation behind a trait so tests can fix the sequence.
//!
//! ### Network Module (`network`)
//! The UDP datagram loop and the TCP accept loop, tied together by a
//! shutdown signal that force-archives whatever is still running.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::dispatcher::Dispatcher;
//! use server::network::Server;
//! use server::secret::RandomSecrets;
//! use server::session::GameService;
//! use server::store::SessionStore;
//! use std::path::Path;
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SessionStore::open(Path::new("./gamedata"))?;
//!     let service = GameService::new(store, Box::new(RandomSecrets));
//!     let dispatcher = Arc::new(Dispatcher::new(service));
//!
//!     let server = Server::bind("0.0.0.0:58013", dispatcher).await?;
//!     let (_shutdown, signal) = watch::channel(false);
//!     server.run(signal).await?;
//!     Ok(())
//! }
//! ```

pub mod dispatcher;
pub mod network;
pub mod secret;
pub mod session;
pub mod store;
