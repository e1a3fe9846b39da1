//! # Game Client Library
//!
//! The player-facing side of the networked code-guessing game: an
//! interactive console that turns typed commands into protocol requests
//! and renders the server's answers.
//!
//! ## Module Organization
//!
//! ### Commands Module (`commands`)
//! Console command parsing plus the loop that drives one game: local
//! validation, trial numbering and user-facing output.
//!
//! ### Network Module (`network`)
//! Transport for one server: UDP exchanges with bounded identical
//! re-sends and a receive timeout per attempt, and one-shot TCP exchanges
//! under read/write deadlines for the file-carrying commands.
//!
//! ### Player Module (`player`)
//! The little state the client keeps between commands: the player ID in
//! use and the next trial number.

pub mod commands;
pub mod network;
pub mod player;
