//! # Networking
//!
//! Server and client halves of the game connection plus the protocol they share.
//!
//! Each side holds one TCP stream per peer (handshake, chunk traffic) and one UDP
//! socket (inputs, look deltas, player snapshots). Every socket has its own blocking
//! reader thread; nothing here is async.

pub mod client;
pub mod protocol;
pub mod server;
