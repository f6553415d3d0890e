//! # ircbot transport
//!
//! Line-oriented TCP transport: [`Connection`] reads framed lines with
//! [`IrcLineCodec`] and spawns a writer task draining the session's outbound
//! queue.

pub mod codec;
pub mod connection;

pub use codec::IrcLineCodec;
pub use connection::Connection;
