//! # ircbot core
//!
//! Foundation types of the ircbot framework:
//!
//! - **Wire**: parsing inbound lines into [`Inbound`] events and formatting
//!   outbound commands ([`wire`]).
//! - **Session**: nick, server, joined channels and the outbound line queue
//!   ([`Session`], [`Outbound`]).
//! - **Errors**: connection errors shared with the transport ([`TransportError`]).
//!
//! Nothing here performs I/O. The transport crate owns the socket and drains
//! the [`Outbound`] queue.

pub mod error;
pub mod session;
pub mod wire;

pub use error::{TransportError, TransportResult};
pub use session::{Outbound, Session};
pub use wire::{Inbound, RawLine, is_broadcast};
