//! Wire framing for the chat broker.
//!
//! Defines the reliable-channel handshake frame (a 32-byte header plus a
//! variable body) and the unreliable-channel datagram envelope, along with
//! the status/operation/state codes both channels share.

#![forbid(unsafe_code)]

pub mod codes;
pub mod credentials;
pub mod datagram;
pub mod error;
pub mod header;

pub use codes::{Operation, State, Status};
pub use credentials::Credentials;
pub use datagram::Datagram;
pub use error::WireError;
pub use header::Header;

/// Result type for wire-layer operations.
pub type Result<T> = std::result::Result<T, WireError>;
