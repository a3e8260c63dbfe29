//! Broker-internal error types

use thiserror::Error;

/// Errors surfaced by registry operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// CREATE_ROOM named a room that already exists
    #[error("room '{0}' already exists")]
    RoomExists(String),

    /// JOIN_ROOM, a datagram, or a reap pass named a room that does not exist
    #[error("room '{0}' not found")]
    RoomNotFound(String),

    /// JOIN_ROOM supplied a password that did not verify
    #[error("invalid password for room '{0}'")]
    InvalidPassword(String),
}

/// Errors surfaced while driving a single handshake connection
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// The reliable channel closed or errored before a full frame arrived
    #[error("connection io error: {0}")]
    Io(#[from] std::io::Error),

    /// A received frame failed to decode
    #[error("malformed frame: {0}")]
    Malformed(#[from] chatroom_wire::WireError),

    /// The handshake did not complete within its time budget
    #[error("handshake timed out")]
    Timeout,

    /// Declared `payload_size` exceeded the configured per-broker cap
    #[error("payload size {declared} exceeds configured maximum {max}")]
    PayloadTooLarge { declared: u64, max: u64 },

    /// `(operation, state)` did not match a state the handler dispatches
    #[error("unexpected handshake state: op={op:?} state={state:?}")]
    UnexpectedState {
        op: chatroom_wire::Operation,
        state: chatroom_wire::State,
    },
}

/// Top-level broker error, used for fatal startup failures
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
