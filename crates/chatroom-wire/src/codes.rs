//! Status, operation, and handshake-state byte codes shared by both channels

use crate::error::WireError;

/// Room-lifecycle operation requested by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create a new room
    CreateRoom,
    /// Join an existing room
    JoinRoom,
}

impl Operation {
    pub fn to_byte(self) -> u8 {
        match self {
            Self::CreateRoom => 1,
            Self::JoinRoom => 2,
        }
    }

    pub fn from_byte(b: u8) -> Result<Self, WireError> {
        match b {
            1 => Ok(Self::CreateRoom),
            2 => Ok(Self::JoinRoom),
            other => Err(WireError::UnknownCode {
                field: "operation",
                value: other,
            }),
        }
    }
}

/// Position within the three-phase handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Client's initial request
    Request,
    /// Broker's acknowledgement carrying a status byte
    Acknowledge,
    /// Broker's completion carrying the issued token
    Complete,
}

impl State {
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Request => 0,
            Self::Acknowledge => 1,
            Self::Complete => 2,
        }
    }

    pub fn from_byte(b: u8) -> Result<Self, WireError> {
        match b {
            0 => Ok(Self::Request),
            1 => Ok(Self::Acknowledge),
            2 => Ok(Self::Complete),
            other => Err(WireError::UnknownCode {
                field: "state",
                value: other,
            }),
        }
    }
}

/// Outcome reported in an Acknowledge frame's single-byte payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Request succeeded
    Success,
    /// CREATE_ROOM named a room that already exists
    RoomExists,
    /// JOIN_ROOM named a room that does not exist
    RoomNotFound,
    /// JOIN_ROOM supplied a password that did not verify
    InvalidPassword,
}

impl Status {
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::RoomExists => 1,
            Self::RoomNotFound => 2,
            Self::InvalidPassword => 3,
        }
    }

    pub fn from_byte(b: u8) -> Result<Self, WireError> {
        match b {
            0 => Ok(Self::Success),
            1 => Ok(Self::RoomExists),
            2 => Ok(Self::RoomNotFound),
            3 => Ok(Self::InvalidPassword),
            other => Err(WireError::UnknownCode {
                field: "status",
                value: other,
            }),
        }
    }
}
