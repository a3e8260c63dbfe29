//! The 32-byte reliable-channel frame header
//!
//! `room_name_size(1) | operation(1) | state(1) | payload_size(29, big-endian)`
//! followed by `room_name_size` bytes of room name and `payload_size` bytes
//! of payload. The 29-byte length field is native to the wire format this
//! broker interoperates with; this implementation only ever produces or
//! accepts values that fit in a `u64` (the leading 21 bytes are always zero).

use crate::codes::{Operation, State};
use crate::error::WireError;

pub const HEADER_LEN: usize = 32;
const PAYLOAD_SIZE_FIELD_LEN: usize = 29;

/// A safety cap on `payload_size`, independent of the wire's 29-byte width.
/// Protects the broker from allocating gigabytes on a single malicious frame.
pub const MAX_PAYLOAD_SIZE: u64 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub room_name_size: u8,
    pub operation: Operation,
    pub state: State,
    pub payload_size: u64,
}

impl Header {
    pub fn new(room_name_size: u8, operation: Operation, state: State, payload_size: u64) -> Self {
        Self {
            room_name_size,
            operation,
            state,
            payload_size,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = self.room_name_size;
        out[1] = self.operation.to_byte();
        out[2] = self.state.to_byte();
        out[3 + PAYLOAD_SIZE_FIELD_LEN - 8..3 + PAYLOAD_SIZE_FIELD_LEN]
            .copy_from_slice(&self.payload_size.to_be_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::Truncated {
                needed: HEADER_LEN,
                actual: buf.len(),
            });
        }
        let room_name_size = buf[0];
        if room_name_size == 0 {
            return Err(WireError::InvalidLength {
                field: "room_name_size",
                value: 0,
            });
        }
        let operation = Operation::from_byte(buf[1])?;
        let state = State::from_byte(buf[2])?;

        let size_field = &buf[3..3 + PAYLOAD_SIZE_FIELD_LEN];
        let (leading, trailing) = size_field.split_at(PAYLOAD_SIZE_FIELD_LEN - 8);
        if leading.iter().any(|&b| b != 0) {
            return Err(WireError::InvalidLength {
                field: "payload_size",
                value: usize::MAX,
            });
        }
        let mut trailing8 = [0u8; 8];
        trailing8.copy_from_slice(trailing);
        let payload_size = u64::from_be_bytes(trailing8);
        if payload_size > MAX_PAYLOAD_SIZE {
            return Err(WireError::InvalidLength {
                field: "payload_size",
                value: payload_size as usize,
            });
        }

        Ok(Self {
            room_name_size,
            operation,
            state,
            payload_size,
        })
    }

    /// Total bytes of body (room name + payload) that follow this header
    pub fn body_len(&self) -> usize {
        self.room_name_size as usize + self.payload_size as usize
    }
}

/// Split a decoded body into `(room_name, payload)`
pub fn split_body(header: &Header, body: &[u8]) -> Result<(&str, &[u8]), WireError> {
    if body.len() < header.body_len() {
        return Err(WireError::Truncated {
            needed: header.body_len(),
            actual: body.len(),
        });
    }
    let (name_bytes, rest) = body.split_at(header.room_name_size as usize);
    let payload = &rest[..header.payload_size as usize];
    let room_name =
        std::str::from_utf8(name_bytes).map_err(|_| WireError::InvalidUtf8("room_name"))?;
    Ok((room_name, payload))
}

/// Encode a full REQUEST frame (header + room name + JSON credential payload)
pub fn encode_request(room_name: &str, operation: Operation, payload: &[u8]) -> Vec<u8> {
    let header = Header::new(
        room_name.len() as u8,
        operation,
        State::Request,
        payload.len() as u64,
    );
    let mut out = Vec::with_capacity(HEADER_LEN + header.body_len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(room_name.as_bytes());
    out.extend_from_slice(payload);
    out
}

/// Encode an ACKNOWLEDGE frame: header + room name + single status byte
pub fn encode_acknowledge(room_name: &str, operation: Operation, status_byte: u8) -> Vec<u8> {
    let header = Header::new(room_name.len() as u8, operation, State::Acknowledge, 1);
    let mut out = Vec::with_capacity(HEADER_LEN + header.body_len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(room_name.as_bytes());
    out.push(status_byte);
    out
}

/// Encode a COMPLETE frame: header + room name + token bytes
pub fn encode_complete(room_name: &str, operation: Operation, token: &str) -> Vec<u8> {
    let header = Header::new(
        room_name.len() as u8,
        operation,
        State::Complete,
        token.len() as u64,
    );
    let mut out = Vec::with_capacity(HEADER_LEN + header.body_len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(room_name.as_bytes());
    out.extend_from_slice(token.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = Header::new(5, Operation::JoinRoom, State::Request, 42);
        let encoded = header.encode();
        assert_eq!(encoded.len(), HEADER_LEN);
        let decoded = Header::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn zero_room_name_size_is_rejected() {
        let header = Header::new(0, Operation::CreateRoom, State::Request, 0);
        let encoded = header.encode();
        assert!(Header::decode(&encoded).is_err());
    }

    #[test]
    fn truncated_header_is_rejected() {
        assert!(Header::decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let header = Header::new(1, Operation::CreateRoom, State::Request, MAX_PAYLOAD_SIZE + 1);
        let encoded = header.encode();
        assert!(Header::decode(&encoded).is_err());
    }

    #[test]
    fn split_body_extracts_name_and_payload() {
        let request = encode_request("lobby", Operation::CreateRoom, br#"{"username":"a"}"#);
        let header = Header::decode(&request[..HEADER_LEN]).unwrap();
        let (name, payload) = split_body(&header, &request[HEADER_LEN..]).unwrap();
        assert_eq!(name, "lobby");
        assert_eq!(payload, br#"{"username":"a"}"#);
    }

    #[test]
    fn acknowledge_and_complete_frames_encode_expected_shape() {
        let ack = encode_acknowledge("lobby", Operation::JoinRoom, 3);
        let header = Header::decode(&ack[..HEADER_LEN]).unwrap();
        assert_eq!(header.state, State::Acknowledge);
        assert_eq!(header.payload_size, 1);

        let complete = encode_complete("lobby", Operation::JoinRoom, "tok-123");
        let header = Header::decode(&complete[..HEADER_LEN]).unwrap();
        assert_eq!(header.state, State::Complete);
        assert_eq!(header.payload_size, 7);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_operation() -> impl Strategy<Value = Operation> {
        prop_oneof![Just(Operation::CreateRoom), Just(Operation::JoinRoom)]
    }

    fn any_state() -> impl Strategy<Value = State> {
        prop_oneof![
            Just(State::Request),
            Just(State::Acknowledge),
            Just(State::Complete),
        ]
    }

    proptest! {
        #[test]
        fn header_round_trips_for_any_legal_quadruple(
            room_name_size in 1u8..=255,
            operation in any_operation(),
            state in any_state(),
            payload_size in 0u64..=MAX_PAYLOAD_SIZE,
        ) {
            let header = Header::new(room_name_size, operation, state, payload_size);
            let decoded = Header::decode(&header.encode()).unwrap();
            prop_assert_eq!(decoded, header);
        }

        #[test]
        fn split_body_recovers_arbitrary_room_name(name in "[a-zA-Z0-9_]{1,255}") {
            let request = encode_request(&name, Operation::CreateRoom, b"payload");
            let header = Header::decode(&request[..HEADER_LEN]).unwrap();
            let (decoded_name, payload) = split_body(&header, &request[HEADER_LEN..]).unwrap();
            prop_assert_eq!(decoded_name, name.as_str());
            prop_assert_eq!(payload, b"payload");
        }
    }
}
