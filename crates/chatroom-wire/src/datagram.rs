//! The unreliable-channel datagram envelope
//!
//! `room_name_size(1) | token_size(1) | room_name | token | message`

use crate::error::WireError;

/// Maximum datagram size this broker will read or write
pub const MAX_DATAGRAM_SIZE: usize = 4096;
const MIN_DATAGRAM_SIZE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub room_name: String,
    pub token: String,
    pub message: String,
}

impl Datagram {
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < MIN_DATAGRAM_SIZE {
            return Err(WireError::Truncated {
                needed: MIN_DATAGRAM_SIZE,
                actual: data.len(),
            });
        }
        let room_name_size = data[0] as usize;
        let token_size = data[1] as usize;
        let header_len = 2 + room_name_size + token_size;
        if data.len() < header_len {
            return Err(WireError::Truncated {
                needed: header_len,
                actual: data.len(),
            });
        }

        let room_name = std::str::from_utf8(&data[2..2 + room_name_size])
            .map_err(|_| WireError::InvalidUtf8("room_name"))?
            .to_string();
        let token = std::str::from_utf8(&data[2 + room_name_size..header_len])
            .map_err(|_| WireError::InvalidUtf8("token"))?
            .to_string();
        let message = std::str::from_utf8(&data[header_len..])
            .map_err(|_| WireError::InvalidUtf8("message"))?
            .to_string();

        Ok(Self {
            room_name,
            token,
            message,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            2 + self.room_name.len() + self.token.len() + self.message.len(),
        );
        out.push(self.room_name.len() as u8);
        out.push(self.token.len() as u8);
        out.extend_from_slice(self.room_name.as_bytes());
        out.extend_from_slice(self.token.as_bytes());
        out.extend_from_slice(self.message.as_bytes());
        out
    }

    /// Encode a bare broker-originated system message with no routing header
    /// (the relay loop sends these directly to a resolved `(ip, port)` once
    /// it already knows the recipient; no room/token prefix is needed).
    pub fn encode_plain_message(message: &str) -> Vec<u8> {
        message.as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let dgram = Datagram {
            room_name: "lobby".to_string(),
            token: "tok-123".to_string(),
            message: "hello there".to_string(),
        };
        let encoded = dgram.encode();
        assert_eq!(Datagram::decode(&encoded).unwrap(), dgram);
    }

    #[test]
    fn too_short_is_rejected() {
        assert!(Datagram::decode(&[0u8]).is_err());
        assert!(Datagram::decode(&[]).is_err());
    }

    #[test]
    fn exactly_two_zero_bytes_is_empty_room_and_token() {
        let dgram = Datagram::decode(&[0, 0]).unwrap();
        assert_eq!(dgram.room_name, "");
        assert_eq!(dgram.token, "");
        assert_eq!(dgram.message, "");
    }

    #[test]
    fn truncated_body_is_rejected() {
        // declares a 10-byte room name but supplies none
        assert!(Datagram::decode(&[10, 0]).is_err());
    }
}
