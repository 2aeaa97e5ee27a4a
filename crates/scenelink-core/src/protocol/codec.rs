//! JSON codec for encoding and decoding SceneLink protocol messages.
//!
//! Wire format (see [`crate::protocol::framing`] for the prefix itself):
//! ```text
//! [payload_len: u32 big-endian][payload: UTF-8 JSON, payload_len bytes]
//! ```
//! This module converts between [`Message`] values and the payload bytes;
//! the framing layer attaches and strips the length prefix.

use thiserror::Error;

use crate::protocol::messages::Message;

/// Upper bound on a declared frame length.
///
/// Control messages are small (geometry travels through shared memory), so a
/// length anywhere near this indicates the stream has lost frame alignment.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The message could not be serialized to JSON.
    #[error("failed to serialize message: {0}")]
    Encode(#[source] serde_json::Error),

    /// The payload is not a well-formed message (invalid JSON, unknown id,
    /// missing field, malformed key).
    #[error("malformed message payload: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encodes a [`Message`] into its UTF-8 JSON payload bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(msg).map_err(ProtocolError::Encode)
}

/// Decodes one [`Message`] from payload bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::Decode`] for any malformed payload. Callers on a
/// live connection log this and drop the frame; a decode failure never
/// terminates a session.
pub fn decode_message(payload: &[u8]) -> Result<Message, ProtocolError> {
    serde_json::from_slice(payload).map_err(ProtocolError::Decode)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::{PathKey, SourceKey};
    use crate::protocol::messages::{ReceivedBuffer, SetXform};

    #[test]
    fn test_round_trip_set_xform() {
        let msg = Message::SetXform(SetXform {
            translation: [1.0, 2.0, 3.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0, 1.0, 1.0],
            path: PathKey::from_wire("a/b").unwrap(),
            file_path: SourceKey::new("f").unwrap(),
            sync: true,
        });
        let bytes = encode_message(&msg).unwrap();
        assert_eq!(decode_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_round_trip_received_buffer() {
        let msg = Message::ReceivedBuffer(ReceivedBuffer {
            name: "sl-abc123".into(),
        });
        let bytes = encode_message(&msg).unwrap();
        assert_eq!(decode_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_decode_garbage_is_error() {
        assert!(matches!(
            decode_message(b"not json at all"),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_empty_payload_is_error() {
        assert!(matches!(decode_message(b""), Err(ProtocolError::Decode(_))));
    }
}
