//! Protocol module containing message types, the JSON codec, and framing.

pub mod codec;
pub mod framing;
pub mod messages;

pub use codec::{decode_message, encode_message, ProtocolError, MAX_FRAME_LEN};
pub use framing::{read_frame, write_frame, write_message};
pub use messages::*;
