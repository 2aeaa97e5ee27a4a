//! Named shared-memory segments and the buffer broker.
//!
//! Bulk geometry crosses the process boundary through POSIX named shared
//! memory; only segment *names* travel over the socket. The flow is always:
//!
//! 1. The producing side asks its [`BufferBroker`] for a segment sized
//!    exactly to the payload and copies the data in. The broker registers
//!    the segment as *outstanding* under its unique name.
//! 2. The name is sent in a message. The consuming side opens the segment
//!    by name ([`ShmSegment::open`]), copies the data out, and sends a
//!    `received_buffer` acknowledgment.
//! 3. The producing side's broker deallocates the segment on the ack.
//!
//! A name is never reused while outstanding, zero-length payloads use an
//! empty name instead of a zero-size segment, and the bytes are treated as
//! write-once by the creator until release.

pub mod broker;
pub mod bytes;
pub mod segment;

pub use broker::BufferBroker;
pub use segment::ShmSegment;
