//! Application layer for the driving side.
//!
//! - **`commands`** – Constructors for every command the driver can send,
//!   staging bulk geometry through the driver's buffer broker.
//! - **`events`** – The inbound router: decodes host events into owned
//!   frames, acknowledges consumed buffers, and releases the driver's own
//!   buffers when the host acknowledges them.

pub mod commands;
pub mod events;
