//! The buffer broker: creation, naming, and release-tracking of shared
//! segments.
//!
//! Each side of the bridge owns one broker for the segments *it* creates.
//! The table is only ever touched from that side's own contexts; the peer
//! sees segment names, opens the bytes, and sends `received_buffer`. It
//! never shares the table itself.

use std::collections::HashMap;
use std::io;

use tracing::warn;

use crate::shm::bytes;
use crate::shm::segment::ShmSegment;

/// Tracks every shared segment this side has created and not yet had
/// acknowledged as released by the peer.
#[derive(Debug, Default)]
pub struct BufferBroker {
    outstanding: HashMap<String, ShmSegment>,
}

impl BufferBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh segment of exactly `size` bytes and registers it as
    /// outstanding.
    ///
    /// Returns `None` for `size == 0`: zero-length payloads are represented
    /// by an empty name on the wire rather than a zero-size segment.
    ///
    /// # Errors
    ///
    /// Propagates the OS error if segment creation fails; other outstanding
    /// segments are unaffected.
    pub fn create(&mut self, size: usize) -> io::Result<Option<(String, &mut [u8])>> {
        if size == 0 {
            return Ok(None);
        }
        let segment = ShmSegment::create(size)?;
        let name = segment.name().to_string();
        let entry = self.outstanding.entry(name.clone()).or_insert(segment);
        Ok(Some((name, entry.as_mut_slice())))
    }

    /// Allocates a segment holding `data` verbatim (native endianness) and
    /// returns its name, or an empty name for empty input.
    pub fn stage_f32(&mut self, data: &[f32]) -> io::Result<String> {
        match self.create(std::mem::size_of_val(data))? {
            None => Ok(String::new()),
            Some((name, slice)) => {
                bytes::write_f32s(slice, data);
                Ok(name)
            }
        }
    }

    /// As [`stage_f32`](Self::stage_f32), for `u32` data.
    pub fn stage_u32(&mut self, data: &[u32]) -> io::Result<String> {
        match self.create(std::mem::size_of_val(data))? {
            None => Ok(String::new()),
            Some((name, slice)) => {
                bytes::write_u32s(slice, data);
                Ok(name)
            }
        }
    }

    /// Handles a `received_buffer` acknowledgment: removes and deallocates
    /// the named segment.
    ///
    /// An unknown name signals a protocol desync between the two sides. It
    /// is logged for an implementer to investigate and otherwise ignored;
    /// the session continues. Returns whether a segment was released.
    pub fn acknowledge_released(&mut self, name: &str) -> bool {
        match self.outstanding.remove(name) {
            Some(_segment) => true,
            None => {
                warn!(name, "release acknowledgment for unknown buffer (protocol desync)");
                false
            }
        }
    }

    /// Whether `name` is currently outstanding.
    pub fn is_outstanding(&self, name: &str) -> bool {
        self.outstanding.contains_key(name)
    }

    /// Number of outstanding segments.
    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    /// Deallocates every outstanding segment. Used at session teardown.
    pub fn clear(&mut self) {
        self.outstanding.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
