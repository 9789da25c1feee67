//! WINDOW_UPDATE framing and the frame writer seam.
//!
//! The flow-control engine decides when a WINDOW_UPDATE is due and how large
//! it is. Putting the frame on the wire belongs to whoever implements
//! [`WindowUpdateWriter`]. [`BufferedFrameWriter`] is a sans-I/O implementation
//! that encodes frames into a buffer the caller drains and sends itself.
//!
//! Reference: RFC 9113 Section 6.9

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::WriteError;

/// HTTP/2 frame types (RFC 9113 Section 6)
#[allow(dead_code)]
pub mod frame_type {
    pub const DATA: u8 = 0x0;
    pub const SETTINGS: u8 = 0x4;
    pub const WINDOW_UPDATE: u8 = 0x8;
}

/// HTTP/2 SETTINGS identifiers (RFC 9113 Section 6.5.2)
#[allow(dead_code)]
pub mod settings_id {
    pub const INITIAL_WINDOW_SIZE: u16 = 0x4;
}

/// HTTP/2 error codes (RFC 9113 Section 7)
#[allow(dead_code)]
pub mod error_code {
    pub const NO_ERROR: u32 = 0x0;
    pub const PROTOCOL_ERROR: u32 = 0x1;
    pub const INTERNAL_ERROR: u32 = 0x2;
    pub const FLOW_CONTROL_ERROR: u32 = 0x3;
    pub const CANCEL: u32 = 0x8;
}

/// Size of the frame header preceding every payload.
pub const FRAME_HEADER_LEN: usize = 9;

/// Total size of an encoded WINDOW_UPDATE frame.
pub const WINDOW_UPDATE_FRAME_LEN: usize = FRAME_HEADER_LEN + 4;

/// Encode a WINDOW_UPDATE frame.
/// stream_id=0 updates the connection-level window, otherwise stream-level
pub fn encode_window_update(stream_id: u32, increment: u32) -> Vec<u8> {
    let mut frame = Vec::with_capacity(WINDOW_UPDATE_FRAME_LEN);
    encode_window_update_into(&mut frame, stream_id, increment);
    frame
}

/// Append a WINDOW_UPDATE frame to `buf`.
pub fn encode_window_update_into(buf: &mut Vec<u8>, stream_id: u32, increment: u32) {
    let stream_id = stream_id & 0x7FFF_FFFF; // Clear reserved bit
    let increment = increment & 0x7FFF_FFFF;
    buf.extend_from_slice(&[
        0, 0, 4, // Length: 4 bytes
        frame_type::WINDOW_UPDATE,
        0x0, // Flags: none
    ]);
    buf.extend_from_slice(&stream_id.to_be_bytes());
    buf.extend_from_slice(&increment.to_be_bytes());
}

/// Parse a complete WINDOW_UPDATE frame into `(stream_id, increment)`.
///
/// Returns `None` if `data` is not exactly one well-formed WINDOW_UPDATE.
pub fn parse_window_update(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() != WINDOW_UPDATE_FRAME_LEN {
        return None;
    }
    let length = ((data[0] as u32) << 16) | ((data[1] as u32) << 8) | (data[2] as u32);
    if length != 4 || data[3] != frame_type::WINDOW_UPDATE {
        return None;
    }
    let stream_id = u32::from_be_bytes([data[5], data[6], data[7], data[8]]) & 0x7FFF_FFFF;
    let increment = u32::from_be_bytes([data[9], data[10], data[11], data[12]]) & 0x7FFF_FFFF;
    Some((stream_id, increment))
}

/// Sink for WINDOW_UPDATE frames produced by the input side.
///
/// Calls are fire-and-forget: the engine logs and drops any error.
pub trait WindowUpdateWriter: Send + Sync {
    fn write_window_update(&self, stream_id: u32, size: u32) -> Result<(), WriteError>;
}

/// Encodes WINDOW_UPDATE frames into an in-memory buffer.
#[derive(Debug, Default)]
pub struct BufferedFrameWriter {
    pending: Mutex<Vec<u8>>,
    closed: AtomicBool,
}

impl BufferedFrameWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain every frame written so far.
    pub fn take_pending(&self) -> Vec<u8> {
        std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of buffered bytes not yet taken.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Split the buffered bytes into `(stream_id, increment)` pairs, draining them.
    pub fn take_window_updates(&self) -> Vec<(u32, u32)> {
        self.take_pending()
            .chunks(WINDOW_UPDATE_FRAME_LEN)
            .filter_map(parse_window_update)
            .collect()
    }

    /// Stop accepting frames. Later writes fail with [`WriteError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl WindowUpdateWriter for BufferedFrameWriter {
    fn write_window_update(&self, stream_id: u32, size: u32) -> Result<(), WriteError> {
        if self.is_closed() {
            return Err(WriteError::Closed);
        }
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        encode_window_update_into(&mut pending, stream_id, size);
        Ok(())
    }
}
