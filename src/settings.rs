//! Window size constants and local flow-control limits.

use crate::error::LimitsError;

/// Largest legal flow-control window (RFC 9113 Section 6.9.1).
pub const MAX_WINDOW_SIZE: u32 = 0x7FFF_FFFF;

/// SETTINGS_INITIAL_WINDOW_SIZE before any SETTINGS frame is exchanged.
pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 = 65_535;

/// Default connection receive window advertised to the peer (1 MiB).
pub const DEFAULT_CONNECTION_WINDOW_SIZE: u32 = 1024 * 1024;

/// Default stream receive window advertised to the peer (768 KiB).
pub const DEFAULT_STREAM_WINDOW_SIZE: u32 = 768 * 1024;

/// Delta to apply to every open stream's send window when the peer changes
/// SETTINGS_INITIAL_WINDOW_SIZE from `old` to `new`. Can be negative.
pub fn window_size_delta(old: u32, new: u32) -> i64 {
    i64::from(new) - i64::from(old)
}

/// Receive-side window sizes this endpoint advertises.
///
/// The minimum WINDOW_UPDATE increment for each scope is half its window, so
/// a WINDOW_UPDATE goes out once the application has consumed half of the
/// buffer the peer could fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowControlLimits {
    initial_connection_window_size: u32,
    initial_stream_window_size: u32,
}

impl Default for FlowControlLimits {
    fn default() -> Self {
        Self {
            initial_connection_window_size: DEFAULT_CONNECTION_WINDOW_SIZE,
            initial_stream_window_size: DEFAULT_STREAM_WINDOW_SIZE,
        }
    }
}

impl FlowControlLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connection-level receive window. Must lie in
    /// `[DEFAULT_INITIAL_WINDOW_SIZE, MAX_WINDOW_SIZE]`.
    pub fn with_connection_window_size(mut self, size: u32) -> Result<Self, LimitsError> {
        if !(DEFAULT_INITIAL_WINDOW_SIZE..=MAX_WINDOW_SIZE).contains(&size) {
            return Err(LimitsError::ConnectionWindowSize(size));
        }
        self.initial_connection_window_size = size;
        Ok(self)
    }

    /// Sets the stream-level receive window. Must lie in
    /// `[DEFAULT_INITIAL_WINDOW_SIZE, MAX_WINDOW_SIZE]`.
    pub fn with_stream_window_size(mut self, size: u32) -> Result<Self, LimitsError> {
        if !(DEFAULT_INITIAL_WINDOW_SIZE..=MAX_WINDOW_SIZE).contains(&size) {
            return Err(LimitsError::StreamWindowSize(size));
        }
        self.initial_stream_window_size = size;
        Ok(self)
    }

    pub fn connection_window_size(&self) -> u32 {
        self.initial_connection_window_size
    }

    pub fn stream_window_size(&self) -> u32 {
        self.initial_stream_window_size
    }

    pub fn connection_min_window_size_increment(&self) -> u32 {
        self.initial_connection_window_size / 2
    }

    pub fn stream_min_window_size_increment(&self) -> u32 {
        self.initial_stream_window_size / 2
    }
}
