//! Error types for flow-control accounting, limits and frame writers.

use thiserror::Error;

use crate::frame::error_code;

/// Errors raised while accounting inbound data against a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlowControlError {
    /// The peer sent more data than the advertised window allowed.
    #[error("flow control window exceeded: received {requested} bytes with {available} available")]
    WindowExceeded { requested: u32, available: u32 },
    /// WINDOW_UPDATE with an increment of zero.
    #[error("window update increment of zero")]
    ZeroWindowIncrement,
    /// WINDOW_UPDATE would grow the send window past 2^31-1.
    #[error("window update of {increment} bytes overflows the send window")]
    WindowOverflow { increment: u32 },
    /// SETTINGS_INITIAL_WINDOW_SIZE above 2^31-1.
    #[error("initial window size {0} exceeds 2147483647")]
    InitialWindowSizeTooLarge(u32),
}

impl FlowControlError {
    /// HTTP/2 error code to put in the GOAWAY that ends the connection.
    pub fn error_code(&self) -> u32 {
        match self {
            Self::WindowExceeded { .. }
            | Self::WindowOverflow { .. }
            | Self::InitialWindowSizeTooLarge(_) => error_code::FLOW_CONTROL_ERROR,
            Self::ZeroWindowIncrement => error_code::PROTOCOL_ERROR,
        }
    }

    /// Violations surfaced here always terminate the whole connection.
    pub fn is_connection_error(&self) -> bool {
        true
    }
}

/// Invalid [`FlowControlLimits`](crate::FlowControlLimits) values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LimitsError {
    #[error("initial connection window size {0} is outside [65535, 2147483647]")]
    ConnectionWindowSize(u32),
    #[error("initial stream window size {0} is outside [65535, 2147483647]")]
    StreamWindowSize(u32),
}

/// Failure reported by a [`WindowUpdateWriter`](crate::WindowUpdateWriter).
///
/// The engine never retries on these; they only show up in traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WriteError {
    /// The surrounding write was cancelled.
    #[error("window update write cancelled")]
    Cancelled,
    /// The writer no longer accepts frames.
    #[error("frame writer closed")]
    Closed,
}
