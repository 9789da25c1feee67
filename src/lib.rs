//! h2-flow-control: HTTP/2 flow-control windows with backpressure
//!
//! This crate tracks the connection-level and stream-level flow-control
//! windows of an HTTP/2 connection (RFC 9113 Section 6.9), on both the
//! receive and the send side.
//!
//! # Features
//!
//! - **Lock-free receive windows**: the frame reader and application threads
//!   update the same window through a packed compare-and-swap word
//! - **Batched WINDOW_UPDATE**: consumed bytes are advertised once they add up
//!   to a minimum increment, not byte by byte
//! - **Backpressure**: a writer that runs out of send window gets a future that
//!   resolves when the scarcer of its stream and connection windows reopens
//! - **FIFO fairness**: writers blocked on the connection window resume oldest
//!   first
//! - **Negative windows**: SETTINGS_INITIAL_WINDOW_SIZE decreases may push a
//!   send window below zero
//! - **Poolable**: every per-stream object can be reset and reused
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use h2_flow_control::{BufferedFrameWriter, ConnectionFlowControl, FlowControlLimits};
//!
//! let writer = Arc::new(BufferedFrameWriter::new());
//! let connection = ConnectionFlowControl::new(FlowControlLimits::default(), writer.clone());
//! let (input, mut output) = connection.open_stream(1);
//!
//! // 16 KiB of DATA arrived and the application read all of it.
//! input.advance(16_384).unwrap();
//! input.update_windows(16_384);
//!
//! // Send up to 100 KiB; the peer's default windows only allow 65,535 bytes.
//! let (granted, wait) = output.advance_up_to_and_wait(100 * 1024);
//! assert_eq!(granted, 65_535);
//! assert!(wait.is_some());
//! ```
//!
//! # Architecture
//!
//! It provides:
//! - Window arithmetic (`Window`, `AtomicWindowState`)
//! - Receive accounting (`InputFlowControl`, `StreamInputFlowControl`)
//! - Send accounting and waiting (`OutputFlowControl`, `StreamOutputFlowControl`)
//! - WINDOW_UPDATE encoding for the frame writer seam
//!
//! It does NOT provide:
//! - Frame parsing or HPACK
//! - Stream state machines
//! - Transport I/O (the caller sends the WINDOW_UPDATE bytes)

pub mod awaitable;
pub mod connection;
pub mod error;
pub mod frame;
pub mod input_flow_control;
pub mod output_flow_control;
pub mod reusable_queue;
pub mod settings;
pub mod window;

pub use awaitable::{
    Awaitable, AwaitableProvider, MultipleAwaitableProvider, SingleAwaitableProvider,
    WindowAvailable,
};
pub use connection::ConnectionFlowControl;
pub use error::{FlowControlError, LimitsError, WriteError};
pub use frame::{
    encode_window_update, error_code, frame_type, parse_window_update, settings_id,
    BufferedFrameWriter, WindowUpdateWriter,
};
pub use input_flow_control::{InputFlowControl, StreamInputFlowControl};
pub use output_flow_control::{OutputFlowControl, SharedOutputFlowControl, StreamOutputFlowControl};
pub use reusable_queue::ReusableQueue;
pub use settings::{
    window_size_delta, FlowControlLimits, DEFAULT_CONNECTION_WINDOW_SIZE,
    DEFAULT_INITIAL_WINDOW_SIZE, DEFAULT_STREAM_WINDOW_SIZE, MAX_WINDOW_SIZE,
};
pub use window::{AtomicWindowState, Window, WindowState};
