//! Receive-side flow control: bytes the peer may still send us, and when to
//! tell it about buffer space the application has freed.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::FlowControlError;
use crate::frame::WindowUpdateWriter;
use crate::window::{AtomicWindowState, WindowState};

enum Rejected {
    Exceeded(FlowControlError),
    Aborted,
}

/// Receive window for one scope (connection or stream).
///
/// All methods take `&self`: the frame reader advances the window while
/// application threads hand consumed bytes back.
#[derive(Debug)]
pub struct InputFlowControl {
    initial_window_size: u32,
    min_window_size_increment: u32,
    state: AtomicWindowState,
    pending_update_size: AtomicU32,
    window_updates_disabled: AtomicBool,
}

impl InputFlowControl {
    pub fn new(initial_window_size: u32, min_window_size_increment: u32) -> Self {
        Self {
            initial_window_size,
            min_window_size_increment,
            state: AtomicWindowState::new(initial_window_size),
            pending_update_size: AtomicU32::new(0),
            window_updates_disabled: AtomicBool::new(false),
        }
    }

    pub fn initial_window_size(&self) -> u32 {
        self.initial_window_size
    }

    pub fn min_window_size_increment(&self) -> u32 {
        self.min_window_size_increment
    }

    pub fn available(&self) -> u32 {
        self.state.load().available()
    }

    pub fn is_aborted(&self) -> bool {
        self.state.load().is_aborted()
    }

    /// Less than one WINDOW_UPDATE increment of room is left.
    pub fn is_availability_low(&self) -> bool {
        self.available() < self.min_window_size_increment
    }

    /// Bytes consumed but not yet advertised back to the peer.
    pub fn pending_update_size(&self) -> u32 {
        self.pending_update_size.load(Ordering::Acquire)
    }

    /// Back to the freshly constructed state, for a pooled stream.
    pub fn reset(&self) {
        self.state.store(WindowState::new(self.initial_window_size, false));
        self.pending_update_size.store(0, Ordering::Release);
        self.window_updates_disabled.store(false, Ordering::Release);
    }

    /// Account `bytes` of DATA received from the peer.
    ///
    /// Receiving more than the window allows is a connection error.
    /// Returns `Ok(false)` without touching the window if this scope is
    /// aborted; the caller must then credit the bytes to the parent scope.
    pub fn try_advance(&self, bytes: u32) -> Result<bool, FlowControlError> {
        let result = self.state.update(|current| {
            if bytes > current.available() {
                return Err(Rejected::Exceeded(FlowControlError::WindowExceeded {
                    requested: bytes,
                    available: current.available(),
                }));
            }
            if current.is_aborted() {
                return Err(Rejected::Aborted);
            }
            Ok(current.advance(bytes))
        });
        match result {
            Ok(_) => Ok(true),
            Err(Rejected::Aborted) => Ok(false),
            Err(Rejected::Exceeded(err)) => {
                debug!(%err, "peer exceeded receive window");
                Err(err)
            }
        }
    }

    /// The application consumed `bytes`, so the window grows by that much.
    ///
    /// Returns `None` if this scope is aborted or the window would exceed
    /// `MAX_WINDOW_SIZE`. Otherwise returns the WINDOW_UPDATE increment to
    /// send now: zero until the consumed bytes add up to
    /// `min_window_size_increment`, and always zero once window updates are
    /// stopped.
    pub fn try_update_window(&self, bytes: u32) -> Option<u32> {
        let updated = self.state.update(|current| {
            if current.is_aborted() {
                return Err(());
            }
            current.update_window(bytes).ok_or(())
        });
        if updated.is_err() {
            return None;
        }

        if self.window_updates_disabled.load(Ordering::Acquire) {
            return Some(0);
        }

        let min = self.min_window_size_increment;
        let previous = match self.pending_update_size.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |pending| {
                let next = pending.saturating_add(bytes);
                Some(if next >= min { 0 } else { next })
            },
        ) {
            Ok(previous) | Err(previous) => previous,
        };
        let potential_update_size = previous.saturating_add(bytes);
        if potential_update_size >= min {
            Some(potential_update_size)
        } else {
            Some(0)
        }
    }

    /// No more data will arrive on this scope, so consumption should no
    /// longer produce WINDOW_UPDATE frames for it.
    pub fn stop_window_updates(&self) {
        self.window_updates_disabled.store(true, Ordering::Release);
    }

    /// Abort the scope. Returns the bytes received but never handed back, which
    /// the parent scope must reclaim. A second abort returns 0.
    pub fn abort(&self) -> u32 {
        let aborted = self.state.update(|current| {
            if current.is_aborted() {
                return Err(());
            }
            Ok(current.abort())
        });
        match aborted {
            Ok((_, state)) => self.initial_window_size.saturating_sub(state.available()),
            Err(()) => 0,
        }
    }
}

/// A stream's receive accounting, applied to both the stream window and the
/// connection window.
pub struct StreamInputFlowControl {
    stream_id: u32,
    connection: Arc<InputFlowControl>,
    stream: InputFlowControl,
    frame_writer: Arc<dyn WindowUpdateWriter>,
}

impl std::fmt::Debug for StreamInputFlowControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamInputFlowControl")
            .field("stream_id", &self.stream_id)
            .field("stream", &self.stream)
            .finish()
    }
}

impl StreamInputFlowControl {
    pub fn new(
        stream_id: u32,
        connection: Arc<InputFlowControl>,
        frame_writer: Arc<dyn WindowUpdateWriter>,
        initial_window_size: u32,
        min_window_size_increment: u32,
    ) -> Self {
        Self {
            stream_id,
            connection,
            stream: InputFlowControl::new(initial_window_size, min_window_size_increment),
            frame_writer,
        }
    }

    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    pub fn available(&self) -> u32 {
        self.stream.available()
    }

    pub fn is_aborted(&self) -> bool {
        self.stream.is_aborted()
    }

    pub fn is_availability_low(&self) -> bool {
        self.stream.is_availability_low()
    }

    /// Reuse for another stream on the same connection.
    pub fn reset(&mut self, stream_id: u32) {
        self.stream_id = stream_id;
        self.stream.reset();
    }

    /// DATA arrived on this stream.
    pub fn advance(&self, bytes: u32) -> Result<(), FlowControlError> {
        let connection_advanced = self.connection.try_advance(bytes)?;
        debug_assert!(connection_advanced, "connection-level input flow control should never be aborted");

        if !self.stream.try_advance(bytes)? {
            // The stream is gone; nobody will read these bytes.
            self.update_connection_window(bytes);
        }
        Ok(())
    }

    /// The application read `bytes` from this stream's buffer.
    pub fn update_windows(&self, bytes: u32) {
        let Some(stream_update_size) = self.stream.try_update_window(bytes) else {
            // Aborted: unread bytes already went back to the connection.
            return;
        };
        if stream_update_size > 0 {
            self.write_window_update(self.stream_id, stream_update_size);
        }
        self.update_connection_window(bytes);
    }

    /// END_STREAM received; stop emitting stream-level WINDOW_UPDATEs.
    pub fn stop_window_updates(&self) {
        self.stream.stop_window_updates();
    }

    /// Abort the stream and return its unread bytes to the connection window.
    pub fn abort(&self) {
        let unread_bytes = self.stream.abort();
        if unread_bytes > 0 {
            debug!(stream_id = self.stream_id, unread_bytes, "returning unread bytes to connection window");
            self.update_connection_window(unread_bytes);
        }
    }

    fn update_connection_window(&self, bytes: u32) {
        let connection_update_size = self.connection.try_update_window(bytes);
        debug_assert!(
            connection_update_size.is_some(),
            "connection-level input flow control should never be aborted"
        );
        if let Some(size) = connection_update_size.filter(|size| *size > 0) {
            self.write_window_update(0, size);
        }
    }

    fn write_window_update(&self, stream_id: u32, size: u32) {
        trace!(stream_id, size, "sending WINDOW_UPDATE");
        if let Err(err) = self.frame_writer.write_window_update(stream_id, size) {
            trace!(stream_id, size, %err, "dropping WINDOW_UPDATE");
        }
    }
}
