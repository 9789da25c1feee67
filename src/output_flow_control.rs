//! Send-side flow control: how much we may still write, and who is waiting.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::awaitable::{Awaitable, AwaitableProvider, WindowAvailable};
use crate::window::Window;

/// The connection-level send window, shared by every stream's writer and the
/// frame reader that applies WINDOW_UPDATE(0) frames.
pub type SharedOutputFlowControl = Arc<Mutex<OutputFlowControl>>;

/// A send window for one scope (connection or stream) plus its blocked writers.
#[derive(Debug)]
pub struct OutputFlowControl {
    window: Window,
    provider: AwaitableProvider,
}

impl OutputFlowControl {
    pub fn new(provider: AwaitableProvider, initial_window_size: u32) -> Self {
        Self {
            window: Window::new(initial_window_size),
            provider,
        }
    }

    /// Stream scope: at most one writer waits at a time.
    pub fn for_stream(initial_window_size: u32) -> Self {
        Self::new(AwaitableProvider::single(), initial_window_size)
    }

    /// Connection scope: writers from many streams queue up FIFO.
    pub fn for_connection(initial_window_size: u32) -> Self {
        Self::new(AwaitableProvider::multiple(), initial_window_size)
    }

    /// Connection scope wrapped for sharing with stream writers.
    pub fn shared_connection(initial_window_size: u32) -> SharedOutputFlowControl {
        Arc::new(Mutex::new(Self::for_connection(initial_window_size)))
    }

    pub fn available(&self) -> i64 {
        self.window.available()
    }

    pub fn is_aborted(&self) -> bool {
        self.window.is_aborted()
    }

    pub fn active_waiters(&self) -> usize {
        self.provider.active_count()
    }

    /// Register a waiter. Only valid once the window is exhausted.
    pub fn availability_awaitable(&mut self) -> Awaitable {
        debug_assert!(!self.window.is_aborted(), "availability_awaitable requested after abort");
        debug_assert!(
            self.window.available() <= 0,
            "availability_awaitable requested with {} bytes available",
            self.window.available()
        );
        self.provider.get_awaitable()
    }

    /// Reinitialise for a recycled stream. The peer may have changed
    /// SETTINGS_INITIAL_WINDOW_SIZE since this object was last used.
    pub fn reset(&mut self, initial_window_size: u32) {
        self.window = Window::new(initial_window_size);
        debug_assert_eq!(
            self.provider.active_count(),
            0,
            "waiters should have been drained by the previous stream"
        );
    }

    pub fn advance(&mut self, bytes: u32) {
        self.window.advance(bytes);
    }

    /// Apply a WINDOW_UPDATE increment or a SETTINGS delta (which may be
    /// negative and drive the window below zero).
    ///
    /// On success every waiter is resumed while any window is left. A woken
    /// writer re-clamps its request against what is actually available.
    pub fn try_update_window(&mut self, bytes: i64) -> bool {
        if !self.window.try_update_window(bytes) {
            return false;
        }
        while self.window.available() > 0 && self.provider.active_count() > 0 {
            self.provider.complete_current();
        }
        true
    }

    /// Mark the window aborted, then release every waiter.
    pub fn abort(&mut self) {
        self.window.abort();
        let waiters = self.provider.active_count();
        if waiters > 0 {
            trace!(waiters, "releasing writers blocked on aborted window");
        }
        while self.provider.active_count() > 0 {
            self.provider.complete_current();
        }
    }
}

fn lock(connection: &SharedOutputFlowControl) -> MutexGuard<'_, OutputFlowControl> {
    connection.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A stream's send budget: bounded by both its own window and the
/// connection's.
#[derive(Debug)]
pub struct StreamOutputFlowControl {
    connection: SharedOutputFlowControl,
    stream: OutputFlowControl,
    // Connection awaitable this stream last blocked on, with the version it
    // was handed out at.
    connection_awaitable: Option<(Awaitable, u64)>,
}

impl StreamOutputFlowControl {
    pub fn new(connection: SharedOutputFlowControl, initial_window_size: u32) -> Self {
        Self {
            connection,
            stream: OutputFlowControl::for_stream(initial_window_size),
            connection_awaitable: None,
        }
    }

    pub fn connection(&self) -> &SharedOutputFlowControl {
        &self.connection
    }

    pub fn stream_available(&self) -> i64 {
        self.stream.available()
    }

    /// Bytes that could be sent right now: the smaller of both windows.
    pub fn available(&self) -> i64 {
        lock(&self.connection).available().min(self.stream.available())
    }

    pub fn is_aborted(&self) -> bool {
        self.stream.is_aborted() || lock(&self.connection).is_aborted()
    }

    /// Reuse for a new stream.
    pub fn reset(&mut self, initial_window_size: u32) {
        self.stream.reset(initial_window_size);
        if let Some((awaitable, version)) = self.connection_awaitable.take() {
            debug_assert!(
                awaitable.version() != version || awaitable.is_completed(),
                "connection awaitable should have completed before reuse"
            );
        }
    }

    /// Count bytes already sent against both windows.
    pub fn advance(&mut self, bytes: u32) {
        lock(&self.connection).advance(bytes);
        self.stream.advance(bytes);
    }

    /// Take up to `requested` bytes from both windows.
    ///
    /// Returns how many bytes were granted. If that is less than requested, a
    /// future is also returned that resolves when the scarcer of the two
    /// windows may have reopened; the writer then calls again for the rest.
    /// An aborted stream or connection grants nothing and never waits.
    pub fn advance_up_to_and_wait(&mut self, requested: u64) -> (u32, Option<WindowAvailable>) {
        let mut connection = lock(&self.connection);
        self.connection_awaitable = None;
        if self.stream.is_aborted() || connection.is_aborted() {
            return (0, None);
        }

        let connection_is_tighter = connection.available() < self.stream.available();
        let tighter_available = if connection_is_tighter {
            connection.available()
        } else {
            self.stream.available()
        };
        let requested_clamped = i64::try_from(requested).unwrap_or(i64::MAX);
        // Window availability never exceeds MAX_WINDOW_SIZE, so this fits in a u32.
        let actual = requested_clamped.min(tighter_available).max(0) as u32;

        connection.advance(actual);
        self.stream.advance(actual);

        if u64::from(actual) >= requested {
            return (actual, None);
        }

        let wait = if connection_is_tighter {
            let awaitable = connection.availability_awaitable();
            let wait = awaitable.wait();
            self.connection_awaitable = Some((awaitable, wait.version()));
            wait
        } else {
            self.stream.availability_awaitable().wait()
        };
        trace!(
            requested,
            granted = actual,
            on_connection = connection_is_tighter,
            "writer blocked on send window"
        );
        (actual, Some(wait))
    }

    /// Stream-level WINDOW_UPDATE or SETTINGS delta. The connection window is
    /// updated separately by the connection (RFC 9113 Section 6.9.1).
    pub fn try_update_window(&mut self, bytes: i64) -> bool {
        self.stream.try_update_window(bytes)
    }

    /// Abort the stream scope and release its writer, even when that writer is
    /// queued on the connection window.
    pub fn abort(&mut self) {
        self.stream.abort();
        // The queued entry may complete again later through the connection;
        // that second completion is a no-op.
        if let Some((awaitable, version)) = self.connection_awaitable.take() {
            if awaitable.complete_version(version) {
                trace!(version, "released writer queued on connection window");
            }
        }
    }
}
