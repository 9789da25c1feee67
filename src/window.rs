//! Window arithmetic shared by the send and receive sides.
//!
//! [`Window`] is a plain value guarded by whoever owns it. [`AtomicWindowState`]
//! packs the receive-side window and its aborted flag into one `u64` so both
//! change together in a single compare-and-swap.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::settings::MAX_WINDOW_SIZE;

/// A send window: bytes we may still put on the wire.
///
/// `available` goes negative when the peer lowers SETTINGS_INITIAL_WINDOW_SIZE
/// after we already used the old window (RFC 9113 Section 6.9.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    available: i64,
    aborted: bool,
}

impl Window {
    pub fn new(initial_window_size: u32) -> Self {
        debug_assert!(
            initial_window_size <= MAX_WINDOW_SIZE,
            "initial window size {initial_window_size} exceeds MAX_WINDOW_SIZE"
        );
        Self {
            available: i64::from(initial_window_size),
            aborted: false,
        }
    }

    pub fn available(&self) -> i64 {
        self.available
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Consume `bytes` of the window. The caller clamps against `available` first.
    pub fn advance(&mut self, bytes: u32) {
        debug_assert!(
            bytes == 0 || i64::from(bytes) <= self.available,
            "advance of {bytes} bytes with only {} available",
            self.available
        );
        self.available -= i64::from(bytes);
    }

    /// Grow (or, for SETTINGS changes, shrink) the window.
    ///
    /// Returns `false` and leaves the window untouched if the result would
    /// exceed [`MAX_WINDOW_SIZE`].
    pub fn try_update_window(&mut self, bytes: i64) -> bool {
        let max_update = i64::from(MAX_WINDOW_SIZE) - self.available;
        if bytes > max_update {
            return false;
        }
        self.available += bytes;
        true
    }

    pub fn abort(&mut self) {
        self.aborted = true;
    }
}

const ABORTED_BIT: u64 = 1 << 32;
const AVAILABLE_MASK: u64 = u32::MAX as u64;

/// Snapshot of a receive window: low 32 bits available, bit 32 aborted.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WindowState(u64);

impl WindowState {
    pub fn new(available: u32, aborted: bool) -> Self {
        let mut state = u64::from(available);
        if aborted {
            state |= ABORTED_BIT;
        }
        Self(state)
    }

    pub fn available(self) -> u32 {
        (self.0 & AVAILABLE_MASK) as u32
    }

    pub fn is_aborted(self) -> bool {
        self.0 & ABORTED_BIT != 0
    }

    /// `bytes` must not exceed `available`.
    pub fn advance(self, bytes: u32) -> Self {
        debug_assert!(bytes <= self.available());
        Self::new(self.available() - bytes, self.is_aborted())
    }

    /// `None` if the grown window would exceed [`MAX_WINDOW_SIZE`].
    pub fn update_window(self, bytes: u32) -> Option<Self> {
        let max_update = MAX_WINDOW_SIZE.saturating_sub(self.available());
        if bytes > max_update {
            return None;
        }
        Some(Self::new(self.available() + bytes, self.is_aborted()))
    }

    pub fn abort(self) -> Self {
        Self(self.0 | ABORTED_BIT)
    }
}

impl std::fmt::Debug for WindowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowState")
            .field("available", &self.available())
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Lock-free holder of a [`WindowState`].
#[derive(Debug)]
pub struct AtomicWindowState(AtomicU64);

impl AtomicWindowState {
    pub fn new(initial_window_size: u32) -> Self {
        Self(AtomicU64::new(WindowState::new(initial_window_size, false).0))
    }

    pub fn load(&self) -> WindowState {
        WindowState(self.0.load(Ordering::Acquire))
    }

    /// Unconditionally replace the state. Only for reuse of a pooled owner.
    pub fn store(&self, state: WindowState) {
        self.0.store(state.0, Ordering::Release);
    }

    /// Read-modify-write loop. `f` maps the current state to the next one or
    /// rejects it; on a conflicting concurrent write `f` runs again against
    /// the fresh state. Returns `(previous, next)` on success.
    pub fn update<E>(
        &self,
        mut f: impl FnMut(WindowState) -> Result<WindowState, E>,
    ) -> Result<(WindowState, WindowState), E> {
        let mut current = self.load();
        loop {
            let next = f(current)?;
            match self
                .0
                .compare_exchange_weak(current.0, next.0, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Ok((current, next)),
                Err(actual) => current = WindowState(actual),
            }
        }
    }

    /// Consume `bytes`. Rejected if aborted or if `bytes` exceeds the window.
    pub fn try_advance(&self, bytes: u32) -> bool {
        self.update(|current| {
            if current.is_aborted() || bytes > current.available() {
                return Err(());
            }
            Ok(current.advance(bytes))
        })
        .is_ok()
    }

    /// Grow by `bytes`. Rejected if aborted or past [`MAX_WINDOW_SIZE`].
    pub fn try_update_window(&self, bytes: u32) -> bool {
        self.update(|current| {
            if current.is_aborted() {
                return Err(());
            }
            current.update_window(bytes).ok_or(())
        })
        .is_ok()
    }

    /// Set the aborted bit. Returns the state observed before the call.
    pub fn abort(&self) -> WindowState {
        WindowState(self.0.fetch_or(ABORTED_BIT, Ordering::AcqRel))
    }
}
