//! Pooled suspension handles for writers blocked on a send window.
//!
//! An [`Awaitable`] is a resettable one-shot slot. Each reset bumps its
//! version, and a [`WindowAvailable`] future remembers the version it was
//! created for, so a future never misses a completion that happened before the
//! slot was recycled for another writer.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::task::AtomicWaker;
use tracing::trace;

use crate::reusable_queue::ReusableQueue;

// Bit 0 is the completed flag; the remaining bits hold the version.
const COMPLETED: u64 = 1;
const VERSION_SHIFT: u32 = 1;

#[derive(Debug, Default)]
struct Slot {
    state: AtomicU64,
    waker: AtomicWaker,
}

/// A reusable "resume the writer when window reopens" handle.
#[derive(Debug, Clone, Default)]
pub struct Awaitable {
    slot: Arc<Slot>,
}

impl Awaitable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.slot.state.load(Ordering::Acquire) >> VERSION_SHIFT
    }

    /// Whether the current version has been completed.
    pub fn is_completed(&self) -> bool {
        self.slot.state.load(Ordering::Acquire) & COMPLETED != 0
    }

    /// Complete the current version and wake its waiter.
    ///
    /// Completing twice is a no-op; returns whether this call completed it.
    pub fn complete(&self) -> bool {
        let previous = self.slot.state.fetch_or(COMPLETED, Ordering::AcqRel);
        if previous & COMPLETED != 0 {
            return false;
        }
        self.slot.waker.wake();
        true
    }

    /// Complete the slot only if it is still on `version` and not completed.
    pub fn complete_version(&self, version: u64) -> bool {
        let mut current = self.slot.state.load(Ordering::Acquire);
        loop {
            if current >> VERSION_SHIFT != version || current & COMPLETED != 0 {
                return false;
            }
            match self.slot.state.compare_exchange_weak(
                current,
                current | COMPLETED,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        self.slot.waker.wake();
        true
    }

    /// Start a new version. Only a completed slot may be reset.
    pub(crate) fn reset(&self) {
        let mut current = self.slot.state.load(Ordering::Acquire);
        debug_assert!(current & COMPLETED != 0, "awaitable reset before completion");
        loop {
            let next = ((current >> VERSION_SHIFT) + 1) << VERSION_SHIFT;
            match self.slot.state.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Future resolving once the current version completes.
    pub fn wait(&self) -> WindowAvailable {
        WindowAvailable {
            awaitable: self.clone(),
            version: self.version(),
        }
    }

    pub fn ptr_eq(&self, other: &Awaitable) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

/// Resolves when the send window a writer is blocked on may have reopened,
/// or the scope was aborted. The writer re-checks both afterwards.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct WindowAvailable {
    awaitable: Awaitable,
    version: u64,
}

impl WindowAvailable {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn awaitable(&self) -> &Awaitable {
        &self.awaitable
    }

    pub fn is_ready(&self) -> bool {
        let state = self.awaitable.slot.state.load(Ordering::Acquire);
        state >> VERSION_SHIFT > self.version || state & COMPLETED != 0
    }
}

impl Future for WindowAvailable {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.is_ready() {
            return Poll::Ready(());
        }
        self.awaitable.slot.waker.register(cx.waker());
        // Re-check after registering so a completion racing with us is seen.
        if self.is_ready() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

/// One reusable awaitable for a stream's own send window.
#[derive(Debug, Default)]
pub struct SingleAwaitableProvider {
    awaitable: Option<Awaitable>,
    active: bool,
}

impl SingleAwaitableProvider {
    pub fn get_awaitable(&mut self) -> Awaitable {
        let awaitable = match self.awaitable.clone() {
            Some(existing) => {
                debug_assert!(!self.active, "previous awaitable should have been completed");
                existing.reset();
                existing
            }
            None => {
                let created = Awaitable::new();
                self.awaitable = Some(created.clone());
                created
            }
        };
        self.active = true;
        awaitable
    }

    pub fn complete_current(&mut self) {
        debug_assert!(self.active, "no active awaitable to complete");
        self.active = false;
        if let Some(awaitable) = &self.awaitable {
            awaitable.complete();
        }
    }

    pub fn active_count(&self) -> usize {
        usize::from(self.active)
    }
}

/// FIFO of awaitables for the connection send window, which any number of
/// streams may be blocked on at once.
#[derive(Debug, Default)]
pub struct MultipleAwaitableProvider {
    queue: ReusableQueue<Awaitable>,
}

impl MultipleAwaitableProvider {
    pub fn get_awaitable(&mut self) -> Awaitable {
        if let Some(existing) = self.queue.try_enqueue_existing() {
            existing.reset();
            return existing.clone();
        }
        let created = Awaitable::new();
        self.queue.enqueue(created.clone());
        created
    }

    /// Resume the oldest waiter.
    pub fn complete_current(&mut self) {
        match self.queue.dequeue() {
            Some(awaitable) => {
                // Already completed if its stream aborted while queued.
                if !awaitable.complete() {
                    trace!(version = awaitable.version(), "awaitable was already completed");
                }
            }
            None => debug_assert!(false, "no active awaitable to complete"),
        }
    }

    pub fn active_count(&self) -> usize {
        self.queue.len()
    }
}

/// Source of awaitables for an [`OutputFlowControl`](crate::OutputFlowControl).
#[derive(Debug)]
pub enum AwaitableProvider {
    Single(SingleAwaitableProvider),
    Multiple(MultipleAwaitableProvider),
}

impl AwaitableProvider {
    pub fn single() -> Self {
        Self::Single(SingleAwaitableProvider::default())
    }

    pub fn multiple() -> Self {
        Self::Multiple(MultipleAwaitableProvider::default())
    }

    pub fn get_awaitable(&mut self) -> Awaitable {
        match self {
            Self::Single(provider) => provider.get_awaitable(),
            Self::Multiple(provider) => provider.get_awaitable(),
        }
    }

    pub fn complete_current(&mut self) {
        match self {
            Self::Single(provider) => provider.complete_current(),
            Self::Multiple(provider) => provider.complete_current(),
        }
    }

    pub fn active_count(&self) -> usize {
        match self {
            Self::Single(provider) => provider.active_count(),
            Self::Multiple(provider) => provider.active_count(),
        }
    }
}
