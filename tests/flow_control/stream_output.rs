//! Tests for StreamOutputFlowControl

use std::sync::{Arc, Mutex};

use futures::executor::block_on;
use h2_flow_control::{OutputFlowControl, StreamOutputFlowControl};

use crate::common::{poll_noop, poll_with, recording_waker};

#[test]
fn test_partial_grant_waits_on_connection() {
    let connection = OutputFlowControl::shared_connection(50);
    let mut stream = StreamOutputFlowControl::new(connection.clone(), 200);

    let (granted, wait) = stream.advance_up_to_and_wait(10_000);

    assert_eq!(granted, 50);
    let mut wait = wait.expect("window was insufficient");
    assert_eq!(connection.lock().unwrap().available(), 0);
    assert_eq!(connection.lock().unwrap().active_waiters(), 1);
    assert_eq!(stream.stream_available(), 150);
    assert!(poll_noop(&mut wait).is_pending());

    assert!(connection.lock().unwrap().try_update_window(100));
    assert!(poll_noop(&mut wait).is_ready());
}

#[test]
fn test_tie_waits_on_stream() {
    let connection = OutputFlowControl::shared_connection(100);
    let mut stream = StreamOutputFlowControl::new(connection.clone(), 100);

    let (granted, wait) = stream.advance_up_to_and_wait(150);
    assert_eq!(granted, 100);
    assert!(wait.is_some());
    assert_eq!(connection.lock().unwrap().active_waiters(), 0);
}

#[test]
fn test_negative_stream_window_grants_nothing() {
    let connection = OutputFlowControl::shared_connection(1000);
    let mut stream = StreamOutputFlowControl::new(connection.clone(), 100);
    assert!(stream.try_update_window(-300));
    assert_eq!(stream.available(), -200);

    let (granted, wait) = stream.advance_up_to_and_wait(10);
    assert_eq!(granted, 0);
    let mut wait = wait.unwrap();
    assert_eq!(connection.lock().unwrap().available(), 1000);

    assert!(stream.try_update_window(200));
    assert!(poll_noop(&mut wait).is_pending());
    assert!(stream.try_update_window(1));
    assert!(poll_noop(&mut wait).is_ready());
}

#[test]
fn test_zero_byte_request_never_waits() {
    let connection = OutputFlowControl::shared_connection(0);
    let mut stream = StreamOutputFlowControl::new(connection, 0);
    let (granted, wait) = stream.advance_up_to_and_wait(0);
    assert_eq!(granted, 0);
    assert!(wait.is_none());
}

#[test]
fn test_advance_counts_against_both_windows() {
    let connection = OutputFlowControl::shared_connection(1000);
    let mut stream = StreamOutputFlowControl::new(connection.clone(), 500);
    stream.advance(300);
    assert_eq!(connection.lock().unwrap().available(), 700);
    assert_eq!(stream.stream_available(), 200);
    assert_eq!(stream.available(), 200);
}

#[test]
fn test_stream_update_leaves_connection_alone() {
    let connection = OutputFlowControl::shared_connection(1000);
    let mut stream = StreamOutputFlowControl::new(connection.clone(), 500);
    assert!(stream.try_update_window(500));
    assert_eq!(stream.stream_available(), 1000);
    assert_eq!(connection.lock().unwrap().available(), 1000);
}

#[test]
fn test_writers_resume_in_fifo_order() {
    let connection = OutputFlowControl::shared_connection(0);
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut streams: Vec<_> = (0..3)
        .map(|_| StreamOutputFlowControl::new(connection.clone(), 65_535))
        .collect();
    let mut waits = Vec::new();
    for (stream, name) in streams.iter_mut().zip(["A", "B", "C"]) {
        let (granted, wait) = stream.advance_up_to_and_wait(1000);
        assert_eq!(granted, 0);
        let mut wait = wait.unwrap();
        assert!(poll_with(&mut wait, &recording_waker(name, &log)).is_pending());
        waits.push(wait);
    }
    assert_eq!(connection.lock().unwrap().active_waiters(), 3);

    assert!(connection.lock().unwrap().try_update_window(3000));

    assert_eq!(*log.lock().unwrap(), vec!["A", "B", "C"]);
    assert!(waits.iter().all(|wait| wait.is_ready()));
}

#[test]
fn test_abort_releases_writer_queued_on_connection() {
    let connection = OutputFlowControl::shared_connection(0);
    let mut aborted = StreamOutputFlowControl::new(connection.clone(), 65_535);
    let mut other = StreamOutputFlowControl::new(connection.clone(), 65_535);

    let (_, aborted_wait) = aborted.advance_up_to_and_wait(100);
    let (_, other_wait) = other.advance_up_to_and_wait(100);
    let mut aborted_wait = aborted_wait.unwrap();
    let mut other_wait = other_wait.unwrap();

    aborted.abort();
    assert!(aborted.is_aborted());
    assert!(poll_noop(&mut aborted_wait).is_ready());
    assert!(poll_noop(&mut other_wait).is_pending());

    // The aborted writer's queue entry still occupies a slot until the
    // connection window reopens.
    assert_eq!(connection.lock().unwrap().active_waiters(), 2);
    assert!(connection.lock().unwrap().try_update_window(10));
    assert!(poll_noop(&mut other_wait).is_ready());
    assert_eq!(connection.lock().unwrap().active_waiters(), 0);
}

#[test]
fn test_abort_ignores_recycled_connection_awaitable() {
    let connection = OutputFlowControl::shared_connection(0);
    let mut first = StreamOutputFlowControl::new(connection.clone(), 65_535);
    let (_, wait) = first.advance_up_to_and_wait(10);
    let wait = wait.unwrap();
    let recorded_version = wait.version();

    // Drain four waiters so the first slot is handed out again.
    for _ in 0..3 {
        connection.lock().unwrap().availability_awaitable();
    }
    assert!(connection.lock().unwrap().try_update_window(1));
    assert!(wait.is_ready());
    connection.lock().unwrap().advance(1);

    let mut second = StreamOutputFlowControl::new(connection.clone(), 65_535);
    let (_, reused) = second.advance_up_to_and_wait(10);
    let mut reused = reused.unwrap();
    assert!(reused.awaitable().ptr_eq(wait.awaitable()));
    assert_ne!(reused.version(), recorded_version);

    // `first` has not blocked since; aborting it must not wake `second`.
    first.abort();
    assert!(poll_noop(&mut reused).is_pending());
}

#[test]
fn test_abort_wakes_writer_blocked_on_stream() {
    let connection = OutputFlowControl::shared_connection(1000);
    let mut stream = StreamOutputFlowControl::new(connection, 10);
    let (granted, wait) = stream.advance_up_to_and_wait(100);
    assert_eq!(granted, 10);
    let wait = wait.unwrap();
    stream.abort();
    block_on(wait);
    assert!(stream.is_aborted());
}

#[test]
fn test_writer_loop_sends_everything() {
    let connection = OutputFlowControl::shared_connection(100);
    let mut stream = StreamOutputFlowControl::new(connection.clone(), 60);
    let mut remaining: u64 = 500;
    let mut rounds = 0;

    while remaining > 0 {
        let (granted, wait) = stream.advance_up_to_and_wait(remaining);
        remaining -= u64::from(granted);
        if let Some(mut wait) = wait {
            assert!(poll_noop(&mut wait).is_pending());
            // Peer acknowledges what was sent on both scopes.
            assert!(stream.try_update_window(60));
            assert!(connection.lock().unwrap().try_update_window(60));
            assert!(poll_noop(&mut wait).is_ready());
        }
        rounds += 1;
        assert!(rounds < 100);
    }
    assert_eq!(remaining, 0);
}

#[test]
fn test_advance_after_abort_is_accounted() {
    let connection = OutputFlowControl::shared_connection(1000);
    let mut stream = StreamOutputFlowControl::new(connection.clone(), 500);
    stream.abort();
    stream.advance(0);
    stream.advance(100);
    assert_eq!(stream.stream_available(), 400);
    assert_eq!(connection.lock().unwrap().available(), 900);
}
