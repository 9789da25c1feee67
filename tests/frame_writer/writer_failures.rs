//! Window accounting is unaffected by WINDOW_UPDATE write failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use h2_flow_control::{
    BufferedFrameWriter, ConnectionFlowControl, FlowControlLimits, InputFlowControl,
    StreamInputFlowControl, WindowUpdateWriter, WriteError,
};

#[derive(Default)]
struct CancelledWriter {
    attempts: AtomicUsize,
}

impl WindowUpdateWriter for CancelledWriter {
    fn write_window_update(&self, _stream_id: u32, _size: u32) -> Result<(), WriteError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        Err(WriteError::Cancelled)
    }
}

#[test]
fn test_cancelled_writes_are_ignored() {
    let connection = Arc::new(InputFlowControl::new(100_000, 100));
    let writer = Arc::new(CancelledWriter::default());
    let stream = StreamInputFlowControl::new(1, connection.clone(), writer.clone(), 65_535, 100);

    stream.advance(1000).unwrap();
    stream.update_windows(1000);

    assert_eq!(writer.attempts.load(Ordering::Relaxed), 2);
    assert_eq!(stream.available(), 65_535);
    assert_eq!(connection.available(), 100_000);
}

#[test]
fn test_closed_writer_during_teardown() {
    let writer = Arc::new(BufferedFrameWriter::new());
    let connection = ConnectionFlowControl::new(FlowControlLimits::default(), writer.clone());
    let (input, _output) = connection.open_stream(1);

    input.advance(500_000).unwrap();
    writer.close();
    input.abort();

    assert!(writer.is_closed());
    assert_eq!(writer.pending_len(), 0);
    assert_eq!(connection.input().available(), FlowControlLimits::default().connection_window_size());
}
