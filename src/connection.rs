//! Connection-wide flow-control state and the per-stream objects built from it.

use std::sync::{Arc, PoisonError};

use tracing::{debug, trace};

use crate::error::FlowControlError;
use crate::frame::WindowUpdateWriter;
use crate::input_flow_control::{InputFlowControl, StreamInputFlowControl};
use crate::output_flow_control::{OutputFlowControl, SharedOutputFlowControl, StreamOutputFlowControl};
use crate::settings::{
    window_size_delta, FlowControlLimits, DEFAULT_INITIAL_WINDOW_SIZE, MAX_WINDOW_SIZE,
};

/// Owns the connection-level receive and send windows for one HTTP/2
/// connection and hands out per-stream flow control that shares them.
pub struct ConnectionFlowControl {
    limits: FlowControlLimits,
    input: Arc<InputFlowControl>,
    output: SharedOutputFlowControl,
    frame_writer: Arc<dyn WindowUpdateWriter>,
    peer_initial_window_size: u32,
}

impl std::fmt::Debug for ConnectionFlowControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionFlowControl")
            .field("limits", &self.limits)
            .field("input", &self.input)
            .field("peer_initial_window_size", &self.peer_initial_window_size)
            .finish()
    }
}

impl ConnectionFlowControl {
    /// The send window starts at the protocol default; the peer can only grow
    /// the connection window with WINDOW_UPDATE, never with SETTINGS.
    pub fn new(limits: FlowControlLimits, frame_writer: Arc<dyn WindowUpdateWriter>) -> Self {
        Self {
            input: Arc::new(InputFlowControl::new(
                limits.connection_window_size(),
                limits.connection_min_window_size_increment(),
            )),
            output: OutputFlowControl::shared_connection(DEFAULT_INITIAL_WINDOW_SIZE),
            limits,
            frame_writer,
            peer_initial_window_size: DEFAULT_INITIAL_WINDOW_SIZE,
        }
    }

    pub fn limits(&self) -> &FlowControlLimits {
        &self.limits
    }

    pub fn input(&self) -> &Arc<InputFlowControl> {
        &self.input
    }

    pub fn output(&self) -> &SharedOutputFlowControl {
        &self.output
    }

    pub fn peer_initial_window_size(&self) -> u32 {
        self.peer_initial_window_size
    }

    /// The peer assumes a 65,535 byte connection window until told otherwise.
    /// Sends the WINDOW_UPDATE(0) that grows it to the configured size.
    pub fn announce_connection_window(&self) {
        let increment = self
            .limits
            .connection_window_size()
            .saturating_sub(DEFAULT_INITIAL_WINDOW_SIZE);
        if increment == 0 {
            return;
        }
        trace!(increment, "announcing connection receive window");
        if let Err(err) = self.frame_writer.write_window_update(0, increment) {
            trace!(%err, "dropping WINDOW_UPDATE");
        }
    }

    /// Build flow control for a newly opened stream.
    pub fn open_stream(&self, stream_id: u32) -> (StreamInputFlowControl, StreamOutputFlowControl) {
        let input = StreamInputFlowControl::new(
            stream_id,
            self.input.clone(),
            self.frame_writer.clone(),
            self.limits.stream_window_size(),
            self.limits.stream_min_window_size_increment(),
        );
        let output = StreamOutputFlowControl::new(self.output.clone(), self.peer_initial_window_size);
        (input, output)
    }

    /// Recycle a pooled stream's flow control for `stream_id`.
    pub fn reuse_stream(
        &self,
        stream_id: u32,
        input: &mut StreamInputFlowControl,
        output: &mut StreamOutputFlowControl,
    ) {
        input.reset(stream_id);
        output.reset(self.peer_initial_window_size);
    }

    /// DATA received on stream 0 is a protocol error handled elsewhere; this
    /// only accounts padding or frames for streams that no longer exist.
    pub fn advance_connection_input(&self, bytes: u32) -> Result<(), FlowControlError> {
        let advanced = self.input.try_advance(bytes)?;
        debug_assert!(advanced, "connection-level input flow control should never be aborted");
        // Nobody will read these bytes, so hand them straight back.
        if let Some(size) = self.input.try_update_window(bytes).filter(|size| *size > 0) {
            if let Err(err) = self.frame_writer.write_window_update(0, size) {
                trace!(%err, "dropping WINDOW_UPDATE");
            }
        }
        Ok(())
    }

    /// WINDOW_UPDATE on stream 0. A zero increment is a PROTOCOL_ERROR and
    /// growing the window past `MAX_WINDOW_SIZE` a FLOW_CONTROL_ERROR; both
    /// end the connection.
    pub fn on_window_update(&self, increment: u32) -> Result<(), FlowControlError> {
        if increment == 0 {
            debug!("zero connection window increment");
            return Err(FlowControlError::ZeroWindowIncrement);
        }
        let updated = self
            .output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_update_window(i64::from(increment));
        if !updated {
            debug!(increment, "connection send window overflow");
            return Err(FlowControlError::WindowOverflow { increment });
        }
        Ok(())
    }

    /// The peer changed SETTINGS_INITIAL_WINDOW_SIZE. Returns the delta the
    /// caller applies with [`StreamOutputFlowControl::try_update_window`] to
    /// every open stream; streams opened later start at the new size. A
    /// stream whose update is rejected is also a FLOW_CONTROL_ERROR.
    pub fn on_peer_initial_window_size(&mut self, new_size: u32) -> Result<i64, FlowControlError> {
        if new_size > MAX_WINDOW_SIZE {
            debug!(new_size, "peer initial window size out of range");
            return Err(FlowControlError::InitialWindowSizeTooLarge(new_size));
        }
        let delta = window_size_delta(self.peer_initial_window_size, new_size);
        self.peer_initial_window_size = new_size;
        Ok(delta)
    }

    /// Connection teardown: stop WINDOW_UPDATEs on the connection so aborting
    /// each stream stays silent, then wake every writer still blocked on the
    /// connection send window.
    pub fn abort(&self) {
        self.input.stop_window_updates();
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .abort();
    }
}
