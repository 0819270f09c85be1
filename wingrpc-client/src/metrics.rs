//! Client metrics definitions
//!
//! OpenTelemetry instruments for watching client health. They are recorded
//! against the global meter provider, so they go nowhere until an
//! application installs one (for example with `init_observability`).
//!
//! # Metrics Collected
//!
//! - **connection.state**: Current connection state (gauge)
//! - **connect.attempts**: Socket opens tried, by outcome (counter)
//! - **calls.total**: Completed calls, by method and status (counter)
//! - **call.duration**: Call latency in seconds (histogram)
//! - **calls.pending**: Calls awaiting a reply (up/down counter)
//! - **replies.orphaned**: Replies with no matching call (counter)
//! - **frames.undecodable**: Inbound frames that failed to decode (counter)
//!
//! # Usage
//!
//! Metrics are recorded automatically when observability is enabled via
//! `ClientBuilder::with_observability()`.

use crate::connection_state::ConnectionState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter, UpDownCounter},
    InstrumentationScope, KeyValue,
};
use wingrpc_core::Error;

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Connection state (0=disconnected, 1=connecting, 2=connected, 3=failed)
    pub connection_state: Gauge<i64>,
    /// Socket open attempts
    pub connect_attempts: Counter<u64>,
    /// Completed calls
    pub calls_total: Counter<u64>,
    /// Call duration in seconds
    pub call_duration: Histogram<f64>,
    /// Calls currently awaiting a reply
    pub calls_pending: UpDownCounter<i64>,
    /// Replies whose id matched no pending call
    pub orphaned_replies: Counter<u64>,
    /// Inbound frames that could not be decoded
    pub undecodable_frames: Counter<u64>,
}

impl ClientMetrics {
    /// Create metrics on a meter named after the service
    pub fn new(service_name: impl Into<String>) -> Self {
        let scope = InstrumentationScope::builder(service_name.into())
            .with_version(env!("CARGO_PKG_VERSION"))
            .build();
        Self::new_with_meter(&global::meter_with_scope(scope))
    }

    /// Create metrics on a custom meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("wingrpc.client.connection.state")
                .with_description("Connection state (0=disconnected, 1=connecting, 2=connected, 3=failed)")
                .build(),
            connect_attempts: meter
                .u64_counter("wingrpc.client.connect.attempts")
                .with_description("Number of socket opens attempted")
                .build(),
            calls_total: meter
                .u64_counter("wingrpc.client.calls.total")
                .with_description("Number of completed calls")
                .build(),
            call_duration: meter
                .f64_histogram("wingrpc.client.call.duration")
                .with_description("Call duration in seconds")
                .with_unit("s")
                .build(),
            calls_pending: meter
                .i64_up_down_counter("wingrpc.client.calls.pending")
                .with_description("Number of calls awaiting a reply")
                .build(),
            orphaned_replies: meter
                .u64_counter("wingrpc.client.replies.orphaned")
                .with_description("Replies that matched no pending call")
                .build(),
            undecodable_frames: meter
                .u64_counter("wingrpc.client.frames.undecodable")
                .with_description("Inbound frames that could not be decoded")
                .build(),
        }
    }

    /// Update connection state
    pub fn update_connection_state(&self, state: ConnectionState) {
        self.connection_state.record(state.as_metric(), &[]);
    }

    /// Record one socket open and whether it succeeded
    pub fn record_connect_attempt(&self, succeeded: bool) {
        let outcome = if succeeded { "success" } else { "failure" };
        self.connect_attempts
            .add(1, &[KeyValue::new("outcome", outcome)]);
    }

    /// Record a completed call
    pub fn record_call(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.calls_total.add(1, attributes);
        self.call_duration.record(duration_secs, attributes);
    }

    /// Count a call as pending until the returned guard drops
    pub fn track_pending(&self) -> PendingGuard {
        self.calls_pending.add(1, &[]);
        PendingGuard {
            counter: self.calls_pending.clone(),
        }
    }

    /// Record a reply that matched no pending call
    pub fn record_orphaned_reply(&self) {
        self.orphaned_replies.add(1, &[]);
    }

    /// Record an inbound frame that failed to decode
    pub fn record_undecodable_frame(&self) {
        self.undecodable_frames.add(1, &[]);
    }
}

/// Decrements the pending call count on drop
pub struct PendingGuard {
    counter: UpDownCounter<i64>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.counter.add(-1, &[]);
    }
}

/// Status label for a finished call
pub(crate) fn call_status(result: &Result<serde_json::Value, Error>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(Error::JsonRpc(_)) => "remote_error",
        Err(Error::Timeout) => "timeout",
        Err(e) if e.is_connection_error() => "connection_error",
        Err(_) => "error",
    }
}
