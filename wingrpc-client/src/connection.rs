//! Connection management
//!
//! `ConnectionManager` owns the lifecycle record, performs the I/O behind
//! each transition and runs the receive loop of the current socket.
//!
//! # Connect Attempts
//!
//! A connect attempt runs in its own task. The task is wrapped in a shared
//! future and stored in the `Connecting` phase, so every caller that asks to
//! connect (or to invoke) while the attempt is in flight awaits the same
//! outcome, and exactly one socket is opened. The task keeps running if all
//! of its waiters go away. `disconnect()` aborts it, and every waiter then
//! sees `ConnectionClosed`.
//!
//! # Receive Loop
//!
//! Each open socket gets one receive loop. It processes frames strictly in
//! arrival order: decode, then resolve the matching pending call. Frames
//! that do not decode and replies with an unknown id are logged and dropped.
//! When the stream errors or ends, the loop moves the connection to
//! `Failed` and every pending call is rejected with `ConnectionClosed`.
//!
//! The loop only holds a weak reference to the manager. Dropping the last
//! client drops the socket's link, which stops the loop and closes the
//! socket.

use crate::connection_state::{ConnectionState, Lifecycle, Phase};
use crate::metrics::ClientMetrics;
use crate::request::PendingCalls;
use crate::retry::RetryStrategy;
use crate::transport::{Connector, FrameSink, FrameStream};
use futures::future::{BoxFuture, Shared};
use futures::{FutureExt, SinkExt, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::AbortHandle;
use tracing::Level;
use url::Url;
use wingrpc_core::{codec, Error, Result};

/// Outcome of a connect attempt, shared by everyone waiting on it
type SharedOutcome = Shared<BoxFuture<'static, Result<()>>>;

/// What the `Connecting` phase owns
struct Attempt {
    url: Url,
    outcome: SharedOutcome,
    task: AbortHandle,
}

/// Outbound half of an open socket, shared by concurrent callers
///
/// The async mutex is fair, so frames go out in the order callers reached
/// the sink.
pub(crate) type SharedSink = Arc<AsyncMutex<FrameSink>>;

/// What the `Connected` phase owns
struct Link {
    url: Url,
    sink: SharedSink,
    /// Dropping or firing this stops the receive loop
    closer: oneshot::Sender<()>,
}

pub(crate) struct ConnectionManager {
    lifecycle: Mutex<Lifecycle<Attempt, Link>>,
    connector: Arc<dyn Connector>,
    retry: Box<dyn RetryStrategy>,
    connect_timeout: Duration,
    pending: PendingCalls,
    metrics: Option<Arc<ClientMetrics>>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        retry: Box<dyn RetryStrategy>,
        connect_timeout: Duration,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        Self {
            lifecycle: Mutex::new(Lifecycle::new()),
            connector,
            retry,
            connect_timeout,
            pending: PendingCalls::new(),
            metrics,
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle<Attempt, Link>> {
        // Transitions are single assignments; a poisoned record is intact.
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ConnectionState {
        self.lifecycle().state()
    }

    pub fn pending(&self) -> &PendingCalls {
        &self.pending
    }

    pub fn metrics(&self) -> Option<&ClientMetrics> {
        self.metrics.as_deref()
    }

    fn report_state(&self, state: ConnectionState) {
        if let Some(m) = &self.metrics {
            m.update_connection_state(state);
        }
    }

    /// Connect to `url`, or join the connection already in progress
    ///
    /// - `Connected`: returns immediately
    /// - `Connecting`: awaits the in-flight attempt
    /// - `Disconnected` or `Failed`: starts a new attempt and awaits it
    pub async fn connect(self: &Arc<Self>, url: Url) -> Result<()> {
        let attempt = {
            let mut lifecycle = self.lifecycle();
            match lifecycle.phase() {
                Phase::Connected { link } => {
                    if link.url != url {
                        tracing::warn!(
                            connected_to = %link.url,
                            requested = %url,
                            "Already connected; ignoring connect to a different URL"
                        );
                    }
                    return Ok(());
                }
                Phase::Connecting { attempt } => {
                    if attempt.url != url {
                        tracing::warn!(
                            connecting_to = %attempt.url,
                            requested = %url,
                            "Already connecting; joining the attempt to a different URL"
                        );
                    }
                    attempt.outcome.clone()
                }
                Phase::Disconnected | Phase::Failed { .. } => {
                    let manager = Arc::clone(self);
                    lifecycle.begin_connect(move |generation| {
                        let task = tokio::spawn(manager.establish(url.clone(), generation));
                        let abort = task.abort_handle();
                        let outcome = task
                            .map(|joined| {
                                joined.unwrap_or_else(|e| {
                                    if e.is_cancelled() {
                                        Err(Error::ConnectionClosed)
                                    } else {
                                        Err(Error::Internal(format!("connect task failed: {}", e)))
                                    }
                                })
                            })
                            .boxed()
                            .shared();
                        Attempt {
                            url,
                            outcome,
                            task: abort,
                        }
                    });
                    self.report_state(ConnectionState::Connecting);
                    match lifecycle.phase() {
                        Phase::Connecting { attempt } => attempt.outcome.clone(),
                        _ => return Err(Error::Internal("connect attempt was not recorded".into())),
                    }
                }
            }
        };

        attempt.await
    }

    /// Wait until calls can be sent
    ///
    /// Fails immediately when no connect was issued, or with the recorded
    /// error after a failure.
    pub async fn ready(&self) -> Result<()> {
        let attempt = {
            let lifecycle = self.lifecycle();
            match lifecycle.phase() {
                Phase::Connected { .. } => return Ok(()),
                Phase::Connecting { attempt } => attempt.outcome.clone(),
                Phase::Disconnected => return Err(Error::NotConnected),
                Phase::Failed { error } => return Err(error.clone()),
            }
        };
        attempt.await
    }

    /// The sink of the current socket
    pub fn sink(&self) -> Result<SharedSink> {
        match self.lifecycle().phase() {
            Phase::Connected { link } => Ok(Arc::clone(&link.sink)),
            Phase::Disconnected => Err(Error::NotConnected),
            Phase::Failed { error } => Err(error.clone()),
            // Reconnected between `ready()` and here: the old socket is gone.
            Phase::Connecting { .. } => Err(Error::ConnectionClosed),
        }
    }

    /// Close the socket (if any) and reject every pending call
    ///
    /// Works from any state. A connect attempt in flight is aborted; its
    /// waiters receive `ConnectionClosed`.
    pub async fn disconnect(&self) {
        let previous = {
            let mut lifecycle = self.lifecycle();
            let previous = lifecycle.disconnect();
            let rejected = self.pending.fail_all(Error::ConnectionClosed);
            if rejected > 0 {
                tracing::info!(
                    rejected,
                    generation = lifecycle.generation(),
                    "Rejected pending calls on disconnect"
                );
            }
            previous
        };
        self.report_state(ConnectionState::Disconnected);

        match previous {
            Phase::Connected { link } => {
                tracing::info!(url = %link.url, "Disconnecting");
                let _ = link.closer.send(());
                if let Err(e) = link.sink.lock().await.close().await {
                    tracing::debug!(error = %e, "Error while closing socket");
                }
            }
            Phase::Connecting { attempt } => {
                tracing::info!(url = %attempt.url, "Abandoning connect attempt");
                attempt.task.abort();
            }
            Phase::Disconnected | Phase::Failed { .. } => {}
        }
    }

    /// Body of a connect attempt
    async fn establish(self: Arc<Self>, url: Url, generation: u64) -> Result<()> {
        tracing::info!(url = %url, generation, "Connecting");

        let (sink, stream) = match self.open_with_retry(&url, generation).await {
            Ok(halves) => halves,
            Err(error) => {
                let failed = self.lifecycle().open_failed(generation, error.clone());
                if !failed {
                    tracing::debug!(url = %url, generation, "Connect attempt superseded");
                    return Err(Error::ConnectionClosed);
                }
                tracing::error!(url = %url, error = %error, "Connection failed");
                self.report_state(ConnectionState::Failed);
                return Err(error);
            }
        };

        let (closer, close_signal) = oneshot::channel();
        let link = Link {
            url: url.clone(),
            sink: Arc::new(AsyncMutex::new(sink)),
            closer,
        };

        let installed = self.lifecycle().opened(generation, link);
        match installed {
            Ok(()) => {
                self.report_state(ConnectionState::Connected);
                tokio::spawn(receive_loop(
                    Arc::downgrade(&self),
                    self.pending.clone(),
                    self.metrics.clone(),
                    stream,
                    close_signal,
                    generation,
                ));
                tracing::info!(url = %url, generation, "Connected");
                Ok(())
            }
            Err(stale) => {
                tracing::debug!(url = %url, generation, "Connect superseded; closing new socket");
                let _ = stale.sink.lock().await.close().await;
                Err(Error::ConnectionClosed)
            }
        }
    }

    /// Open the socket, retrying per the configured strategy
    ///
    /// Gives up with `ConnectionClosed` as soon as `generation` is no longer
    /// current.
    async fn open_with_retry(
        &self,
        url: &Url,
        generation: u64,
    ) -> Result<(FrameSink, FrameStream)> {
        let mut attempt = 0u32;
        loop {
            if !self.is_current(generation) {
                return Err(Error::ConnectionClosed);
            }
            let opened = tokio::time::timeout(self.connect_timeout, self.connector.open(url)).await;
            let error = match opened {
                Ok(Ok(halves)) => {
                    self.record_open(true);
                    return Ok(halves);
                }
                Ok(Err(e)) => e,
                Err(_) => Error::Timeout,
            };
            self.record_open(false);

            match self.retry.next_delay(attempt) {
                Some(delay) => {
                    tracing::warn!(
                        url = %url,
                        error = %error,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Connect failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return Err(error),
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lifecycle().generation() == generation
    }

    fn record_open(&self, succeeded: bool) {
        if let Some(m) = &self.metrics {
            m.record_connect_attempt(succeeded);
        }
    }

    /// `Connected → Failed`, reported by the receive loop of `generation`
    fn connection_lost(&self, generation: u64) {
        let mut lifecycle = self.lifecycle();
        if lifecycle.lost(generation, Error::ConnectionClosed).is_none() {
            return;
        }
        // Rejected under the lifecycle lock so a call registered on a newer
        // connection cannot be swept up.
        let rejected = self.pending.fail_all(Error::ConnectionClosed);
        drop(lifecycle);

        self.report_state(ConnectionState::Failed);
        tracing::warn!(generation, rejected, "Connection lost");
    }
}

async fn receive_loop(
    manager: Weak<ConnectionManager>,
    pending: PendingCalls,
    metrics: Option<Arc<ClientMetrics>>,
    mut stream: FrameStream,
    mut close_signal: oneshot::Receiver<()>,
    generation: u64,
) {
    let reason = loop {
        tokio::select! {
            _ = &mut close_signal => {
                tracing::debug!(generation, "Receive loop stopped");
                return;
            }
            frame = stream.next() => match frame {
                Some(Ok(frame)) => handle_frame(&pending, metrics.as_deref(), &frame),
                Some(Err(e)) => break e,
                None => break Error::ConnectionClosed,
            },
        }
    };

    tracing::warn!(generation, error = %reason, "Socket closed");
    match manager.upgrade() {
        Some(manager) => manager.connection_lost(generation),
        None => {
            pending.fail_all(Error::ConnectionClosed);
        }
    }
}

fn handle_frame(pending: &PendingCalls, metrics: Option<&ClientMetrics>, frame: &[u8]) {
    if tracing::enabled!(Level::DEBUG) {
        tracing::debug!(frame = %codec::frame_text(frame), "Received frame");
    }

    match codec::decode_reply(frame) {
        Ok(reply) => {
            let id = reply.id;
            if !pending.resolve(id, reply.into_result()) {
                if let Some(m) = metrics {
                    m.record_orphaned_reply();
                }
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Dropping undecodable frame");
            if let Some(m) = metrics {
                m.record_undecodable_frame();
            }
        }
    }
}
