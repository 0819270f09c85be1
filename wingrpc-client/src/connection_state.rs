//! Connection state machine
//!
//! This module holds the lifecycle of the single socket a client owns, as a
//! plain state machine with no I/O. `ConnectionManager` drives it and does
//! the actual opening, sending and closing.
//!
//! # Connection States
//!
//! - **Disconnected**: Initial state, or after an explicit `disconnect()`
//! - **Connecting**: A connect attempt is in flight
//! - **Connected**: The socket is open and the receive loop is running
//! - **Failed**: The attempt failed, or the open socket errored or closed
//!
//! # State Transitions
//!
//! ```text
//!                 connect                opened
//! Disconnected ────────────→ Connecting ────────→ Connected
//!      ↑           connect ↗     │ open failed        │ lost
//!      │                  /      ↓                    │
//!      │              Failed ←────────────────────────┘
//!      │                         │
//!      └──── disconnect ─────────┘   (from any state)
//! ```
//!
//! # Generations
//!
//! Every connect attempt and every disconnect starts a new generation.
//! Outcomes reported by background work carry the generation they belong
//! to, and an outcome from an older generation is refused. A connect task
//! that finishes after `disconnect()`, or a receive loop of a socket that
//! has already been replaced, cannot touch the current connection.

use std::fmt;
use wingrpc_core::Error;

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection, and none being attempted
    Disconnected,
    /// A connect attempt is in flight
    Connecting,
    /// Connected and able to carry calls
    Connected,
    /// The last attempt or connection failed
    Failed,
}

impl ConnectionState {
    /// Numeric code reported by the connection state gauge
    pub fn as_metric(self) -> i64 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Failed => 3,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// State plus the resources each state owns
///
/// `A` is the in-flight attempt that concurrent connectors share. `L` is
/// the link to an open socket; it is only reachable while `Connected`, so
/// nothing can send on a socket the state machine has let go of.
pub(crate) enum Phase<A, L> {
    Disconnected,
    Connecting { attempt: A },
    Connected { link: L },
    Failed { error: Error },
}

impl<A, L> Phase<A, L> {
    pub fn state(&self) -> ConnectionState {
        match self {
            Phase::Disconnected => ConnectionState::Disconnected,
            Phase::Connecting { .. } => ConnectionState::Connecting,
            Phase::Connected { .. } => ConnectionState::Connected,
            Phase::Failed { .. } => ConnectionState::Failed,
        }
    }
}

/// The connection lifecycle record
pub(crate) struct Lifecycle<A, L> {
    generation: u64,
    phase: Phase<A, L>,
}

impl<A, L> Lifecycle<A, L> {
    pub fn new() -> Self {
        Self {
            generation: 0,
            phase: Phase::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.phase.state()
    }

    pub fn phase(&self) -> &Phase<A, L> {
        &self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `Disconnected | Failed → Connecting`
    ///
    /// `start` receives the new generation and returns the attempt to retain.
    /// Refused while `Connecting` or `Connected`, where the caller should
    /// join the existing attempt or connection instead.
    pub fn begin_connect(&mut self, start: impl FnOnce(u64) -> A) -> Option<u64> {
        match self.phase {
            Phase::Disconnected | Phase::Failed { .. } => {
                self.generation += 1;
                let attempt = start(self.generation);
                self.phase = Phase::Connecting { attempt };
                Some(self.generation)
            }
            Phase::Connecting { .. } | Phase::Connected { .. } => None,
        }
    }

    /// `Connecting → Connected`
    ///
    /// Hands `link` back when the attempt is stale, so the caller can close
    /// the socket it just opened.
    pub fn opened(&mut self, generation: u64, link: L) -> Result<(), L> {
        if generation != self.generation || !matches!(self.phase, Phase::Connecting { .. }) {
            return Err(link);
        }
        self.phase = Phase::Connected { link };
        Ok(())
    }

    /// `Connecting → Failed`
    pub fn open_failed(&mut self, generation: u64, error: Error) -> bool {
        if generation != self.generation || !matches!(self.phase, Phase::Connecting { .. }) {
            return false;
        }
        self.phase = Phase::Failed { error };
        true
    }

    /// `Connected → Failed`
    ///
    /// Returns the link of the lost socket, or `None` if that socket is no
    /// longer the current one.
    pub fn lost(&mut self, generation: u64, error: Error) -> Option<L> {
        if generation != self.generation || !matches!(self.phase, Phase::Connected { .. }) {
            return None;
        }
        match std::mem::replace(&mut self.phase, Phase::Failed { error }) {
            Phase::Connected { link } => Some(link),
            _ => None,
        }
    }

    /// `any → Disconnected`
    ///
    /// Starts a new generation so in-flight work from before the call is
    /// refused, and returns the previous phase with its resources.
    pub fn disconnect(&mut self) -> Phase<A, L> {
        self.generation += 1;
        std::mem::replace(&mut self.phase, Phase::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestLifecycle = Lifecycle<&'static str, &'static str>;

    fn connecting() -> (TestLifecycle, u64) {
        let mut lifecycle = TestLifecycle::new();
        let generation = lifecycle.begin_connect(|_| "attempt").unwrap();
        (lifecycle, generation)
    }

    #[test]
    fn test_connection_state_transitions() {
        let mut lifecycle = TestLifecycle::new();
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);

        let generation = lifecycle.begin_connect(|_| "attempt").unwrap();
        assert_eq!(lifecycle.state(), ConnectionState::Connecting);

        assert!(lifecycle.opened(generation, "link").is_ok());
        assert_eq!(lifecycle.state(), ConnectionState::Connected);

        assert_eq!(lifecycle.lost(generation, Error::ConnectionClosed), Some("link"));
        assert_eq!(lifecycle.state(), ConnectionState::Failed);
    }

    #[test]
    fn test_begin_connect_passes_generation() {
        let mut lifecycle = Lifecycle::<u64, ()>::new();
        let generation = lifecycle.begin_connect(|generation| generation * 10).unwrap();

        match lifecycle.phase() {
            Phase::Connecting { attempt } => assert_eq!(*attempt, generation * 10),
            _ => panic!("Expected Connecting"),
        }
    }

    #[test]
    fn test_second_connect_joins_existing_attempt() {
        let (mut lifecycle, generation) = connecting();

        let mut started = false;
        assert!(lifecycle
            .begin_connect(|_| {
                started = true;
                "second"
            })
            .is_none());
        assert!(!started);
        assert_eq!(lifecycle.generation(), generation);

        lifecycle.opened(generation, "link").unwrap();
        assert!(lifecycle.begin_connect(|_| "third").is_none());
    }

    #[test]
    fn test_open_failure_records_error() {
        let (mut lifecycle, generation) = connecting();

        assert!(lifecycle.open_failed(generation, Error::ConnectionFailed("refused".into())));
        assert_eq!(lifecycle.state(), ConnectionState::Failed);

        match lifecycle.phase() {
            Phase::Failed { error: Error::ConnectionFailed(msg) } => assert_eq!(msg, "refused"),
            _ => panic!("Expected Failed with ConnectionFailed"),
        }
    }

    #[test]
    fn test_connect_after_failure_starts_new_generation() {
        let (mut lifecycle, first) = connecting();
        lifecycle.open_failed(first, Error::ConnectionFailed("refused".into()));

        let second = lifecycle.begin_connect(|_| "retry").unwrap();
        assert!(second > first);
        assert_eq!(lifecycle.state(), ConnectionState::Connecting);

        // The earlier attempt can no longer complete this one
        assert_eq!(lifecycle.opened(first, "old"), Err("old"));
        assert!(lifecycle.opened(second, "new").is_ok());
    }

    #[test]
    fn test_disconnect_refuses_late_open() {
        let (mut lifecycle, generation) = connecting();

        match lifecycle.disconnect() {
            Phase::Connecting { attempt } => assert_eq!(attempt, "attempt"),
            _ => panic!("Expected previous phase Connecting"),
        }
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);

        assert_eq!(lifecycle.opened(generation, "late"), Err("late"));
        assert!(!lifecycle.open_failed(generation, Error::Timeout));
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_stale_loss_is_ignored() {
        let (mut lifecycle, first) = connecting();
        lifecycle.opened(first, "first").unwrap();

        lifecycle.disconnect();
        let second = lifecycle.begin_connect(|_| "attempt").unwrap();
        lifecycle.opened(second, "second").unwrap();

        // The receive loop of the first socket reports late
        assert!(lifecycle.lost(first, Error::ConnectionClosed).is_none());
        assert_eq!(lifecycle.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_loss_only_applies_when_connected() {
        let (mut lifecycle, generation) = connecting();
        assert!(lifecycle.lost(generation, Error::ConnectionClosed).is_none());
        assert_eq!(lifecycle.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_state_display_and_metric() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::Failed.to_string(), "failed");
        assert_eq!(ConnectionState::Disconnected.as_metric(), 0);
        assert_eq!(ConnectionState::Failed.as_metric(), 3);
    }
}
