//! Lifecycle state machine for the supervised process slot.
//!
//! Exactly one state value exists per daemon. It is the single source of
//! truth for whether a supervised process is permitted to exist: the
//! process handle is present if and only if the state is anything other
//! than [`Lifecycle::Idle`]. Reads are lock-free; transitions are validated
//! against a fixed table and serialized through a mutex.

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};

/// Mode of the supervised process slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    /// No process running, ready to accept a start.
    Idle = 0,
    /// Process spawn in progress, not yet confirmed alive.
    Starting = 1,
    /// Process confirmed alive.
    Running = 2,
    /// Process termination in progress.
    Stopping = 3,
}

impl Lifecycle {
    /// Canonical upper-case rendering used in audit entries.
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
        }
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Idle,
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Thread-safe lifecycle state with a validated transition table.
///
/// `Idle` is both the initial state and the state every failure path
/// returns to; there is no terminal state.
#[derive(Debug)]
pub struct StateMachine {
    current: AtomicU8,
    transition_lock: Mutex<()>,
}

impl StateMachine {
    /// Builds a state machine initialized to [`Lifecycle::Idle`].
    pub fn new() -> Self {
        Self {
            current: AtomicU8::new(Lifecycle::Idle as u8),
            transition_lock: Mutex::new(()),
        }
    }

    /// Current state. Lock-free; callable from any thread.
    pub fn current(&self) -> Lifecycle {
        Lifecycle::from_raw(self.current.load(Ordering::SeqCst))
    }

    /// Atomically attempts a transition to `target`.
    ///
    /// Validates the transition table against the current state under the
    /// transition lock; on success the new state is committed and `true` is
    /// returned. Invalid transitions leave the state untouched and return
    /// `false`.
    pub fn attempt_transition(&self, target: Lifecycle) -> bool {
        let guard = self
            .transition_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let current = self.current();
        if !Self::is_valid_transition(current, target) {
            return false;
        }
        self.current.store(target as u8, Ordering::SeqCst);
        drop(guard);
        true
    }

    /// Checks the transition table without changing state.
    pub fn is_valid_transition(from: Lifecycle, to: Lifecycle) -> bool {
        match from {
            Lifecycle::Idle => to == Lifecycle::Starting,
            Lifecycle::Starting => to == Lifecycle::Running || to == Lifecycle::Idle,
            Lifecycle::Running => to == Lifecycle::Stopping || to == Lifecycle::Idle,
            Lifecycle::Stopping => to == Lifecycle::Idle,
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
