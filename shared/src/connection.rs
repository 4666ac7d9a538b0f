//! Streaming connection lifecycle
//!
//! Both ends of the live-update channel drive the same explicit state
//! machine instead of chaining timers from callbacks. The server only ever
//! walks `Connecting -> Open -> Closed`; the browser client additionally
//! uses `Reconnecting` with exponential backoff. A deliberate teardown
//! (`Cancel`) always lands in `Closed` and nothing leaves `Closed`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Exponential backoff parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Backoff {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    /// Give up after this many consecutive failed attempts
    pub max_attempts: Option<u32>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_ms: 1_000,
            max_ms: 30_000,
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}

impl Backoff {
    /// Delay before reconnect attempt `attempt` (1-based)
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.initial_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        if delay.is_finite() {
            (delay as u64).min(self.max_ms)
        } else {
            self.max_ms
        }
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Reconnecting { attempt: u32, delay_ms: u64 },
    Closed,
}

/// Inputs that move the machine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionEvent {
    /// Handshake completed
    Opened,
    /// Socket failed or was closed by the peer
    Dropped,
    /// Backoff delay expired
    RetryElapsed,
    /// Deliberate teardown
    Cancel,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("invalid connection transition from {from:?} on {event:?}")]
pub struct TransitionError {
    pub from: ConnectionState,
    pub event: ConnectionEvent,
}

/// Explicit connection state machine with exponential backoff
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    backoff: Backoff,
    failures: u32,
}

impl ConnectionMachine {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            state: ConnectionState::Connecting,
            backoff,
            failures: 0,
        }
    }

    /// Machine for the serving side: a drop closes instead of retrying
    pub fn without_retry() -> Self {
        Self::new(Backoff {
            max_attempts: Some(0),
            ..Backoff::default()
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    /// Apply an event and return the new state
    pub fn handle(&mut self, event: ConnectionEvent) -> Result<ConnectionState, TransitionError> {
        use ConnectionEvent::*;
        use ConnectionState::*;

        let next = match (self.state, event) {
            (_, Cancel) => Closed,
            (Closed, _) => return Err(self.invalid(event)),
            (Connecting, Opened) => {
                self.failures = 0;
                Open
            }
            (Connecting, Dropped) | (Open, Dropped) => self.schedule_retry(),
            (Reconnecting { .. }, RetryElapsed) => Connecting,
            _ => return Err(self.invalid(event)),
        };

        self.state = next;
        Ok(next)
    }

    fn schedule_retry(&mut self) -> ConnectionState {
        self.failures += 1;
        match self.backoff.max_attempts {
            Some(max) if self.failures > max => ConnectionState::Closed,
            _ => ConnectionState::Reconnecting {
                attempt: self.failures,
                delay_ms: self.backoff.delay_ms(self.failures),
            },
        }
    }

    fn invalid(&self, event: ConnectionEvent) -> TransitionError {
        TransitionError {
            from: self.state,
            event,
        }
    }
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new(Backoff::default())
    }
}
