// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Exchange lifecycle states and the hooks that observe them

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a request/response exchange
///
/// ```text
/// READY -> CONNECTING -> SENDING -> SENT -> RECEIVING -> DONE
/// CONNECTING|SENDING|SENT|RECEIVING -> FAILED | ABORTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum State {
    #[default]
    Ready,
    Connecting,
    Sending,
    Sent,
    Receiving,
    Done,
    Failed,
    Aborted,
}

impl State {
    /// DONE, FAILED and ABORTED end an exchange
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Done | State::Failed | State::Aborted)
    }

    /// States in which bytes are moving or about to move
    pub fn is_active(self) -> bool {
        matches!(
            self,
            State::Connecting | State::Sending | State::Sent | State::Receiving
        )
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Ready => "READY",
            State::Connecting => "CONNECTING",
            State::Sending => "SENDING",
            State::Sent => "SENT",
            State::Receiving => "RECEIVING",
            State::Done => "DONE",
            State::Failed => "FAILED",
            State::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

/// Receives state and progress changes of a running exchange, in the order
/// they happen. Called on the task executing the exchange.
pub trait ExchangeObserver: Send + Sync {
    fn state_changed(&self, _old: State, _new: State) {}

    /// `total_bytes` is `None` when the size is unknown
    fn progress_changed(&self, _bytes_so_far: u64, _total_bytes: Option<u64>) {}
}

impl ExchangeObserver for () {}

/// Write access to a session's state, granted to the services that wrap it
pub trait StateControl {
    /// Set the state without notifying anyone
    fn force_state(&mut self, state: State);
}

/// Fraction of the transfer completed, or -1 when the total is unknown
pub fn progress_of(bytes_so_far: u64, total_bytes: Option<u64>) -> f32 {
    match total_bytes {
        Some(total) if total > 0 => bytes_so_far as f32 / total as f32,
        _ => -1.0,
    }
}
