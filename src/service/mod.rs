// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Asynchronous request lifecycle
//!
//! A service runs an exchange on a background task and reports what
//! happens through listeners:
//!
//! ```text
//! READY -> CONNECTING -> SENDING -> SENT -> RECEIVING -> DONE
//!            \-----------\-----------\-------\--------> FAILED | ABORTED
//! ```
//!
//! Listeners are called one at a time, in the order the changes happened,
//! on a dispatcher task owned by the service.

mod decode;
mod http;
mod lifecycle;
mod notify;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::session::State;

pub use decode::{JsonDecoder, Passthrough, ResponseDecoder, TextDecoder};
pub use http::HttpService;
pub use lifecycle::{ServiceCore, WorkerTicket};
pub use notify::ListenerId;

/// A request/response cycle that runs in the background
#[async_trait]
pub trait Service: Send + Sync {
    fn core(&self) -> &ServiceCore;

    /// Start the cycle
    fn send(&self) -> Result<()>;

    fn state(&self) -> State {
        self.core().state()
    }

    /// Completed fraction of the current phase, or -1 when unknown
    fn progress(&self) -> f32 {
        self.core().progress()
    }

    /// Cancel the running cycle; returns whether this call did it
    fn abort(&self) -> bool {
        self.core().abort()
    }

    /// Fail the running cycle
    fn fail(&self, error: Error) -> bool {
        self.core().fail(error)
    }

    fn add_state_listener<F>(&self, listener: F) -> ListenerId
    where
        Self: Sized,
        F: Fn(State, State) + Send + Sync + 'static,
    {
        self.core().add_state_listener(listener)
    }

    fn add_progress_listener<F>(&self, listener: F) -> ListenerId
    where
        Self: Sized,
        F: Fn(f32, f32) + Send + Sync + 'static,
    {
        self.core().add_progress_listener(listener)
    }

    fn add_done_listener<F>(&self, listener: F) -> ListenerId
    where
        Self: Sized,
        F: Fn() + Send + Sync + 'static,
    {
        self.core().add_done_listener(listener)
    }

    fn add_failure_listener<F>(&self, listener: F) -> ListenerId
    where
        Self: Sized,
        F: Fn(&Arc<Error>) + Send + Sync + 'static,
    {
        self.core().add_failure_listener(listener)
    }

    fn add_abort_listener<F>(&self, listener: F) -> ListenerId
    where
        Self: Sized,
        F: Fn() + Send + Sync + 'static,
    {
        self.core().add_abort_listener(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.core().remove_listener(id)
    }

    /// Wait until every notification queued so far has been delivered
    async fn flush(&self) {
        self.core().flush().await
    }
}
