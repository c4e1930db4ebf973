//! Per-segment delivery state machine.
//!
//! ```text
//! Pending --success------------------------> Confirmed
//! Pending --permanent failure--------------> Failed
//! Pending --transient failure, budget left-> Pending (after delay)
//! Pending --transient failure, exhausted---> Failed
//! ```
//!
//! [`SegmentRetry`] holds no clock; it tells the caller how long to wait and
//! the caller does the sleeping.

use std::time::Duration;

use tracing::{debug, warn};

use super::{
    SendError,
    backoff::{BackoffConfig, BackoffDelays},
};
use crate::protocol::{SegmentIndex, StreamResponse};

/// Delivery state of one segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentState {
    /// Waiting for attempt number `attempt` (1-based) to complete.
    Pending {
        /// Attempt in flight.
        attempt: u32,
    },
    /// The server accepted the segment.
    Confirmed,
    /// Delivery was abandoned.
    Failed,
}

/// What the caller should do after an attempt completes.
#[derive(Debug)]
pub(crate) enum Step {
    /// Delivery succeeded.
    Confirmed(StreamResponse),
    /// Sleep for the delay, then attempt again.
    Retry(Duration),
    /// Give up with this error.
    Failed(SendError),
}

/// Retry bookkeeping for a single segment.
#[derive(Debug)]
pub(crate) struct SegmentRetry {
    index: SegmentIndex,
    state: SegmentState,
    max_attempts: u32,
    delays: BackoffDelays,
}

impl SegmentRetry {
    pub(crate) fn new(index: SegmentIndex, backoff: &BackoffConfig) -> Self {
        let backoff = backoff.normalized();
        Self {
            index,
            state: SegmentState::Pending { attempt: 1 },
            max_attempts: backoff.max_attempts,
            delays: backoff.delays(),
        }
    }

    pub(crate) const fn state(&self) -> SegmentState { self.state }

    /// Feed the outcome of the pending attempt into the state machine.
    ///
    /// Unsuccessful responses are classified with
    /// [`SendError::from_response`]. Completing an already settled segment
    /// fails without changing its state.
    pub(crate) fn complete(&mut self, outcome: Result<StreamResponse, SendError>) -> Step {
        let SegmentState::Pending { attempt } = self.state else {
            return Step::Failed(SendError::Protocol(format!(
                "segment {} already settled as {:?}",
                self.index, self.state
            )));
        };
        let err = match outcome {
            Ok(response) if response.is_success() => {
                self.state = SegmentState::Confirmed;
                debug!(segment = %self.index, attempt, "segment confirmed");
                return Step::Confirmed(response);
            }
            Ok(response) => SendError::from_response(&response),
            Err(err) => err,
        };
        warn!(
            segment = %self.index,
            attempt,
            error = %err,
            "error sending segment"
        );
        if !err.is_retryable() {
            self.state = SegmentState::Failed;
            return Step::Failed(err);
        }
        if attempt >= self.max_attempts {
            self.state = SegmentState::Failed;
            return Step::Failed(SendError::RetryExhausted {
                index: self.index,
                attempts: attempt,
                last: Box::new(err),
            });
        }
        let delay = self.delays.next().unwrap_or(Duration::ZERO);
        self.state = SegmentState::Pending {
            attempt: attempt + 1,
        };
        debug!(segment = %self.index, next_attempt = attempt + 1, ?delay, "segment retry scheduled");
        Step::Retry(delay)
    }
}
