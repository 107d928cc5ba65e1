//! Signal handling (SIGINT/SIGTERM)
//!
//! The first signal trips the pipeline's cancellation token; the pipeline
//! stops at the next stage boundary and nothing is committed. A second
//! signal exits the process at once with [`EXIT_CODE_CANCELLED`]. The atomic
//! committer never leaves a partial destination, so exiting mid-run is safe.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::pipeline::Pipeline;

/// Exit code for cancelled runs
pub const EXIT_CODE_CANCELLED: i32 = 80;

/// Signal handler state
#[derive(Debug, Default)]
pub struct SignalState {
    token: CancellationToken,
    signal_count: AtomicU8,
}

impl SignalState {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            signal_count: AtomicU8::new(0),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn signal_count(&self) -> u8 {
        self.signal_count.load(Ordering::SeqCst)
    }

    /// Record a signal and decide what to do about it.
    pub fn handle_signal(&self) -> SignalAction {
        let count = self.signal_count.fetch_add(1, Ordering::SeqCst);
        match count {
            0 => {
                self.token.cancel();
                SignalAction::InitiateCancellation
            }
            1 => SignalAction::ImmediateExit,
            _ => SignalAction::Ignore,
        }
    }
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: stop at the next stage boundary
    InitiateCancellation,
    /// Second signal: exit now
    ImmediateExit,
    /// Third+ signal
    Ignore,
}

pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            state: Arc::new(SignalState::new(token)),
        }
    }

    /// Handler that trips `pipeline`'s cancellation token.
    pub fn for_pipeline(pipeline: &Pipeline) -> Self {
        Self::new(pipeline.token().clone())
    }

    pub fn state(&self) -> Arc<SignalState> {
        Arc::clone(&self.state)
    }

    /// Install the process-wide handler. Call once at startup.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let state = Arc::clone(&self.state);
        ctrlc::set_handler(move || match state.handle_signal() {
            SignalAction::InitiateCancellation => {
                tracing::warn!("received interrupt, cancelling after the current stage");
            }
            SignalAction::ImmediateExit => {
                eprintln!("\nReceived second interrupt, exiting immediately...");
                std::process::exit(EXIT_CODE_CANCELLED);
            }
            SignalAction::Ignore => {}
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_state_initial() {
        let state = SignalState::default();
        assert!(!state.is_cancel_requested());
        assert_eq!(state.signal_count(), 0);
    }

    #[test]
    fn test_first_signal_trips_token() {
        let token = CancellationToken::new();
        let state = SignalState::new(token.clone());

        assert_eq!(state.handle_signal(), SignalAction::InitiateCancellation);
        assert!(token.is_cancelled());
        assert_eq!(state.signal_count(), 1);
    }

    #[test]
    fn test_second_signal_requests_immediate_exit() {
        let state = SignalState::default();
        state.handle_signal();
        assert_eq!(state.handle_signal(), SignalAction::ImmediateExit);
        assert_eq!(state.handle_signal(), SignalAction::Ignore);
        assert_eq!(state.signal_count(), 3);
    }

    #[test]
    fn test_handler_shares_state() {
        let token = CancellationToken::new();
        let handler = SignalHandler::new(token.clone());
        handler.state().handle_signal();
        assert!(token.is_cancelled());
    }
}
