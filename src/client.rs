//! The pull-client seam: one-shot retrieval of the current backend state.
//!
//! The store issues exactly one pull per activation (plus re-pulls after
//! channel reconnects) through the [`StateClient`] trait so that it never
//! imports transport internals directly.

use async_trait::async_trait;

use crate::error::ClientError;
use crate::state::StateSnapshot;

/// Remote-procedure accessor for the current application states.
///
/// A single zero-argument call returning the authoritative full snapshot.
/// The store treats a failure as a recoverable condition (it degrades to an
/// empty snapshot), so implementations should not retry internally; they
/// report the first failure and let the caller decide.
#[async_trait]
pub trait StateClient: Send + Sync + 'static {
    /// Fetch the full collection of application states known to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or remote failure.
    async fn fetch_application_states(&self) -> Result<StateSnapshot, ClientError>;
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use tokio::sync::oneshot;

    use super::*;

    /// Scripted pull client for store tests.
    ///
    /// Serves a FIFO of prepared results, one per call. A call can be held
    /// open with a gate so tests can order the pull response relative to
    /// concurrently emitted push events. Calls beyond the script fail with
    /// a `Remote` error so a misconfigured test surfaces loudly.
    pub(crate) struct ScriptedClient {
        responses: Mutex<VecDeque<Result<StateSnapshot, ClientError>>>,
        gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        pub(crate) fn new() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                gates: Mutex::new(VecDeque::new()),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn with_response(result: Result<StateSnapshot, ClientError>) -> Self {
            let client = Self::new();
            client.push_response(result);
            client
        }

        pub(crate) fn push_response(&self, result: Result<StateSnapshot, ClientError>) {
            self.responses.lock().push_back(result);
        }

        /// Hold the next call open until the returned sender fires (or is
        /// dropped, which also releases the call).
        pub(crate) fn gate_next_call(&self) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().push_back(rx);
            tx
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StateClient for ScriptedClient {
        async fn fetch_application_states(&self) -> Result<StateSnapshot, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            // Take the gate out of the lock before awaiting it.
            let gate = self.gates.lock().pop_front();
            if let Some(gate) = gate {
                let _ = gate.await;
            }

            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Remote("no scripted response".to_string())))
        }
    }
}
