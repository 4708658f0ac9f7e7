//! Client request tracking.

use serde::{Deserialize, Serialize};

/// Opaque identifier for tracking commands through the system.
///
/// The runner maintains a map of `RequestId` -> response channel.
/// This keeps async response handling out of the sync state machine.
///
/// # Example
///
/// ```ignore
/// // In the runner:
/// let request_id = RequestId(self.next_request_id);
/// self.next_request_id += 1;
///
/// let (response_tx, response_rx) = oneshot::channel();
/// self.pending_requests.insert(request_id, response_tx);
///
/// let actions = self.cluster.handle(Event::Command { request_id, command });
///
/// // Later, when the state machine returns Action::EmitCommandResult:
/// if let Some(tx) = self.pending_requests.remove(&request_id) {
///     let _ = tx.send(result);
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Create a new request ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Get the following request ID.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}
