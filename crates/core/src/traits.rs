//! Core traits for state machines and the runners that drive them.

use crate::{Action, Event, TimerId};
use std::time::Duration;

/// A state machine that processes events.
///
/// The cluster engine is implemented as a state machine that is:
///
/// - **Synchronous**: No async, no `.await`
/// - **Deterministic**: Same state + event = same actions
/// - **Pure-ish**: Mutates self, but performs no I/O
///
/// # Example
///
/// ```ignore
/// impl StateMachine for ClusterStateMachine {
///     fn handle(&mut self, event: Event) -> Vec<Action> {
///         match event {
///             Event::Tick => self.on_tick(),
///             Event::RebalanceSettled => self.on_rebalance_settled(),
///             Event::Command { request_id, command } => { /* ... */ }
///         }
///     }
///
///     fn set_time(&mut self, now: Duration) {
///         self.now = now;
///     }
/// }
/// ```
pub trait StateMachine {
    /// Process an event, returning actions to perform.
    ///
    /// # Guarantees
    ///
    /// - **Synchronous**: This method never blocks or awaits
    /// - **Deterministic**: Given the same state and event, always returns the same actions
    /// - **No I/O**: Timers and result delivery are performed by the runner via the returned actions
    fn handle(&mut self, event: Event) -> Vec<Action>;

    /// Set the current time.
    ///
    /// Called by the runner before each `handle()` call to provide the
    /// current simulation or wall-clock time.
    fn set_time(&mut self, now: Duration);

    /// Get the current time.
    ///
    /// Returns the time that was last set via `set_time()`.
    fn now(&self) -> Duration;
}

/// Abstraction for scheduling and cancelling timers.
///
/// The state machine emits `Action::SetTimer` and `Action::CancelTimer`;
/// runners convert them into runtime-specific mechanisms:
/// - Simulation: inserts into a deterministic event queue
/// - Realtime: tokio intervals and sleeps
pub trait TimerScheduler {
    /// Arm a timer, replacing any pending timer with the same id.
    fn set_timer(&mut self, id: TimerId, duration: Duration);

    /// Disarm a timer. Cancelling a timer that is not pending is a no-op.
    fn cancel_timer(&mut self, id: TimerId);
}
