//! Deterministic simulation runner.
//!
//! Drives a single [`ClusterStateMachine`] on a virtual clock. Timer
//! actions become queue entries, so a run of ticks that would take minutes
//! of wall-clock time completes instantly and identically every time.

use crate::event_queue::EventKey;
use brokersim_cluster::{ClusterConfig, ClusterStateMachine};
use brokersim_core::{
    Action, Command, CommandError, Event, RequestId, StateMachine, TimerId, TimerScheduler,
};
use brokersim_types::{ClusterSnapshot, SessionStatus};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulationStats {
    /// Total events processed from the queue.
    pub events_processed: u64,
    /// Events processed by priority (commands, timers).
    pub events_by_priority: [u64; 2],
    /// Total actions generated by the state machine.
    pub actions_generated: u64,
    /// Tick timers fired.
    pub ticks: u64,
    /// Rebalance settle timers fired.
    pub settles: u64,
    /// Commands applied, whether submitted directly or scheduled.
    pub commands: u64,
    /// Commands the engine rejected.
    pub commands_rejected: u64,
    /// Timers set.
    pub timers_set: u64,
    /// Timers cancelled.
    pub timers_cancelled: u64,
}

/// A session status change observed by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub at: Duration,
    pub from: SessionStatus,
    pub to: SessionStatus,
}

/// Deterministic simulation runner.
///
/// Processes events in deterministic order and performs the actions the
/// cluster returns. Given the same config (seed included) and the same
/// command sequence, produces identical results every run.
pub struct SimulationRunner {
    cluster: ClusterStateMachine,

    /// Global event queue, ordered deterministically.
    event_queue: BTreeMap<EventKey, Event>,

    /// Sequence counter for deterministic ordering.
    sequence: u64,

    /// Current simulation time.
    now: Duration,

    /// Timer registry for cancellation and replacement.
    timers: HashMap<TimerId, EventKey>,

    next_request: RequestId,

    /// Outcomes of scheduled commands, by request.
    results: BTreeMap<RequestId, Result<(), CommandError>>,

    status_changes: Vec<StatusTransition>,

    stats: SimulationStats,
}

impl SimulationRunner {
    /// Create a runner around a fresh cluster.
    pub fn new(config: ClusterConfig) -> Self {
        info!(
            seed = config.seed,
            tick_interval = ?config.tick_interval,
            "Created simulation runner"
        );
        Self {
            cluster: ClusterStateMachine::new(config),
            event_queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            timers: HashMap::new(),
            next_request: RequestId::new(1),
            results: BTreeMap::new(),
            status_changes: Vec::new(),
            stats: SimulationStats::default(),
        }
    }

    pub fn cluster(&self) -> &ClusterStateMachine {
        &self.cluster
    }

    pub fn snapshot(&self) -> ClusterSnapshot {
        self.cluster.snapshot()
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Current simulation time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of events waiting in the queue.
    pub fn pending_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Time of the next queued event.
    pub fn next_event_time(&self) -> Option<Duration> {
        self.event_queue.first_key_value().map(|(key, _)| key.time)
    }

    /// Whether a timer is armed.
    pub fn has_timer(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    /// Outcome of a scheduled command, once it has been applied.
    pub fn result(&self, request_id: RequestId) -> Option<&Result<(), CommandError>> {
        self.results.get(&request_id)
    }

    /// Every status change observed so far, in order.
    pub fn status_changes(&self) -> &[StatusTransition] {
        &self.status_changes
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Input
    // ═══════════════════════════════════════════════════════════════════════

    /// Apply a command now and return the state it produced.
    pub fn submit(&mut self, command: Command) -> Result<ClusterSnapshot, CommandError> {
        self.cluster.set_time(self.now);
        self.stats.commands += 1;
        match self.cluster.execute(command) {
            Ok(actions) => {
                self.perform(actions);
                Ok(self.cluster.snapshot())
            }
            Err(error) => {
                self.stats.commands_rejected += 1;
                Err(error)
            }
        }
    }

    /// Queue a command for a later instant.
    ///
    /// Times in the past are clamped to now. The outcome is available via
    /// [`SimulationRunner::result`] once the command has been applied.
    pub fn schedule(&mut self, at: Duration, command: Command) -> RequestId {
        let request_id = self.next_request;
        self.next_request = request_id.next();
        let at = at.max(self.now);
        trace!(%request_id, command = command.type_name(), ?at, "Command scheduled");
        self.schedule_event(
            at,
            Event::Command {
                request_id,
                command,
            },
        );
        request_id
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Driving the clock
    // ═══════════════════════════════════════════════════════════════════════

    /// Process the next queued event, advancing the clock to it.
    ///
    /// Returns the time of the processed event, or `None` if the queue is
    /// empty.
    pub fn step(&mut self) -> Option<Duration> {
        let (key, event) = self.event_queue.pop_first()?;
        self.now = key.time;

        // A fired timer is no longer pending.
        self.timers.retain(|_, pending| *pending != key);

        trace!(time = ?self.now, event = event.type_name(), "Processing event");

        self.stats.events_processed += 1;
        self.stats.events_by_priority[key.priority as usize] += 1;
        match &event {
            Event::Tick => self.stats.ticks += 1,
            Event::RebalanceSettled => self.stats.settles += 1,
            Event::Command { .. } => self.stats.commands += 1,
        }

        self.cluster.set_time(self.now);
        let actions = self.cluster.handle(event);
        self.perform(actions);
        Some(key.time)
    }

    /// Process every event scheduled at or before `end_time`.
    ///
    /// The clock always ends at `end_time`, even if the queue ran dry.
    pub fn run_until(&mut self, end_time: Duration) {
        while let Some((key, _)) = self.event_queue.first_key_value() {
            if key.time > end_time {
                break;
            }
            self.step();
        }
        if self.now < end_time {
            self.now = end_time;
        }
        debug!(
            now = ?self.now,
            events_processed = self.stats.events_processed,
            remaining_events = self.event_queue.len(),
            "Simulation advanced"
        );
    }

    /// Advance the clock by `duration`.
    pub fn run_for(&mut self, duration: Duration) {
        self.run_until(self.now + duration);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Actions
    // ═══════════════════════════════════════════════════════════════════════

    fn perform(&mut self, actions: Vec<Action>) {
        self.stats.actions_generated += actions.len() as u64;
        for action in actions {
            self.process_action(action);
        }
    }

    fn process_action(&mut self, action: Action) {
        match action {
            Action::SetTimer { id, duration } => self.set_timer(id, duration),
            Action::CancelTimer { id } => self.cancel_timer(id),
            Action::EmitCommandResult { request_id, result } => {
                if let Err(error) = &result {
                    self.stats.commands_rejected += 1;
                    warn!(%request_id, %error, "Scheduled command rejected");
                }
                self.results.insert(request_id, result);
            }
            Action::EmitStatusChanged { from, to } => {
                self.status_changes.push(StatusTransition {
                    at: self.now,
                    from,
                    to,
                });
            }
        }
    }

    fn schedule_event(&mut self, time: Duration, event: Event) -> EventKey {
        self.sequence += 1;
        let key = EventKey::new(time, &event, self.sequence);
        self.event_queue.insert(key, event);
        key
    }
}

impl TimerScheduler for SimulationRunner {
    fn set_timer(&mut self, id: TimerId, duration: Duration) {
        if let Some(previous) = self.timers.remove(&id) {
            self.event_queue.remove(&previous);
        }
        let key = self.schedule_event(self.now + duration, id.event());
        self.timers.insert(id, key);
        self.stats.timers_set += 1;
    }

    fn cancel_timer(&mut self, id: TimerId) {
        if let Some(key) = self.timers.remove(&id) {
            self.event_queue.remove(&key);
            self.stats.timers_cancelled += 1;
        }
    }
}
