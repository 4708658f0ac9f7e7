//! The wall-clock event loop.

use crate::handle::{CommandRequest, RealtimeHandle};
use crate::RuntimeError;
use brokersim_cluster::{ClusterConfig, ClusterStateMachine};
use brokersim_core::{Action, Event, RequestId, StateMachine, TimerId, TimerScheduler};
use brokersim_types::ClusterSnapshot;
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, info, trace, warn};

/// Capacity of the command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Drives a [`ClusterStateMachine`] on the tokio clock.
///
/// A single task owns the state machine; commands arrive over an `mpsc`
/// channel and are applied in arrival order, ticks come from an
/// `interval`, and the rebalance settle timer is a `sleep`. Every event
/// publishes a fresh snapshot on a `watch` channel.
pub struct RealtimeRunner {
    cluster: ClusterStateMachine,

    /// Instant the runner started, the zero of the engine clock.
    started: Instant,

    commands: mpsc::Receiver<CommandRequest>,

    snapshots: watch::Sender<ClusterSnapshot>,

    /// Armed while the session is running.
    tick: Option<Interval>,

    /// Armed while a rebalance is settling.
    settle: Option<Pin<Box<Sleep>>>,

    /// Replies owed to callers, by request.
    pending: HashMap<RequestId, oneshot::Sender<Result<ClusterSnapshot, RuntimeError>>>,

    next_request: RequestId,
}

impl RealtimeRunner {
    /// Spawn the event loop on the current runtime.
    ///
    /// The loop stops once every [`RealtimeHandle`] has been dropped.
    pub fn spawn(config: ClusterConfig) -> (RealtimeHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let cluster = ClusterStateMachine::new(config);
        let (snapshot_tx, snapshot_rx) = watch::channel(cluster.snapshot());

        let runner = Self {
            cluster,
            started: Instant::now(),
            commands: command_rx,
            snapshots: snapshot_tx,
            tick: None,
            settle: None,
            pending: HashMap::new(),
            next_request: RequestId::new(1),
        };
        let task = tokio::spawn(runner.run());
        (RealtimeHandle::new(command_tx, snapshot_rx), task)
    }

    async fn run(mut self) {
        info!(
            tick_interval = ?self.cluster.config().tick_interval,
            "Realtime runner started"
        );

        loop {
            tokio::select! {
                // Commands first: user actions take effect before a timer
                // that is ready at the same moment.
                biased;

                request = self.commands.recv() => match request {
                    Some(request) => self.on_request(request),
                    None => break,
                },

                _ = next_tick(&mut self.tick) => {
                    self.dispatch(Event::Tick);
                }

                _ = settled(&mut self.settle) => {
                    self.settle = None;
                    self.dispatch(Event::RebalanceSettled);
                }
            }
        }

        info!("Realtime runner stopped");
    }

    fn on_request(&mut self, request: CommandRequest) {
        let request_id = self.next_request;
        self.next_request = request_id.next();
        self.pending.insert(request_id, request.reply);
        self.dispatch(Event::Command {
            request_id,
            command: request.command,
        });
    }

    fn dispatch(&mut self, event: Event) {
        let is_tick = matches!(event, Event::Tick);
        trace!(event = event.type_name(), "Dispatching event");

        self.cluster.set_time(self.started.elapsed());
        let actions = self.cluster.handle(event);

        // A tick that does not re-arm itself ended the session.
        let rearmed = actions.iter().any(|a| {
            matches!(
                a,
                Action::SetTimer {
                    id: TimerId::Tick,
                    ..
                }
            )
        });
        if is_tick && !rearmed {
            self.tick = None;
        }

        for action in actions {
            self.process_action(action);
        }
        self.snapshots.send_replace(self.cluster.snapshot());
    }

    fn process_action(&mut self, action: Action) {
        match action {
            Action::SetTimer { id, duration } => self.set_timer(id, duration),
            Action::CancelTimer { id } => self.cancel_timer(id),
            Action::EmitCommandResult { request_id, result } => {
                let Some(reply) = self.pending.remove(&request_id) else {
                    warn!(%request_id, "Result for unknown request");
                    return;
                };
                let response = result
                    .map(|()| self.cluster.snapshot())
                    .map_err(RuntimeError::from);
                // The caller may have stopped waiting.
                let _ = reply.send(response);
            }
            Action::EmitStatusChanged { from, to } => {
                info!(%from, %to, "Session status changed");
            }
        }
    }
}

impl TimerScheduler for RealtimeRunner {
    fn set_timer(&mut self, id: TimerId, duration: Duration) {
        match id {
            TimerId::Tick => {
                // The interval already provides the next tick; only a stopped
                // or re-periodized interval is rebuilt.
                if self
                    .tick
                    .as_ref()
                    .is_some_and(|interval| interval.period() == duration)
                {
                    return;
                }
                let mut interval = interval_at(Instant::now() + duration, duration);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.tick = Some(interval);
                debug!(?duration, "Tick interval armed");
            }
            TimerId::RebalanceSettle => {
                self.settle = Some(Box::pin(sleep(duration)));
                debug!(?duration, "Rebalance settle timer armed");
            }
        }
    }

    fn cancel_timer(&mut self, id: TimerId) {
        match id {
            TimerId::Tick => self.tick = None,
            TimerId::RebalanceSettle => self.settle = None,
        }
    }
}

/// Resolves on the next tick, or never when ticking is stopped.
async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Resolves when the settle timer expires, or never when none is armed.
async fn settled(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}
