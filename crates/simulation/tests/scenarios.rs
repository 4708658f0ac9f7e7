//! End-to-end scenarios driven through the simulation runner.

use assert_matches::assert_matches;
use brokersim_core::{Command, CommandError, NodeUpdate, TimerId};
use brokersim_simulation::StatusTransition;
use brokersim_test_helpers::{
    add_node, build_pipeline, connect, runner, start, PipelineSpec,
};
use brokersim_types::{MetadataMode, NodeKind, SessionStatus};
use std::time::Duration;
use tracing_test::traced_test;

const TICK: Duration = Duration::from_millis(500);

#[traced_test]
#[test]
fn test_empty_board() {
    let mut runner = runner();
    let snapshot = runner.snapshot();
    assert_eq!(snapshot.global_lag, 0.0);
    assert_eq!(snapshot.status, SessionStatus::Idle);

    runner.run_for(Duration::from_secs(5));
    assert_eq!(runner.snapshot().status, SessionStatus::Idle);
    assert_eq!(runner.stats().events_processed, 0);

    start(&mut runner);
    runner.run_for(TICK * 4);
    let snapshot = runner.snapshot();
    assert_eq!(snapshot.global_lag, 0.0);
    assert_eq!(snapshot.status, SessionStatus::Running);
    assert_eq!(snapshot.ticks, 4);
}

#[traced_test]
#[test]
fn test_single_pipeline() {
    let mut runner = runner();
    let pipeline = build_pipeline(
        &mut runner,
        &PipelineSpec::default().with_producer_rate(8.0),
    );
    let consumer = runner.snapshot().node(pipeline.consumers[0]).cloned().unwrap();
    assert_eq!(consumer.as_consumer().unwrap().assigned, vec![0]);

    start(&mut runner);
    runner.run_for(TICK);

    let snapshot = runner.snapshot();
    let topic = snapshot.node(pipeline.topic).unwrap().as_topic().unwrap();
    assert_eq!(topic.lag, 1.5);
    assert_eq!(snapshot.global_lag, 1.5);
    assert_eq!(snapshot.messages_processed, 25.0);
}

#[traced_test]
#[test]
fn test_lag_climbs_to_ceiling() {
    let mut runner = runner();
    build_pipeline(
        &mut runner,
        &PipelineSpec::default().with_producer_rate(8.0),
    );
    start(&mut runner);
    runner.run_for(Duration::from_secs(60));

    // 1.5 per tick reaches 100 on tick 67.
    let snapshot = runner.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Terminated);
    assert_eq!(snapshot.ticks, 67);
    assert_eq!(snapshot.global_lag, 100.5);
    assert!(!runner.has_timer(TimerId::Tick));
    assert_eq!(runner.pending_events(), 0);
}

#[traced_test]
#[test]
fn test_ceiling_terminates_on_same_tick() {
    let mut runner = runner();
    build_pipeline(
        &mut runner,
        &PipelineSpec::default()
            .with_producer_rate(200.0)
            .with_consumers([]),
    );
    start(&mut runner);
    let started = runner.now();
    runner.run_for(TICK);

    assert_eq!(runner.snapshot().global_lag, 100.0);
    assert_eq!(
        runner.status_changes().last(),
        Some(&StatusTransition {
            at: started + TICK,
            from: SessionStatus::Running,
            to: SessionStatus::Terminated,
        })
    );

    runner.run_for(TICK * 10);
    assert_eq!(runner.stats().ticks, 1);
}

#[traced_test]
#[test]
fn test_terminated_session_rejects_mutations() {
    let mut runner = runner();
    let pipeline = build_pipeline(
        &mut runner,
        &PipelineSpec::default()
            .with_producer_rate(200.0)
            .with_consumers([]),
    );
    start(&mut runner);
    runner.run_for(TICK);

    let rejected = [
        Command::add(NodeKind::Consumer),
        Command::DeleteNode {
            id: pipeline.producer,
        },
        Command::UpdateNode {
            id: pipeline.producer,
            update: NodeUpdate::rate(1.0),
        },
        Command::TogglePrimaryService,
        Command::SetMode {
            mode: MetadataMode::SelfManaged,
        },
        Command::ToggleRunning,
    ];
    let before = runner.snapshot();
    for command in rejected {
        assert_matches!(
            runner.submit(command),
            Err(CommandError::IllegalTransition(_))
        );
    }
    assert_eq!(runner.snapshot(), before);
}

#[traced_test]
#[test]
fn test_retry_keeps_topology() {
    let mut runner = runner();
    let pipeline = build_pipeline(
        &mut runner,
        &PipelineSpec::default()
            .with_producer_rate(200.0)
            .with_consumers([]),
    );
    start(&mut runner);
    runner.run_for(TICK);

    let snapshot = runner.submit(Command::Retry).unwrap();
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert_eq!(snapshot.global_lag, 0.0);
    assert_eq!(snapshot.messages_processed, 0.0);
    assert_eq!(snapshot.ticks, 0);
    assert_eq!(snapshot.nodes.len(), 2);
    assert_eq!(snapshot.connections.len(), 1);
    let topic = snapshot.node(pipeline.topic).unwrap().as_topic().unwrap();
    assert_eq!(topic.lag, 0.0);
    assert!(!topic.offline);

    // The producer can be tamed and the session restarted.
    runner
        .submit(Command::UpdateNode {
            id: pipeline.producer,
            update: NodeUpdate::rate(2.0),
        })
        .unwrap();
    start(&mut runner);
    runner.run_for(TICK * 3);
    assert_eq!(runner.snapshot().status, SessionStatus::Running);
    assert_eq!(runner.snapshot().global_lag, 3.0);
}

#[traced_test]
#[test]
fn test_reset_clears_everything() {
    let mut runner = runner();
    build_pipeline(&mut runner, &PipelineSpec::default());
    start(&mut runner);
    runner.run_for(TICK * 2);

    let snapshot = runner.submit(Command::Reset).unwrap();
    assert!(snapshot.nodes.is_empty());
    assert!(snapshot.connections.is_empty());
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert_eq!(runner.pending_events(), 0);

    // Ids are never reused within a session.
    let id = add_node(&mut runner, NodeKind::Producer);
    assert_eq!(id.0, 4);
}

#[traced_test]
#[test]
fn test_rebalance_pauses_flow() {
    let mut runner = runner();
    let pipeline = build_pipeline(
        &mut runner,
        &PipelineSpec::default().with_producer_rate(8.0),
    );
    start(&mut runner);
    runner.run_for(TICK * 2);
    assert_eq!(runner.snapshot().global_lag, 3.0);

    let late = add_node(&mut runner, NodeKind::Consumer);
    connect(&mut runner, pipeline.topic, late);
    assert!(runner.has_timer(TimerId::RebalanceSettle));

    runner.run_for(TICK * 2);
    assert_eq!(runner.snapshot().global_lag, 3.0);
    assert_eq!(runner.cluster().stats().paused_ticks, 2);

    // The settle timer fires before the tick sharing its instant.
    runner.run_for(TICK);
    assert_eq!(runner.snapshot().global_lag, 4.5);

    // One partition: the late consumer stays idle.
    let snapshot = runner.snapshot();
    assert!(snapshot.node(late).unwrap().as_consumer().unwrap().is_idle());
}

#[traced_test]
#[test]
fn test_partitions_spread_over_consumers() {
    let mut runner = runner();
    let pipeline = build_pipeline(
        &mut runner,
        &PipelineSpec::default()
            .with_partitions(5)
            .with_consumers([5.0, 5.0, 5.0]),
    );

    let snapshot = runner.snapshot();
    let assigned: Vec<Vec<u32>> = pipeline
        .consumers
        .iter()
        .map(|id| snapshot.node(*id).unwrap().as_consumer().unwrap().assigned.clone())
        .collect();
    assert_eq!(assigned, vec![vec![0, 3], vec![1, 4], vec![2]]);
}

#[traced_test]
#[test]
fn test_topic_creation_without_metadata_service() {
    let mut runner = runner();
    runner.submit(Command::TogglePrimaryService).unwrap();

    let before = runner.snapshot();
    assert_matches!(
        runner.submit(Command::add(NodeKind::Topic)),
        Err(CommandError::MetadataUnavailable {
            mode: MetadataMode::Primary
        })
    );
    assert_eq!(runner.snapshot(), before);

    // Switching to self-managed mode hands metadata to the brokers.
    runner
        .submit(Command::SetMode {
            mode: MetadataMode::SelfManaged,
        })
        .unwrap();
    assert!(runner.submit(Command::add(NodeKind::Topic)).is_ok());
}

#[traced_test]
#[test]
fn test_duplicate_connection_is_noop() {
    let mut runner = runner();
    let pipeline = build_pipeline(&mut runner, &PipelineSpec::default());
    let before = runner.snapshot();

    let after = runner
        .submit(Command::connect(pipeline.producer, pipeline.topic))
        .unwrap();
    assert_eq!(after, before);
    assert!(!runner.has_timer(TimerId::RebalanceSettle));
}

#[traced_test]
#[test]
fn test_scheduled_timeline() {
    let mut runner = runner();
    let producer = add_node(&mut runner, NodeKind::Producer);
    let topic = add_node(&mut runner, NodeKind::Topic);

    let link = runner.schedule(Duration::from_secs(1), Command::connect(producer, topic));
    let bad_link = runner.schedule(Duration::from_secs(1), Command::connect(topic, producer));
    let run = runner.schedule(Duration::from_secs(2), Command::ToggleRunning);
    runner.run_until(Duration::from_secs(3));

    assert_eq!(runner.result(link), Some(&Ok(())));
    assert_matches!(
        runner.result(bad_link),
        Some(Err(CommandError::IllegalTransition(_)))
    );
    assert_eq!(runner.result(run), Some(&Ok(())));

    // Ticks at 2.5s and 3s with 5/tick inflow and no consumer.
    assert_eq!(runner.snapshot().global_lag, 5.0);
}
