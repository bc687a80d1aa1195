//! Integration tests for boundq
//!
//! These tests drive whole runs through the public API: queue, producers,
//! consumers and the coordinator together.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use boundq::{
    BoundedQueue, CancelToken, Consumer, Coordinator, CoordinatorConfig, Phase, Producer, QueueError, RunReport,
    RunStatus, TaskOutcome, VecSink, WakePolicy,
};
use proptest::prelude::*;

fn unpaced(policy: WakePolicy) -> CoordinatorConfig {
    CoordinatorConfig {
        wake_policy: policy,
        ..CoordinatorConfig::default().unpaced()
    }
}

/// Run on a helper thread and fail the test instead of hanging forever
fn run_with_deadline<T: Send + 'static>(
    coordinator: Coordinator<T>,
    deadline: Duration,
) -> Result<RunReport<T>, QueueError> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(coordinator.run());
    });
    rx.recv_timeout(deadline).expect("run did not finish in time")
}

fn numbered_sources(sizes: &[usize]) -> Vec<Vec<u32>> {
    let mut next = 0u32;
    sizes
        .iter()
        .map(|&size| {
            (0..size)
                .map(|_| {
                    next += 1;
                    next
                })
                .collect()
        })
        .collect()
}

fn sorted<T: Ord>(mut items: Vec<T>) -> Vec<T> {
    items.sort_unstable();
    items
}

// =============================================================================
// Full runs
// =============================================================================

#[test]
fn test_reference_run_paced() {
    let sources = vec![
        vec!["Apple", "Banana", "Cherry"],
        vec!["Dog", "Elephant", "Fox"],
        vec!["Green", "Blue", "Red"],
    ];
    let coordinator = Coordinator::new(CoordinatorConfig::default(), sources.clone()).unwrap();

    let report = run_with_deadline(coordinator, Duration::from_secs(10)).unwrap();

    assert_eq!(report.status(), RunStatus::Success);
    assert_eq!(report.produced, 9);
    assert_eq!(report.consumed, 9);
    assert_eq!(sorted(report.items), sorted(sources.concat()));
    assert!(report.stats.peak_occupancy <= 5);
    assert!(report.producers.iter().all(|p| p.outcome == TaskOutcome::Completed));
}

#[test]
fn test_many_producers_and_consumers_both_policies() {
    for policy in [WakePolicy::Broadcast, WakePolicy::Targeted] {
        let sources = numbered_sources(&[40, 25, 0, 60, 13]);
        let config = CoordinatorConfig {
            capacity: 3,
            consumers: 4,
            ..unpaced(policy)
        };
        let coordinator = Coordinator::new(config, sources.clone()).unwrap();

        let report = run_with_deadline(coordinator, Duration::from_secs(10)).unwrap();

        assert!(report.is_balanced(), "{:?}: {:?}", policy, report.status());
        assert_eq!(report.consumers.iter().map(|c| c.quota).collect::<Vec<_>>(), vec![35, 35, 34, 34]);
        assert_eq!(sorted(report.items), sorted(sources.concat()));
        assert_eq!(report.stats.total_put, 138);
        assert_eq!(report.stats.total_taken, 138);
    }
}

#[test]
fn test_more_consumers_than_items() {
    let config = CoordinatorConfig {
        consumers: 5,
        ..unpaced(WakePolicy::Targeted)
    };
    let coordinator = Coordinator::new(config, vec![vec!["x", "y"]]).unwrap();

    let report = run_with_deadline(coordinator, Duration::from_secs(5)).unwrap();

    assert!(report.is_balanced());
    assert_eq!(report.consumers.iter().map(|c| c.consumed).sum::<usize>(), 2);
    assert!(report.consumers.iter().all(|c| c.outcome.is_completed()));
}

#[test]
fn test_capacity_one_is_strict_handoff() {
    let config = CoordinatorConfig {
        capacity: 1,
        consumers: 3,
        ..unpaced(WakePolicy::Broadcast)
    };
    let sources = numbered_sources(&[20, 20]);
    let report = run_with_deadline(Coordinator::new(config, sources).unwrap(), Duration::from_secs(5)).unwrap();

    assert!(report.is_balanced());
    assert_eq!(report.stats.peak_occupancy, 1);
}

// =============================================================================
// Cancellation through the run handle
// =============================================================================

#[test]
fn test_cancel_producer_reports_mismatch_without_hanging() {
    let config = CoordinatorConfig {
        producer_delay_ms: 50,
        consumer_delay_ms: 0,
        ..CoordinatorConfig::default()
    };
    let coordinator = Coordinator::new(config, numbered_sources(&[5, 5])).unwrap();
    let handle = coordinator.handle();

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(coordinator.run());
    });

    thread::sleep(Duration::from_millis(60));
    assert!(handle.cancel("Producer-1"));

    let report = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();

    assert!(!report.is_balanced());
    assert_eq!(report.consumed, report.produced);
    assert!(report.consumed < 10);
    assert_eq!(report.producers[0].outcome, TaskOutcome::Cancelled);
    assert_eq!(report.producers[1].outcome, TaskOutcome::Completed);
    assert!(report.consumers.iter().any(|c| c.outcome == TaskOutcome::Closed));
    assert_eq!(handle.phase(), Phase::Reported);
}

#[test]
fn test_cancel_consumer_leaves_siblings_to_finish() {
    let config = CoordinatorConfig {
        capacity: 2,
        consumers: 3,
        producer_delay_ms: 0,
        consumer_delay_ms: 50,
        ..CoordinatorConfig::default()
    };
    let coordinator = Coordinator::new(config, numbered_sources(&[12])).unwrap();
    let handle = coordinator.handle();

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(coordinator.run());
    });

    thread::sleep(Duration::from_millis(30));
    assert!(handle.cancel("Consumer-2"));

    let report = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();

    assert!(!report.is_balanced());
    assert_eq!(report.consumers[1].outcome, TaskOutcome::Cancelled);
    for consumer in [&report.consumers[0], &report.consumers[2]] {
        assert_eq!(consumer.outcome, TaskOutcome::Completed, "{}", consumer.name);
        assert_eq!(consumer.consumed, consumer.quota, "{}", consumer.name);
    }

    // The producer is only released once nobody is left to take
    let producer = &report.producers[0];
    assert_eq!(producer.outcome, TaskOutcome::Closed);
    assert_eq!(producer.delivered, report.consumed + report.queue_remaining);
    assert_eq!(producer.delivered + producer.undelivered, 12);
    assert_eq!(handle.phase(), Phase::Reported);
}

#[test]
fn test_cancel_all_ends_every_task() {
    let config = CoordinatorConfig {
        capacity: 1,
        producer_delay_ms: 20,
        consumer_delay_ms: 200,
        ..CoordinatorConfig::default()
    };
    let coordinator = Coordinator::new(config, numbered_sources(&[10, 10])).unwrap();
    let handle = coordinator.handle();

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(coordinator.run());
    });

    thread::sleep(Duration::from_millis(50));
    handle.cancel_all();

    let report = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();

    assert!(!report.is_balanced());
    let outcomes: Vec<_> = report
        .producers
        .iter()
        .map(|p| p.outcome.clone())
        .chain(report.consumers.iter().map(|c| c.outcome.clone()))
        .collect();
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes.iter().all(|o| !o.is_completed()), "{:?}", outcomes);
}

#[test]
fn test_cancel_unknown_task() {
    let coordinator = Coordinator::new(unpaced(WakePolicy::Broadcast), numbered_sources(&[1])).unwrap();
    assert!(!coordinator.handle().cancel("Producer-9"));
}

// =============================================================================
// Standalone producer and consumer
// =============================================================================

#[test]
fn test_put_blocks_until_consumer_makes_room() {
    for policy in [WakePolicy::Broadcast, WakePolicy::Targeted] {
        let queue: BoundedQueue<&str> = BoundedQueue::with_policy(2, policy).unwrap();
        queue.put("a").unwrap();
        queue.put("b").unwrap();

        let producer = Producer::new("Producer-1", queue.clone(), ["c"]).spawn().unwrap();

        thread::sleep(Duration::from_millis(400));
        assert!(!producer.is_finished());
        assert_eq!(queue.size(), 2);

        assert_eq!(queue.take().unwrap(), "a");
        let report = producer.join().unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(queue.size(), 2);
        assert_eq!(queue.take().unwrap(), "b");
        assert_eq!(queue.take().unwrap(), "c");
    }
}

#[test]
fn test_consumer_and_producer_pair() {
    let queue = BoundedQueue::new(2).unwrap();
    let sink: Arc<VecSink<i32>> = Arc::new(VecSink::new());

    let consumer = Consumer::new("Consumer-1", queue.clone(), sink.clone(), 6).spawn().unwrap();
    let producer = Producer::new("Producer-1", queue.clone(), 1..=6).spawn().unwrap();

    assert_eq!(producer.join().unwrap().delivered, 6);
    let report = consumer.join().unwrap();

    assert_eq!(report.consumed, 6);
    assert_eq!(sink.snapshot(), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_cancel_token_wakes_blocked_take_promptly() {
    let queue: BoundedQueue<u8> = BoundedQueue::new(1).unwrap();
    let token = CancelToken::new();

    let waiter = {
        let queue = queue.clone();
        let token = token.clone();
        thread::spawn(move || queue.take_cancellable(&token))
    };

    thread::sleep(Duration::from_millis(50));
    let start = Instant::now();
    token.cancel();

    assert_eq!(waiter.join().unwrap(), Err(QueueError::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(queue.is_empty());
}

// =============================================================================
// Conservation
// =============================================================================

fn policy_strategy() -> impl Strategy<Value = WakePolicy> {
    prop_oneof![Just(WakePolicy::Broadcast), Just(WakePolicy::Targeted)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_every_item_consumed_exactly_once(
        sizes in prop::collection::vec(0usize..12, 0..5),
        capacity in 1usize..6,
        consumers in 1usize..5,
        policy in policy_strategy(),
    ) {
        let sources = numbered_sources(&sizes);
        let config = CoordinatorConfig {
            capacity,
            consumers,
            ..unpaced(policy)
        };

        let report = run_with_deadline(Coordinator::new(config, sources.clone()).unwrap(), Duration::from_secs(10))
            .unwrap();

        prop_assert!(report.is_balanced());
        prop_assert!(report.stats.peak_occupancy <= capacity);
        prop_assert_eq!(report.queue_remaining, 0);
        prop_assert_eq!(sorted(report.items), sorted(sources.concat()));
    }
}
