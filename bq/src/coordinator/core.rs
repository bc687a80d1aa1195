//! Coordinator implementation

use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

use tracing::{debug, error, info, warn};

use crate::consumer::{Consumer, ConsumerReport};
use crate::error::QueueError;
use crate::producer::{Producer, ProducerReport};
use crate::queue::BoundedQueue;
use crate::sink::VecSink;
use crate::task::spawn_named;

use super::config::{CoordinatorConfig, LaunchOrder};
use super::handle::{Phase, RunHandle};
use super::messages::{DoneSignal, TaskDone};
use super::report::{RunReport, RunStatus, split_quota};

fn producer_name(index: usize) -> String {
    format!("Producer-{}", index + 1)
}

fn consumer_name(index: usize) -> String {
    format!("Consumer-{}", index + 1)
}

/// Runs N producers and M consumers against one queue and checks the totals
///
/// Every task signals done once. When the last producer has, the queue is
/// closed so a consumer whose quota can no longer be met stops instead of
/// blocking forever. When the last consumer has, the queue is closed as well,
/// which releases any producer left waiting for a slot no one will free.
/// A single task stopping early never closes the queue while siblings on the
/// other side can still make progress.
pub struct Coordinator<T> {
    config: CoordinatorConfig,
    sources: Vec<Vec<T>>,
    handle: RunHandle,
}

impl<T: Send + 'static> Coordinator<T> {
    /// Create a coordinator with one producer per source
    pub fn new(config: CoordinatorConfig, sources: Vec<Vec<T>>) -> Result<Self, QueueError> {
        debug!(?config, producers = sources.len(), "Coordinator::new: called");
        config.validate()?;

        let total: usize = sources.iter().map(Vec::len).sum();
        if config.launch == LaunchOrder::Sequential && total > config.capacity {
            return Err(QueueError::invalid(format!(
                "sequential launch needs capacity >= total items ({} > {})",
                total, config.capacity
            )));
        }

        let names = (0..sources.len())
            .map(producer_name)
            .chain((0..config.consumers).map(consumer_name));
        let handle = RunHandle::new(names);

        Ok(Self {
            config,
            sources,
            handle,
        })
    }

    /// Total number of items across every source
    pub fn total_items(&self) -> usize {
        self.sources.iter().map(Vec::len).sum()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Handle for cancelling tasks and watching the phase while `run` blocks
    pub fn handle(&self) -> RunHandle {
        self.handle.clone()
    }

    pub fn phase(&self) -> Phase {
        self.handle.phase()
    }

    /// Launch every task, wait for all of them, and report the literal counts
    pub fn run(self) -> Result<RunReport<T>, QueueError> {
        let Coordinator {
            config,
            sources,
            handle,
        } = self;

        let expected: usize = sources.iter().map(Vec::len).sum();
        let quotas = split_quota(expected, config.consumers)?;
        let producer_count = sources.len();
        info!(
            expected,
            producers = producer_count,
            consumers = config.consumers,
            capacity = config.capacity,
            ?quotas,
            "Coordinator::run: starting"
        );

        let queue = BoundedQueue::with_policy(config.capacity, config.wake_policy)?;
        let sink: Arc<VecSink<T>> = Arc::new(VecSink::new());
        let (done_tx, done_rx) = mpsc::channel();
        let mut launcher = Launcher {
            config: &config,
            queue: queue.clone(),
            sink: Arc::clone(&sink),
            handle: handle.clone(),
            done_tx: Some(done_tx),
            threads: Vec::new(),
        };

        handle.set_phase(Phase::ProducersRunning);
        launcher.guard(|l| l.spawn_producers(sources))?;
        if config.launch == LaunchOrder::Concurrent {
            launcher.guard(|l| l.spawn_consumers(&quotas))?;
            launcher.seal();
            handle.set_phase(Phase::ConsumersRunning);
        }
        if producer_count == 0 {
            launcher.guard(|l| l.producers_joined(&quotas))?;
        }

        let mut producers: Vec<Option<ProducerReport>> = vec![None; producer_count];
        let mut consumers: Vec<Option<ConsumerReport>> = vec![None; config.consumers];
        let mut producers_left = producer_count;
        let mut consumers_left = config.consumers;

        // Ends once every task has signalled and every sender is gone
        while let Ok(done) = done_rx.recv() {
            match done {
                TaskDone::Producer(index, report) => {
                    debug!(producer = %report.name, outcome = %report.outcome, "Coordinator::run: producer done");
                    producers[index] = Some(report);
                    producers_left -= 1;
                    if producers_left == 0 {
                        launcher.guard(|l| l.producers_joined(&quotas))?;
                    }
                }
                TaskDone::Consumer(index, report) => {
                    debug!(consumer = %report.name, outcome = %report.outcome, "Coordinator::run: consumer done");
                    if !report.outcome.is_completed() {
                        warn!(consumer = %report.name, shortfall = report.shortfall(), "Consumer stopped early");
                    }
                    consumers[index] = Some(report);
                    consumers_left -= 1;
                    if consumers_left == 0 && !queue.is_closed() {
                        debug!(
                            buffered = queue.size(),
                            "Coordinator::run: every consumer done, closing queue to release producers"
                        );
                        queue.close();
                    }
                }
            }
        }

        launcher.join_all();
        handle.set_phase(Phase::ConsumersJoined);

        let items = sink.drain();
        let producers: Vec<ProducerReport> = producers.into_iter().flatten().collect();
        let consumers: Vec<ConsumerReport> = consumers.into_iter().flatten().collect();
        let report = RunReport {
            expected,
            produced: producers.iter().map(|r| r.delivered).sum(),
            consumed: items.len(),
            items,
            producers,
            consumers,
            queue_remaining: queue.size(),
            stats: queue.stats(),
        };

        match report.status() {
            RunStatus::Success => info!(
                produced = report.produced,
                consumed = report.consumed,
                "All items were produced and consumed"
            ),
            RunStatus::CountMismatch { expected, consumed } => warn!(
                expected,
                produced = report.produced,
                consumed,
                remaining = report.queue_remaining,
                "Item count mismatch"
            ),
        }

        handle.set_phase(Phase::Reported);
        Ok(report)
    }
}

/// Spawns task threads and tracks them for a single run
struct Launcher<'a, T> {
    config: &'a CoordinatorConfig,
    queue: BoundedQueue<T>,
    sink: Arc<VecSink<T>>,
    handle: RunHandle,
    done_tx: Option<Sender<TaskDone>>,
    threads: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> Launcher<'_, T> {
    /// Run a launch step; on failure stop every task already started
    fn guard(&mut self, step: impl FnOnce(&mut Self) -> Result<(), QueueError>) -> Result<(), QueueError> {
        step(self).inspect_err(|e| {
            error!(error = %e, "Coordinator::run: launch failed, aborting run");
            self.handle.cancel_all();
            self.queue.close();
            self.seal();
            self.join_all();
        })
    }

    fn spawn_producers(&mut self, sources: Vec<Vec<T>>) -> Result<(), QueueError> {
        for (index, source) in sources.into_iter().enumerate() {
            let name = producer_name(index);
            let producer = Producer::new(name.clone(), self.queue.clone(), source)
                .with_delay(self.config.producer_delay())
                .with_cancel_token(self.handle.token(&name).unwrap_or_default());
            let fallback = TaskDone::producer_lost(index, &name, producer.source_len());

            self.spawn(&name, fallback, move || TaskDone::Producer(index, producer.run()))?;
        }
        Ok(())
    }

    fn spawn_consumers(&mut self, quotas: &[usize]) -> Result<(), QueueError> {
        for (index, &quota) in quotas.iter().enumerate() {
            let name = consumer_name(index);
            let consumer = Consumer::new(name.clone(), self.queue.clone(), self.sink.clone(), quota)
                .with_delay(self.config.consumer_delay())
                .with_cancel_token(self.handle.token(&name).unwrap_or_default());
            let fallback = TaskDone::consumer_lost(index, &name, quota);

            self.spawn(&name, fallback, move || TaskDone::Consumer(index, consumer.run()))?;
        }
        Ok(())
    }

    /// Every producer has signalled done
    fn producers_joined(&mut self, quotas: &[usize]) -> Result<(), QueueError> {
        // Nothing else will ever be put; remaining items can still be drained
        self.queue.close();
        self.handle.set_phase(Phase::ProducersJoined);

        if self.config.launch == LaunchOrder::Sequential {
            self.spawn_consumers(quotas)?;
            self.seal();
            self.handle.set_phase(Phase::ConsumersRunning);
        }
        Ok(())
    }

    fn spawn(
        &mut self,
        name: &str,
        fallback: TaskDone,
        body: impl FnOnce() -> TaskDone + Send + 'static,
    ) -> Result<(), QueueError> {
        let tx = self
            .done_tx
            .clone()
            .ok_or_else(|| QueueError::invalid("cannot launch tasks after the run was sealed"))?;
        let signal = DoneSignal::new(tx, fallback);

        let thread = spawn_named(name, move || signal.finish(body()))?;
        debug!(task = %name, "Coordinator::run: task launched");
        self.threads.push(thread);
        Ok(())
    }

    /// No more tasks will be launched
    fn seal(&mut self) {
        self.done_tx = None;
    }

    fn join_all(&mut self) {
        for thread in self.threads.drain(..) {
            let name = thread.thread().name().unwrap_or("unnamed").to_string();
            if thread.join().is_err() {
                error!(task = %name, "Task thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskOutcome;

    fn unpaced() -> CoordinatorConfig {
        CoordinatorConfig::default().unpaced()
    }

    #[test]
    fn test_reference_scenario() {
        let sources = vec![
            vec!["Apple", "Banana", "Cherry"],
            vec!["Dog", "Elephant", "Fox"],
            vec!["Green", "Blue", "Red"],
        ];
        let coordinator = Coordinator::new(unpaced(), sources.clone()).unwrap();
        assert_eq!(coordinator.total_items(), 9);

        let report = coordinator.run().unwrap();

        assert!(report.is_balanced());
        assert_eq!(report.produced, 9);
        assert_eq!(report.consumed, 9);
        assert_eq!(report.queue_remaining, 0);
        assert_eq!(
            report.consumers.iter().map(|c| c.quota).collect::<Vec<_>>(),
            vec![5, 4]
        );

        let mut items = report.items.clone();
        items.sort_unstable();
        let mut expected: Vec<_> = sources.into_iter().flatten().collect();
        expected.sort_unstable();
        assert_eq!(items, expected);
    }

    #[test]
    fn test_phase_ends_reported() {
        let coordinator = Coordinator::new(unpaced(), vec![vec![1, 2]]).unwrap();
        let handle = coordinator.handle();
        assert_eq!(handle.phase(), Phase::Created);

        coordinator.run().unwrap();

        assert_eq!(handle.phase(), Phase::Reported);
    }

    #[test]
    fn test_no_producers() {
        let report = Coordinator::<u32>::new(unpaced(), Vec::new()).unwrap().run().unwrap();

        assert!(report.is_balanced());
        assert_eq!(report.consumed, 0);
        assert_eq!(report.consumers.len(), 2);
        assert!(report.consumers.iter().all(|c| c.outcome == TaskOutcome::Completed));
    }

    #[test]
    fn test_zero_consumers_rejected() {
        let config = CoordinatorConfig {
            consumers: 0,
            ..unpaced()
        };
        assert!(matches!(
            Coordinator::new(config, vec![vec![1]]),
            Err(QueueError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_sequential_rejected_when_items_exceed_capacity() {
        let config = CoordinatorConfig {
            capacity: 2,
            launch: LaunchOrder::Sequential,
            ..unpaced()
        };
        assert!(matches!(
            Coordinator::new(config, vec![vec![1, 2, 3]]),
            Err(QueueError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_sequential_within_capacity() {
        let config = CoordinatorConfig {
            capacity: 6,
            consumers: 3,
            launch: LaunchOrder::Sequential,
            ..unpaced()
        };
        let report = Coordinator::new(config, vec![vec![1, 2, 3], vec![4, 5]])
            .unwrap()
            .run()
            .unwrap();

        assert!(report.is_balanced());
        assert_eq!(report.stats.peak_occupancy, 5);
        assert_eq!(report.stats.put_waits, 0);
    }

    #[test]
    fn test_concurrent_launch_reports_consumers_running_while_producing() {
        let config = CoordinatorConfig {
            producer_delay_ms: 100,
            consumer_delay_ms: 0,
            ..CoordinatorConfig::default()
        };
        let coordinator = Coordinator::new(config, vec![vec![1, 2, 3, 4, 5]]).unwrap();
        let handle = coordinator.handle();

        let runner = std::thread::spawn(move || coordinator.run());
        std::thread::sleep(std::time::Duration::from_millis(150));

        assert_eq!(handle.phase(), Phase::ConsumersRunning);

        let report = runner.join().unwrap().unwrap();
        assert!(report.is_balanced());
        assert_eq!(handle.phase(), Phase::Reported);
    }

    #[test]
    fn test_cancelled_consumer_leaves_sibling_running() {
        let config = CoordinatorConfig {
            capacity: 2,
            producer_delay_ms: 0,
            consumer_delay_ms: 50,
            ..CoordinatorConfig::default()
        };
        let coordinator = Coordinator::new(config, vec![(0..10).collect::<Vec<u32>>()]).unwrap();
        let handle = coordinator.handle();

        let runner = std::thread::spawn(move || coordinator.run());
        std::thread::sleep(std::time::Duration::from_millis(30));
        assert!(handle.cancel("Consumer-1"));

        let report = runner.join().unwrap().unwrap();

        assert_eq!(report.consumers[0].outcome, TaskOutcome::Cancelled);
        assert_eq!(report.consumers[1].outcome, TaskOutcome::Completed);
        assert_eq!(report.consumers[1].consumed, report.consumers[1].quota);
        assert_eq!(report.producers[0].outcome, TaskOutcome::Closed);
        assert_eq!(report.producers[0].delivered, report.consumed + report.queue_remaining);
    }

    #[test]
    fn test_task_names() {
        let coordinator = Coordinator::new(unpaced(), vec![vec![1], vec![2]]).unwrap();
        assert_eq!(
            coordinator.handle().task_names(),
            vec!["Producer-1", "Producer-2", "Consumer-1", "Consumer-2"]
        );
    }
}
