use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use messages::{
    ChannelKind, Deliver, DispatchQueue, Draft, Message, MessageError, ShutdownPolicy,
};
use parking_lot::Mutex;
use serde_json::Value;

#[derive(Default, Clone)]
struct Journal {
    scheduled: Arc<Mutex<Vec<usize>>>,
    completed: Arc<Mutex<Vec<usize>>>,
    holding: Arc<AtomicBool>,
}

enum Outcome {
    Ok,
    Fail,
    Panic,
}

struct Recorder {
    id: usize,
    delay: Duration,
    hold: Duration,
    outcome: Outcome,
    journal: Journal,
}

impl Recorder {
    fn new(id: usize, delay_ms: u64, journal: &Journal) -> Box<Self> {
        Box::new(Self {
            id,
            delay: Duration::from_millis(delay_ms),
            hold: Duration::ZERO,
            outcome: Outcome::Ok,
            journal: journal.clone(),
        })
    }

    fn with_outcome(mut self: Box<Self>, outcome: Outcome) -> Box<Self> {
        self.outcome = outcome;
        self
    }

    /// Blocks the scheduling thread inside `into_deliverable`.
    fn holding(mut self: Box<Self>, hold_ms: u64) -> Box<Self> {
        self.hold = Duration::from_millis(hold_ms);
        self
    }
}

impl fmt::Display for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recorder #{}", self.id)
    }
}

impl Message for Recorder {
    fn channel(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    fn construct(&mut self) -> Result<(), MessageError> {
        Ok(())
    }

    fn payload(&self) -> Value {
        Value::Null
    }

    fn into_deliverable(self: Box<Self>) -> Option<Box<dyn Deliver>> {
        self.journal.scheduled.lock().push(self.id);
        if !self.hold.is_zero() {
            self.journal.holding.store(true, Ordering::Release);
            std::thread::sleep(self.hold);
        }
        Some(self)
    }
}

#[async_trait]
impl Deliver for Recorder {
    async fn send(&mut self) -> Result<(), MessageError> {
        tokio::time::sleep(self.delay).await;
        self.journal.completed.lock().push(self.id);
        match self.outcome {
            Outcome::Ok => Ok(()),
            Outcome::Fail => Err(MessageError::missing(ChannelKind::Telegram, "credentials")),
            Outcome::Panic => panic!("recorder #{} blew up", self.id),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn schedules_in_enqueue_order_but_completes_independently() {
    let journal = Journal::default();
    let queue = DispatchQueue::new(ShutdownPolicy::Wait).unwrap();

    queue.enqueue(Recorder::new(1, 30, &journal));
    queue.enqueue(Recorder::new(2, 20, &journal));
    queue.enqueue(Recorder::new(3, 10, &journal));

    // scheduling already happened inside enqueue, before any send ran
    assert_eq!(*journal.scheduled.lock(), vec![1, 2, 3]);
    assert!(journal.completed.lock().is_empty());
    assert_eq!(queue.scheduled(), 3);

    queue.shutdown().await;
    assert_eq!(*journal.completed.lock(), vec![3, 2, 1]);
}

#[tokio::test]
async fn messages_without_send_capability_are_dropped() {
    let journal = Journal::default();
    let queue = DispatchQueue::new(ShutdownPolicy::Wait).unwrap();

    queue.enqueue(Box::new(Draft::new(Recorder::new(1, 0, &journal))));
    queue.enqueue(Recorder::new(2, 0, &journal));
    queue.shutdown().await;

    assert_eq!(*journal.scheduled.lock(), vec![2]);
    assert_eq!(*journal.completed.lock(), vec![2]);
    assert_eq!(queue.scheduled(), 1);
}

#[tokio::test]
async fn failures_and_panics_stay_inside_their_task() {
    let journal = Journal::default();
    let queue = DispatchQueue::new(ShutdownPolicy::Wait).unwrap();

    queue.enqueue(Recorder::new(1, 0, &journal).with_outcome(Outcome::Fail));
    queue.enqueue(Recorder::new(2, 0, &journal).with_outcome(Outcome::Panic));
    queue.enqueue(Recorder::new(3, 0, &journal));
    queue.shutdown().await;

    let mut completed = journal.completed.lock().clone();
    completed.sort();
    assert_eq!(completed, vec![1, 2, 3]);
}

#[tokio::test]
async fn abandon_policy_cancels_in_flight_sends() {
    let journal = Journal::default();
    let queue = DispatchQueue::new(ShutdownPolicy::Abandon).unwrap();
    assert_eq!(queue.policy(), ShutdownPolicy::Abandon);

    queue.enqueue(Recorder::new(1, 3_600_000, &journal));
    tokio::task::yield_now().await;
    queue.shutdown().await;

    assert_eq!(*journal.scheduled.lock(), vec![1]);
    assert!(journal.completed.lock().is_empty());
    assert_eq!(queue.in_flight(), 0);
}

#[tokio::test]
async fn enqueue_after_shutdown_is_ignored() {
    let journal = Journal::default();
    let queue = DispatchQueue::new(ShutdownPolicy::Wait).unwrap();
    queue.shutdown().await;

    queue.enqueue(Recorder::new(1, 0, &journal));
    assert!(journal.scheduled.lock().is_empty());
    assert_eq!(queue.scheduled(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_get_every_message_scheduled() {
    let journal = Journal::default();
    let queue = Arc::new(DispatchQueue::new(ShutdownPolicy::Wait).unwrap());

    let mut producers = Vec::new();
    for producer in 0..4 {
        let queue = queue.clone();
        let journal = journal.clone();
        producers.push(tokio::task::spawn_blocking(move || {
            for n in 0..25 {
                queue.enqueue(Recorder::new(producer * 100 + n, 1, &journal));
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }
    queue.shutdown().await;

    assert_eq!(queue.scheduled(), 100);
    assert_eq!(journal.completed.lock().len(), 100);

    // each producer's own messages keep their relative order
    let scheduled = journal.scheduled.lock().clone();
    for producer in 0..4 {
        let own: Vec<usize> = scheduled
            .iter()
            .copied()
            .filter(|id| id / 100 == producer)
            .collect();
        assert_eq!(own, (0..25).map(|n| producer * 100 + n).collect::<Vec<_>>());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wait_shutdown_covers_a_drain_running_on_another_thread() {
    let journal = Journal::default();
    let queue = Arc::new(DispatchQueue::new(ShutdownPolicy::Wait).unwrap());

    let producer = {
        let queue = queue.clone();
        let journal = journal.clone();
        tokio::task::spawn_blocking(move || {
            queue.enqueue(Recorder::new(1, 10, &journal).holding(300));
        })
    };
    // the producer is now mid-drain, holding a popped message
    while !journal.holding.load(Ordering::Acquire) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    queue.shutdown().await;
    assert_eq!(*journal.completed.lock(), vec![1]);
    assert_eq!(queue.scheduled(), 1);
    assert_eq!(queue.in_flight(), 0);
    producer.await.unwrap();
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let journal = Journal::default();
    let queue = DispatchQueue::new(ShutdownPolicy::Wait).unwrap();

    queue.enqueue(Recorder::new(1, 5, &journal));
    queue.shutdown().await;
    queue.shutdown().await;
    assert_eq!(*journal.completed.lock(), vec![1]);
}
