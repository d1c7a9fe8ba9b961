//! # Task Management System
//!
//! A bounded multi-producer, single-consumer queue of deferred actions.
//!
//! ## Architecture Overview
//! - `WorkQueue`: the consumer end, owned by the thread that holds the context `C`
//! - `WorkQueueSender`: cloneable producer end, handed to network threads
//! - `Task`: one deferred action, implemented for plain closures as well
//! - `DrainReport`: what one drain did
//!
//! ## Task Lifecycle
//! 1. A producer calls `enqueue` (blocks while the queue is full) or `try_enqueue`
//!    (hands the task back when full)
//! 2. Once per frame the consumer calls `drain`, which runs every task queued at that
//!    moment, in FIFO order per producer
//! 3. A task that returns an error or panics is logged and the drain carries on
//!
//! ## Back-pressure
//! The channel is a `sync_channel` with a fixed capacity, so a burst of incoming
//! chunks stalls the network reader instead of piling up unbounded work.

pub mod task;

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TryRecvError, TrySendError};

use log::{error, trace};

pub use task::{Task, TaskError};

type BoxedTask<C> = Box<dyn Task<C> + Send>;

/// Producer end. Cheap to clone; one clone per producer thread.
pub struct WorkQueueSender<C> {
    sender: SyncSender<BoxedTask<C>>,
}

impl<C> Clone for WorkQueueSender<C> {
    fn clone(&self) -> Self {
        WorkQueueSender {
            sender: self.sender.clone(),
        }
    }
}

/// Why a task could not be queued. Carries the task back to the caller.
pub enum EnqueueError<C> {
    /// The queue is at capacity.
    Full(BoxedTask<C>),
    /// The consumer was dropped; nothing will ever run the task.
    Disconnected(BoxedTask<C>),
}

impl<C> std::fmt::Debug for EnqueueError<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnqueueError::Full(_) => write!(f, "Full(..)"),
            EnqueueError::Disconnected(_) => write!(f, "Disconnected(..)"),
        }
    }
}

impl<C> WorkQueueSender<C> {
    /// Queues a task, blocking while the queue is full.
    ///
    /// # Returns
    /// `Err` with the task if the consumer has gone away.
    pub fn enqueue<T>(&self, task: T) -> Result<(), EnqueueError<C>>
    where
        T: Task<C> + 'static,
    {
        self.sender
            .send(Box::new(task))
            .map_err(|err| EnqueueError::Disconnected(err.0))
    }

    /// Queues a task without blocking.
    pub fn try_enqueue<T>(&self, task: T) -> Result<(), EnqueueError<C>>
    where
        T: Task<C> + 'static,
    {
        self.sender.try_send(Box::new(task)).map_err(|err| match err {
            TrySendError::Full(task) => EnqueueError::Full(task),
            TrySendError::Disconnected(task) => EnqueueError::Disconnected(task),
        })
    }
}

/// Outcome of one `drain` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Tasks that ran, including the ones that failed.
    pub executed: usize,
    /// Tasks that returned an error or panicked.
    pub failed: usize,
}

/// Consumer end, owned by the thread that owns `C`.
pub struct WorkQueue<C> {
    receiver: Receiver<BoxedTask<C>>,
    capacity: usize,
}

impl<C> WorkQueue<C> {
    /// Creates a queue holding at most `capacity` pending tasks (minimum 1).
    pub fn new(capacity: usize) -> (WorkQueueSender<C>, WorkQueue<C>) {
        let capacity = capacity.max(1);
        let (sender, receiver) = sync_channel(capacity);
        (
            WorkQueueSender { sender },
            WorkQueue { receiver, capacity },
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Runs every queued task against `context`.
    ///
    /// Failures never propagate: an `Err` or a panic is logged and counted, and the
    /// next task runs. Tasks queued while the drain is running may or may not be picked
    /// up by this call.
    pub fn drain(&self, context: &mut C) -> DrainReport {
        let mut report = DrainReport::default();
        loop {
            let task = match self.receiver.try_recv() {
                Ok(task) => task,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };
            let name = task.name().to_owned();
            report.executed += 1;

            match panic::catch_unwind(AssertUnwindSafe(|| task.process(context))) {
                Ok(Ok(())) => trace!("Task '{}' completed", name),
                Ok(Err(err)) => {
                    report.failed += 1;
                    error!("Task '{}' failed: {}", name, err);
                }
                Err(payload) => {
                    report.failed += 1;
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|msg| msg.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_owned());
                    error!("Task '{}' panicked: {}", name, message);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::thread;

    #[test]
    fn test_drain_runs_tasks_in_order() {
        let (sender, queue) = WorkQueue::<Vec<u32>>::new(8);
        for value in 0..5 {
            sender
                .enqueue(move |log: &mut Vec<u32>| -> Result<(), TaskError> {
                    log.push(value);
                    Ok(())
                })
                .unwrap();
        }

        let mut log = Vec::new();
        let report = queue.drain(&mut log);
        assert_eq!(log, vec![0, 1, 2, 3, 4]);
        assert_eq!(report, DrainReport { executed: 5, failed: 0 });
        assert_eq!(queue.drain(&mut log), DrainReport::default());
    }

    #[test]
    fn test_failures_do_not_stop_the_drain() {
        let (sender, queue) = WorkQueue::<Vec<&'static str>>::new(8);
        sender
            .enqueue(|log: &mut Vec<&'static str>| -> Result<(), TaskError> {
                log.push("first");
                Ok(())
            })
            .unwrap();
        sender
            .enqueue(|_: &mut Vec<&'static str>| -> Result<(), TaskError> {
                Err(TaskError::new("bad chunk"))
            })
            .unwrap();
        sender
            .enqueue(|_: &mut Vec<&'static str>| -> Result<(), TaskError> {
                panic!("boom")
            })
            .unwrap();
        sender
            .enqueue(|log: &mut Vec<&'static str>| -> Result<(), TaskError> {
                log.push("last");
                Ok(())
            })
            .unwrap();

        let mut log = Vec::new();
        let report = queue.drain(&mut log);
        assert_eq!(log, vec!["first", "last"]);
        assert_eq!(report, DrainReport { executed: 4, failed: 2 });
    }

    #[test]
    fn test_try_enqueue_hands_the_task_back_when_full() {
        let (sender, queue) = WorkQueue::<u32>::new(1);
        sender
            .try_enqueue(|n: &mut u32| -> Result<(), TaskError> {
                *n += 1;
                Ok(())
            })
            .unwrap();
        let rejected = sender.try_enqueue(|n: &mut u32| -> Result<(), TaskError> {
            *n += 10;
            Ok(())
        });
        assert_matches!(rejected, Err(EnqueueError::Full(_)));

        let mut counter = 0;
        queue.drain(&mut counter);
        assert_eq!(counter, 1);

        if let Err(EnqueueError::Full(task)) = rejected {
            task.process(&mut counter).unwrap();
        }
        assert_eq!(counter, 11);
    }

    #[test]
    fn test_dropped_consumer_is_reported() {
        let (sender, queue) = WorkQueue::<u32>::new(1);
        drop(queue);
        assert_matches!(
            sender.enqueue(|_: &mut u32| -> Result<(), TaskError> { Ok(()) }),
            Err(EnqueueError::Disconnected(_))
        );
    }

    #[test]
    fn test_per_producer_order_survives_concurrency() {
        let (sender, queue) = WorkQueue::<Vec<(u32, u32)>>::new(4);
        let producers: Vec<_> = (0..3)
            .map(|producer| {
                let sender = sender.clone();
                thread::spawn(move || {
                    for sequence in 0..50 {
                        sender
                            .enqueue(move |log: &mut Vec<(u32, u32)>| -> Result<(), TaskError> {
                                log.push((producer, sequence));
                                Ok(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        let mut log = Vec::new();
        while log.len() < 150 {
            queue.drain(&mut log);
            thread::yield_now();
        }
        for producer in producers {
            producer.join().unwrap();
        }

        for producer in 0..3 {
            let sequence: Vec<u32> = log
                .iter()
                .filter(|(p, _)| *p == producer)
                .map(|(_, s)| *s)
                .collect();
            assert_eq!(sequence, (0..50).collect::<Vec<_>>());
        }
    }
}
