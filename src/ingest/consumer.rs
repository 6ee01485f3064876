//! Queue consumer driving the ingestion worker.
//!
//! Success acknowledges the message; any [`IngestError`](super::IngestError)
//! nacks it, leaving redelivery and dead-lettering to the queue.

use std::sync::mpsc::{channel, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::bus::{Disposition, PublishError, Subscriber};
use crate::object::ObjectStore;
use crate::store::BookStore;

use super::{IngestReport, IngestionWorker};

/// Statistics from the consumer thread.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    pub acknowledged: usize,
    pub redelivered: usize,
    pub dead_lettered: usize,
    pub polls: usize,
}

/// Result of one poll/process step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing arrived before the poll timed out.
    Idle,
    Acknowledged(IngestReport),
    Redelivered,
    DeadLettered,
}

impl ConsumerStats {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Idle => {}
            Outcome::Acknowledged(_) => self.acknowledged += 1,
            Outcome::Redelivered => self.redelivered += 1,
            Outcome::DeadLettered => self.dead_lettered += 1,
        }
    }
}

/// Pulls messages from a [`Subscriber`] and feeds them to an [`IngestionWorker`].
pub struct QueueConsumer<O, S, Q> {
    worker: IngestionWorker<O, S>,
    subscriber: Q,
}

impl<O, S, Q> QueueConsumer<O, S, Q>
where
    O: ObjectStore,
    S: BookStore,
    Q: Subscriber,
{
    pub fn new(worker: IngestionWorker<O, S>, subscriber: Q) -> Self {
        Self { worker, subscriber }
    }

    pub fn worker(&self) -> &IngestionWorker<O, S> {
        &self.worker
    }

    /// Poll once, process what arrives, then ack or nack it.
    pub fn process_next(&self, timeout_ms: u64) -> Result<Outcome, PublishError> {
        let Some(event) = self.subscriber.poll(timeout_ms)? else {
            return Ok(Outcome::Idle);
        };

        match self.worker.process_message(&event) {
            Ok(report) => {
                self.subscriber.ack(&event.id)?;
                Ok(Outcome::Acknowledged(report))
            }
            Err(err) => {
                let reason = err.to_string();
                match self.subscriber.nack(&event.id, &reason)? {
                    Disposition::Redelivered => {
                        tracing::warn!(
                            message_id = %event.id,
                            receive_count = event.receive_count,
                            stage = %err.stage(),
                            error = %reason,
                            "ingestion failed; message will be redelivered"
                        );
                        Ok(Outcome::Redelivered)
                    }
                    Disposition::DeadLettered => {
                        tracing::error!(
                            message_id = %event.id,
                            receive_count = event.receive_count,
                            stage = %err.stage(),
                            error = %reason,
                            "ingestion failed; message dead-lettered"
                        );
                        Ok(Outcome::DeadLettered)
                    }
                }
            }
        }
    }
}

impl<O, S, Q> QueueConsumer<O, S, Q>
where
    O: ObjectStore + 'static,
    S: BookStore + 'static,
    Q: Subscriber + 'static,
{
    /// Spawn a background thread consuming until stopped.
    ///
    /// Each poll waits up to `poll_interval` for a message.
    pub fn spawn(
        worker: IngestionWorker<O, S>,
        subscriber: Q,
        poll_interval: Duration,
    ) -> ConsumerHandle {
        Self::new(worker, subscriber).start(poll_interval)
    }

    /// Move this consumer onto a background thread.
    pub fn start(self, poll_interval: Duration) -> ConsumerHandle {
        let (stop_tx, stop_rx) = channel();
        let timeout_ms = u64::try_from(poll_interval.as_millis()).unwrap_or(u64::MAX);

        let handle = thread::spawn(move || {
            let mut stats = ConsumerStats::default();

            loop {
                match stop_rx.try_recv() {
                    Ok(()) | Err(TryRecvError::Disconnected) => break,
                    Err(TryRecvError::Empty) => {}
                }

                stats.polls += 1;

                match self.process_next(timeout_ms) {
                    Ok(outcome) => stats.record(outcome),
                    Err(err) => {
                        tracing::warn!(error = %err, "queue call failed");
                        thread::sleep(poll_interval);
                    }
                }
            }

            stats
        });

        ConsumerHandle {
            stop_tx,
            handle: Some(handle),
        }
    }
}

/// Handle to a running consumer thread.
pub struct ConsumerHandle {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<ConsumerStats>>,
}

impl ConsumerHandle {
    /// Signal the consumer to stop and wait for it to finish.
    pub fn stop(mut self) -> ConsumerStats {
        let _ = self.stop_tx.send(());
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => ConsumerStats::default(),
        }
    }

    /// Signal the consumer to stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}
