//! In-memory queue with visibility timeouts and a dead-letter queue.
//!
//! Models the redelivery contract the ingestion worker relies on:
//! - a polled message is hidden (in flight) until acked, nacked, or its
//!   visibility timeout lapses
//! - a nacked or timed-out message becomes visible again, unless it has
//!   already been received `max_receive_count` times, in which case it is
//!   moved to the dead-letter queue and never delivered again automatically

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::{Disposition, Event, PublishError, Publisher, Subscriber};

/// Redelivery settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// How long a received message stays hidden before it is redelivered.
    pub visibility_timeout: Duration,
    /// Deliveries allowed before a failing message is dead-lettered.
    pub max_receive_count: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(30),
            max_receive_count: 2,
        }
    }
}

/// A message that exhausted its receive budget.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub event: Event,
    /// Reason given by the last failed delivery.
    pub reason: String,
    pub receive_count: u32,
}

struct InFlight {
    event: Event,
    visible_at: Instant,
}

#[derive(Default)]
struct State {
    visible: VecDeque<Event>,
    in_flight: HashMap<String, InFlight>,
    dead: Vec<DeadLetter>,
    acked: Vec<String>,
}

/// Thread-safe in-memory queue. Clones are handles to the same queue, so one
/// clone can publish while another consumes.
///
/// ## Example
///
/// ```
/// use std::time::Duration;
/// use book_catalog::bus::{Disposition, Event, InMemoryQueue, Publisher, QueueConfig, Subscriber};
///
/// let queue = InMemoryQueue::with_config(QueueConfig {
///     visibility_timeout: Duration::from_secs(30),
///     max_receive_count: 2,
/// });
/// queue.publish(Event::text("msg-1", "ObjectCreated", "not json")).unwrap();
///
/// let first = queue.poll(10).unwrap().unwrap();
/// assert_eq!(queue.nack(&first.id, "parse failed").unwrap(), Disposition::Redelivered);
///
/// let second = queue.poll(10).unwrap().unwrap();
/// assert_eq!(second.receive_count, 2);
/// assert_eq!(queue.nack(&second.id, "parse failed").unwrap(), Disposition::DeadLettered);
///
/// assert!(queue.poll(10).unwrap().is_none());
/// assert_eq!(queue.dead_letters().len(), 1);
/// ```
#[derive(Clone)]
pub struct InMemoryQueue {
    config: QueueConfig,
    state: Arc<Mutex<State>>,
    available: Arc<Condvar>,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueue {
    /// Create a queue with the default redelivery settings.
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Create a queue with explicit redelivery settings. A receive count of
    /// zero is treated as one.
    pub fn with_config(mut config: QueueConfig) -> Self {
        config.max_receive_count = config.max_receive_count.max(1);
        Self {
            config,
            state: Arc::new(Mutex::new(State::default())),
            available: Arc::new(Condvar::new()),
        }
    }

    pub fn config(&self) -> QueueConfig {
        self.config
    }

    /// Messages waiting or in flight (dead letters excluded).
    pub fn len(&self) -> usize {
        self.lock()
            .map(|s| s.visible.len() + s.in_flight.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages currently hidden from consumers.
    pub fn in_flight(&self) -> usize {
        self.lock().map(|s| s.in_flight.len()).unwrap_or(0)
    }

    /// Snapshot of the dead-letter queue.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.lock().map(|s| s.dead.clone()).unwrap_or_default()
    }

    /// IDs of acknowledged messages, in ack order.
    pub fn acknowledged(&self) -> Vec<String> {
        self.lock().map(|s| s.acked.clone()).unwrap_or_default()
    }

    /// Move every dead letter back onto the queue with a fresh receive budget.
    /// Returns how many were moved.
    pub fn redrive_dead_letters(&self) -> usize {
        let Ok(mut state) = self.lock() else {
            return 0;
        };
        let dead = std::mem::take(&mut state.dead);
        let moved = dead.len();
        for letter in dead {
            let mut event = letter.event;
            event.receive_count = 0;
            state.visible.push_back(event);
        }
        drop(state);
        self.available.notify_all();
        moved
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, PublishError> {
        self.state
            .lock()
            .map_err(|_| PublishError::ConnectionFailed("queue lock poisoned".into()))
    }

    fn contains(state: &State, id: &str) -> bool {
        state.in_flight.contains_key(id) || state.visible.iter().any(|e| e.id == id)
    }

    /// Return lapsed in-flight messages to the queue (or the dead-letter queue).
    fn reclaim_expired(&self, state: &mut State, now: Instant) {
        let expired: Vec<String> = state
            .in_flight
            .iter()
            .filter(|(_, f)| f.visible_at <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            if let Some(flight) = state.in_flight.remove(&id) {
                self.requeue(state, flight.event, "visibility timeout expired");
            }
        }
    }

    fn requeue(&self, state: &mut State, event: Event, reason: &str) -> Disposition {
        if event.receive_count >= self.config.max_receive_count {
            tracing::warn!(
                message_id = %event.id,
                receive_count = event.receive_count,
                reason,
                "moving message to dead-letter queue"
            );
            state.dead.push(DeadLetter {
                receive_count: event.receive_count,
                reason: reason.to_string(),
                event,
            });
            Disposition::DeadLettered
        } else {
            tracing::debug!(message_id = %event.id, reason, "message will be redelivered");
            state.visible.push_back(event);
            Disposition::Redelivered
        }
    }
}

impl Publisher for InMemoryQueue {
    fn publish(&self, event: Event) -> Result<(), PublishError> {
        let mut state = self.lock()?;
        if Self::contains(&state, &event.id) {
            return Err(PublishError::Rejected(format!(
                "message {} is already queued",
                event.id
            )));
        }
        state.visible.push_back(event);
        drop(state);
        self.available.notify_one();
        Ok(())
    }
}

impl Subscriber for InMemoryQueue {
    fn poll(&self, timeout_ms: u64) -> Result<Option<Event>, PublishError> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut state = self.lock()?;

        loop {
            let now = Instant::now();
            self.reclaim_expired(&mut state, now);

            if let Some(mut event) = state.visible.pop_front() {
                event.receive_count += 1;
                state.in_flight.insert(
                    event.id.clone(),
                    InFlight {
                        event: event.clone(),
                        visible_at: now + self.config.visibility_timeout,
                    },
                );
                return Ok(Some(event));
            }

            if now >= deadline {
                return Ok(None);
            }

            // Wake periodically so lapsed in-flight messages are noticed.
            let wait = (deadline - now).min(Duration::from_millis(10));
            state = self
                .available
                .wait_timeout(state, wait)
                .map_err(|_| PublishError::ConnectionFailed("queue lock poisoned".into()))?
                .0;
        }
    }

    fn ack(&self, event_id: &str) -> Result<(), PublishError> {
        let mut state = self.lock()?;
        if state.in_flight.remove(event_id).is_none() {
            return Err(PublishError::UnknownReceipt(event_id.to_string()));
        }
        state.acked.push(event_id.to_string());
        Ok(())
    }

    fn nack(&self, event_id: &str, reason: &str) -> Result<Disposition, PublishError> {
        let mut state = self.lock()?;
        let flight = state
            .in_flight
            .remove(event_id)
            .ok_or_else(|| PublishError::UnknownReceipt(event_id.to_string()))?;
        let disposition = self.requeue(&mut state, flight.event, reason);
        drop(state);
        if disposition == Disposition::Redelivered {
            self.available.notify_one();
        }
        Ok(disposition)
    }
}
