//! Per-job-id fan-out of lifecycle events.
//!
//! [`JobEventHub`] is the push side of live status: the queue publishes, and
//! any number of observers subscribed to a job id receive the stream. It is
//! designed to be shared via `Arc<JobEventHub>` across the application.
//!
//! Delivery is best-effort and at-most-once: events reach only the observers
//! subscribed at emission time; there is no buffering or replay for late
//! joiners, and a publish with zero subscribers is silently dropped.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use dossier_core::JobId;

/// Default per-topic buffer capacity.
///
/// When the buffer is full, the oldest un-consumed events are dropped and
/// slow receivers observe a `RecvError::Lagged`.
const DEFAULT_CAPACITY: usize = 64;

/// A lifecycle event for one job.
///
/// For one job id, events arrive in emission order, with `progress`
/// percentages non-decreasing across consecutive progress events; the
/// terminal `completed`/`failed` event may arrive at any percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Queued,
    Progress { percent: u8, message: String },
    Completed { result: serde_json::Value },
    Failed { error: String },
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Completed { .. } | JobEvent::Failed { .. })
    }
}

/// In-process fan-out hub, keyed by job id.
pub struct JobEventHub {
    topics: RwLock<HashMap<JobId, broadcast::Sender<JobEvent>>>,
    capacity: usize,
}

impl JobEventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Join interest in a job id.
    ///
    /// Leaving is implicit: drop the receiver. Only events published after
    /// this call are delivered.
    pub fn subscribe(&self, job_id: JobId) -> broadcast::Receiver<JobEvent> {
        let mut topics = self.topics.write().unwrap();
        topics
            .entry(job_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish an event to the observers currently subscribed to `job_id`.
    ///
    /// With no live subscribers the event is dropped. A terminal event closes
    /// the topic: subscribers still drain buffered events, then observe the
    /// closed channel.
    pub fn publish(&self, job_id: JobId, event: JobEvent) {
        let terminal = event.is_terminal();
        let mut topics = self.topics.write().unwrap();
        let reclaim = match topics.get(&job_id) {
            Some(sender) if sender.receiver_count() > 0 => {
                // Ignore the SendError; it only means all receivers left
                // between the count check and the send.
                let _ = sender.send(event);
                terminal
            }
            // Every receiver is gone; reclaim the topic.
            Some(_) => true,
            None => false,
        };
        if reclaim {
            topics.remove(&job_id);
        }
    }

    /// Number of observers currently subscribed to a job id.
    pub fn subscriber_count(&self, job_id: JobId) -> usize {
        self.topics
            .read()
            .unwrap()
            .get(&job_id)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Number of live topics (jobs with at least one past subscriber that has
    /// not been reclaimed yet).
    pub fn topic_count(&self) -> usize {
        self.topics.read().unwrap().len()
    }
}

impl Default for JobEventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn subscriber_receives_events_in_emission_order() {
        let hub = JobEventHub::default();
        let job_id = JobId::new();
        let mut rx = hub.subscribe(job_id);

        hub.publish(job_id, JobEvent::Queued);
        hub.publish(
            job_id,
            JobEvent::Progress {
                percent: 20,
                message: "querying provider".into(),
            },
        );
        hub.publish(
            job_id,
            JobEvent::Completed {
                result: json!({"ok": true}),
            },
        );

        assert_eq!(rx.recv().await.unwrap(), JobEvent::Queued);
        assert!(matches!(
            rx.recv().await.unwrap(),
            JobEvent::Progress { percent: 20, .. }
        ));
        assert!(rx.recv().await.unwrap().is_terminal());
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_the_same_event() {
        let hub = JobEventHub::default();
        let job_id = JobId::new();
        let mut rx1 = hub.subscribe(job_id);
        let mut rx2 = hub.subscribe(job_id);

        hub.publish(job_id, JobEvent::Queued);

        assert_eq!(rx1.recv().await.unwrap(), JobEvent::Queued);
        assert_eq!(rx2.recv().await.unwrap(), JobEvent::Queued);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let hub = JobEventHub::default();
        hub.publish(JobId::new(), JobEvent::Queued);
    }

    #[tokio::test]
    async fn late_joiner_misses_earlier_events() {
        let hub = JobEventHub::default();
        let job_id = JobId::new();

        // Published before anyone subscribed: dropped, not replayed.
        hub.publish(job_id, JobEvent::Queued);

        let mut rx = hub.subscribe(job_id);
        hub.publish(
            job_id,
            JobEvent::Progress {
                percent: 50,
                message: "half way".into(),
            },
        );

        assert!(matches!(
            rx.recv().await.unwrap(),
            JobEvent::Progress { percent: 50, .. }
        ));
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn terminal_event_closes_the_topic() {
        let hub = JobEventHub::default();
        let job_id = JobId::new();
        let mut rx = hub.subscribe(job_id);

        hub.publish(job_id, JobEvent::Failed { error: "boom".into() });

        assert_eq!(hub.topic_count(), 0);
        // The buffered terminal event still drains before the close.
        assert!(rx.recv().await.unwrap().is_terminal());
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[test]
    fn events_of_different_jobs_do_not_cross() {
        let hub = JobEventHub::default();
        let a = JobId::new();
        let b = JobId::new();
        let mut rx_b = hub.subscribe(b);

        hub.publish(a, JobEvent::Queued);
        assert!(matches!(
            rx_b.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn abandoned_topic_is_reclaimed_on_publish() {
        let hub = JobEventHub::default();
        let job_id = JobId::new();
        drop(hub.subscribe(job_id));
        assert_eq!(hub.topic_count(), 1);

        hub.publish(job_id, JobEvent::Queued);
        assert_eq!(hub.topic_count(), 0);
    }

    #[test]
    fn wire_format_is_tagged_snake_case() {
        let event = JobEvent::Progress {
            percent: 85,
            message: "persisting record".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            json!({"event": "progress", "percent": 85, "message": "persisting record"})
        );
    }
}
