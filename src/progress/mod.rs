use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::store::ProjectStatus;

/// One progress notification produced by a job run.
///
/// `seq` increases monotonically per project channel; a consumer that has
/// already observed a higher sequence number must discard the event. Progress
/// is best-effort UX, the authoritative state lives on the `Project` record.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub seq: u64,
    pub percent: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
}

struct ChannelEntry {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    // Taken by the first subscriber; a later subscribe re-arms the channel.
    rx: Option<mpsc::UnboundedReceiver<ProgressEvent>>,
    next_seq: u64,
}

impl ChannelEntry {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Some(rx),
            next_seq: 0,
        }
    }
}

/// Process-wide registry mapping project id to its progress channel.
///
/// Entries are created lazily on first publish or subscribe and removed when
/// the observing stream closes or the project is reset/deleted. Publishing
/// never blocks and never fails the producing run.
pub struct ProgressRegistry {
    channels: Mutex<HashMap<String, ChannelEntry>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Push an event for `project_id`, stamping sequence number and
    /// timestamp. Events buffer in the channel while no consumer is attached.
    pub fn publish(
        &self,
        project_id: &str,
        percent: u8,
        message: impl Into<String>,
        status: Option<ProjectStatus>,
    ) {
        let mut channels = self.channels.lock().unwrap();
        let entry = channels
            .entry(project_id.to_string())
            .or_insert_with(ChannelEntry::new);

        let event = ProgressEvent {
            seq: entry.next_seq,
            percent,
            message: message.into(),
            timestamp: Utc::now(),
            status,
        };
        entry.next_seq += 1;

        if entry.tx.send(event.clone()).is_err() {
            // The previous consumer took the receiver and dropped it. Re-arm
            // so the event still buffers for a future subscriber.
            let mut fresh = ChannelEntry::new();
            fresh.next_seq = entry.next_seq;
            let _ = fresh.tx.send(event);
            *entry = fresh;
        }
    }

    /// Attach a consumer, creating the channel if needed. If a receiver was
    /// already handed out, the channel is re-armed and the new subscriber
    /// starts from live events only (buffered deltas are not authoritative).
    pub fn subscribe(&self, project_id: &str) -> mpsc::UnboundedReceiver<ProgressEvent> {
        let mut channels = self.channels.lock().unwrap();
        let entry = channels
            .entry(project_id.to_string())
            .or_insert_with(ChannelEntry::new);

        match entry.rx.take() {
            Some(rx) => rx,
            None => {
                let mut fresh = ChannelEntry::new();
                fresh.next_seq = entry.next_seq;
                let rx = fresh.rx.take().expect("fresh channel has a receiver");
                *entry = fresh;
                rx
            }
        }
    }

    /// Tear down the channel for `project_id` (stream closed, project reset
    /// or deleted). A later publish recreates it from scratch.
    pub fn remove(&self, project_id: &str) {
        if self.channels.lock().unwrap().remove(project_id).is_some() {
            debug!("Removed progress channel for project {}", project_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.channels.lock().unwrap().len()
    }
}

impl Default for ProgressRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_buffer_until_subscribed() {
        let registry = ProgressRegistry::new();
        registry.publish("p1", 25, "one done", None);
        registry.publish("p1", 50, "two done", None);

        let mut rx = registry.subscribe("p1");
        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.percent, 25);
        assert_eq!(second.percent, 50);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn sequence_numbers_are_monotonic() {
        let registry = ProgressRegistry::new();
        for pct in [25u8, 50, 75, 100] {
            registry.publish("p1", pct, "step", None);
        }
        let mut rx = registry.subscribe("p1");
        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            if let Some(prev) = last {
                assert!(event.seq > prev);
            }
            last = Some(event.seq);
        }
        assert_eq!(last, Some(3));
    }

    #[tokio::test]
    async fn publish_survives_dropped_consumer() {
        let registry = ProgressRegistry::new();
        let rx = registry.subscribe("p1");
        drop(rx);

        // Must not fail the producer, and must buffer for the next consumer.
        registry.publish("p1", 100, "done", Some(ProjectStatus::Completed));
        let mut rx = registry.subscribe("p1");
        let event = rx.try_recv().unwrap();
        assert_eq!(event.percent, 100);
        assert_eq!(event.status, Some(ProjectStatus::Completed));
    }

    #[tokio::test]
    async fn remove_tears_down_entry() {
        let registry = ProgressRegistry::new();
        registry.publish("p1", 25, "step", None);
        assert_eq!(registry.len(), 1);
        registry.remove("p1");
        assert_eq!(registry.len(), 0);

        let mut rx = registry.subscribe("p1");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn channels_are_isolated_per_project() {
        let registry = ProgressRegistry::new();
        registry.publish("a", 25, "a-step", None);
        registry.publish("b", 50, "b-step", None);

        let mut rx_a = registry.subscribe("a");
        let mut rx_b = registry.subscribe("b");
        assert_eq!(rx_a.try_recv().unwrap().message, "a-step");
        assert_eq!(rx_b.try_recv().unwrap().message, "b-step");
    }
}
