// ==========================================
// VitalVida Sync Pipeline - queue-backed event dispatcher
// ==========================================
// Implements EventPublisher: one queued job per subscribed
// listener, each carrying that listener's retry policy.
// Re-publishing the same event id is a no-op per listener.
// ==========================================

use crate::events::publisher::{EventPublisher, PublishError};
use crate::events::EventEnvelope;
use crate::listeners::ListenerRegistry;
use crate::queue::{JobQueue, QueuedJob};
use std::sync::Arc;

pub struct QueueEventDispatcher {
    queue: Arc<JobQueue>,
    registry: Arc<ListenerRegistry>,
}

impl QueueEventDispatcher {
    pub fn new(queue: Arc<JobQueue>, registry: Arc<ListenerRegistry>) -> Self {
        Self { queue, registry }
    }
}

impl EventPublisher for QueueEventDispatcher {
    fn publish(&self, envelope: EventEnvelope) -> Result<Vec<String>, PublishError> {
        let kind = envelope.kind();
        let subscribers = self.registry.subscribers_for(kind);
        if subscribers.is_empty() {
            tracing::warn!(event_id = %envelope.event_id, %kind, "no listener subscribed to event");
            return Ok(Vec::new());
        }

        let payload = serde_json::to_string(&envelope).map_err(crate::queue::QueueError::from)?;
        let now = crate::db::now_ts();

        let mut job_ids = Vec::with_capacity(subscribers.len());
        for listener in subscribers {
            let policy = self.registry.policy_for(listener.name());
            let job = QueuedJob::new(&envelope.event_id, listener.name(), payload.clone(), &policy, now);
            let job_id = self.queue.enqueue(&job)?;
            tracing::info!(
                event_id = %envelope.event_id,
                %kind,
                listener = listener.name(),
                %job_id,
                "event queued for listener"
            );
            job_ids.push(job_id);
        }

        Ok(job_ids)
    }
}
