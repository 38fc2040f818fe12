// ==========================================
// VitalVida Sync Pipeline - event publisher seam
// ==========================================
// APIs depend on this trait only; the queue dispatcher
// implements it (dependency inversion between api and queue).
// ==========================================

use crate::events::EventEnvelope;
use crate::queue::QueueError;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to enqueue event: {0}")]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub trait EventPublisher: Send + Sync {
    /// Publish one event.
    ///
    /// Returns the ids of the queued jobs (one per subscribed listener).
    fn publish(&self, envelope: EventEnvelope) -> Result<Vec<String>, PublishError>;
}

/// Drops every event (unit tests, dry runs)
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl EventPublisher for NoOpEventPublisher {
    fn publish(&self, envelope: EventEnvelope) -> Result<Vec<String>, PublishError> {
        tracing::debug!(
            event_id = %envelope.event_id,
            kind = %envelope.kind(),
            "NoOpEventPublisher: event dropped"
        );
        Ok(Vec::new())
    }
}

/// Wraps Option<Arc<dyn EventPublisher>>
#[derive(Clone)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn EventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn publish(&self, envelope: EventEnvelope) -> Result<Vec<String>, PublishError> {
        match &self.inner {
            Some(publisher) => publisher.publish(envelope),
            None => {
                tracing::debug!(
                    event_id = %envelope.event_id,
                    kind = %envelope.kind(),
                    "no publisher configured, event skipped"
                );
                Ok(Vec::new())
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DomainEvent;
    use std::sync::Mutex;

    struct RecordingPublisher {
        seen: Mutex<Vec<String>>,
    }

    impl EventPublisher for RecordingPublisher {
        fn publish(&self, envelope: EventEnvelope) -> Result<Vec<String>, PublishError> {
            self.seen.lock().unwrap().push(envelope.event_id.clone());
            Ok(vec![format!("job-{}", envelope.event_id)])
        }
    }

    fn envelope() -> EventEnvelope {
        EventEnvelope::new(
            DomainEvent::AgentUpdated {
                agent_id: "a1".to_string(),
                da_code: "DA-0001".to_string(),
                changed_fields: vec!["phone".to_string()],
            },
            "test",
        )
    }

    #[test]
    fn test_optional_publisher_none() {
        let publisher = OptionalEventPublisher::none();
        assert!(!publisher.is_configured());
        assert!(publisher.publish(envelope()).unwrap().is_empty());
    }

    #[test]
    fn test_optional_publisher_delegates() {
        let inner = Arc::new(RecordingPublisher {
            seen: Mutex::new(Vec::new()),
        });
        let publisher = OptionalEventPublisher::with_publisher(inner.clone());
        let env = envelope();
        let ids = publisher.publish(env.clone()).unwrap();
        assert_eq!(ids, vec![format!("job-{}", env.event_id)]);
        assert_eq!(inner.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_noop_publisher() {
        assert!(NoOpEventPublisher.publish(envelope()).unwrap().is_empty());
    }
}
