// ==========================================
// VitalVida Sync Pipeline - notification channels
// ==========================================
// SMS / WhatsApp gateways are external collaborators; they
// plug in behind NotificationChannel. LogChannel writes the
// message to the log and is the default for workers.
// ==========================================

use crate::domain::notification::{Channel, Notification};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("recipient rejected: {0}")]
    Rejected(String),

    #[error("channel unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self, channel: Channel) -> bool;

    async fn send(&self, notification: &Notification) -> Result<(), ChannelError>;
}

/// Delivers by logging through tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    fn supports(&self, _channel: Channel) -> bool {
        true
    }

    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        tracing::info!(
            notification_id = %notification.notification_id,
            recipient = %notification.recipient,
            channel = notification.channel.as_str(),
            severity = notification.severity.as_str(),
            category = %notification.category,
            message = %notification.message,
            "notification delivered"
        );
        Ok(())
    }
}
