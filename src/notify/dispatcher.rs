// ==========================================
// VitalVida Sync Pipeline - notification dispatcher
// ==========================================
// QUEUED -> send on the first channel that supports it
//        -> SENT | FAILED (error kept on the row)
// Sends of one batch run concurrently.
// ==========================================

use crate::db::now_ts;
use crate::domain::notification::Notification;
use crate::notify::channel::{ChannelError, NotificationChannel};
use crate::repository::{NotificationRepository, RepositoryResult};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn total(&self) -> usize {
        self.sent + self.failed
    }
}

pub struct NotificationDispatcher {
    repo: Arc<NotificationRepository>,
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl NotificationDispatcher {
    pub fn new(repo: Arc<NotificationRepository>, channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { repo, channels }
    }

    fn channel_for(&self, notification: &Notification) -> Option<&Arc<dyn NotificationChannel>> {
        self.channels
            .iter()
            .find(|c| c.supports(notification.channel))
    }

    /// Send up to `limit` queued notifications
    pub async fn dispatch_queued(&self, limit: i64) -> RepositoryResult<DispatchReport> {
        let queued = self.repo.list_queued(limit)?;
        if queued.is_empty() {
            return Ok(DispatchReport::default());
        }

        let sends = queued.iter().map(|n| async move {
            let result = match self.channel_for(n) {
                Some(channel) => channel.send(n).await,
                None => Err(ChannelError::Unavailable(format!(
                    "no channel for {}",
                    n.channel.as_str()
                ))),
            };
            (n, result)
        });
        let results = join_all(sends).await;

        let mut report = DispatchReport::default();
        for (notification, result) in results {
            match result {
                Ok(()) => {
                    self.repo.mark_sent(&notification.notification_id, now_ts())?;
                    report.sent += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        notification_id = %notification.notification_id,
                        recipient = %notification.recipient,
                        error = %e,
                        "notification not delivered"
                    );
                    self.repo
                        .mark_failed(&notification.notification_id, &e.to_string())?;
                    report.failed += 1;
                }
            }
        }

        tracing::debug!(sent = report.sent, failed = report.failed, "notification batch dispatched");
        Ok(report)
    }

    /// Dispatch every `interval` until `shutdown` flips to true
    pub async fn run(&self, interval: Duration, batch_size: i64, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Err(e) = self.dispatch_queued(batch_size).await {
                tracing::error!(error = %e, "notification dispatch failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("notification dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::domain::notification::{Channel, NotificationStatus};
    use crate::domain::types::Severity;
    use crate::notify::channel::LogChannel;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// SMS gateway that rejects one recipient
    struct PickySms;

    #[async_trait]
    impl NotificationChannel for PickySms {
        fn name(&self) -> &str {
            "picky-sms"
        }
        fn supports(&self, channel: Channel) -> bool {
            channel == Channel::Sms
        }
        async fn send(&self, n: &Notification) -> Result<(), ChannelError> {
            if n.recipient == "DA-BAD" {
                return Err(ChannelError::Rejected("invalid msisdn".to_string()));
            }
            Ok(())
        }
    }

    fn repo() -> Arc<NotificationRepository> {
        Arc::new(NotificationRepository::new(Arc::new(Mutex::new(
            open_in_memory().unwrap(),
        ))))
    }

    #[tokio::test]
    async fn test_dispatch_marks_sent_and_failed() {
        let repo = repo();
        repo.insert(&Notification::to_agent("DA-0001", "compliance.warning", Severity::Info, "hi".into()))
            .unwrap();
        repo.insert(&Notification::to_agent("DA-BAD", "compliance.warning", Severity::Info, "hi".into()))
            .unwrap();
        // no channel supports IN_APP here
        repo.insert(&Notification::ops_alert("bin.over_capacity", Severity::Critical, "over".into()))
            .unwrap();

        let dispatcher = NotificationDispatcher::new(repo.clone(), vec![Arc::new(PickySms)]);
        let report = dispatcher.dispatch_queued(10).await.unwrap();
        assert_eq!(report, DispatchReport { sent: 1, failed: 2 });

        let bad = repo.list_by_recipient("DA-BAD").unwrap();
        assert_eq!(bad[0].status, NotificationStatus::Failed);
        assert!(bad[0].error_message.as_deref().unwrap().contains("invalid msisdn"));
        assert!(repo.list_queued(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_log_channel_sends_everything() {
        let repo = repo();
        repo.insert(&Notification::ops_alert("bin.near_capacity", Severity::Warning, "near".into()))
            .unwrap();
        let dispatcher = NotificationDispatcher::new(repo.clone(), vec![Arc::new(LogChannel)]);

        assert_eq!(dispatcher.dispatch_queued(10).await.unwrap().sent, 1);
        assert_eq!(dispatcher.dispatch_queued(10).await.unwrap().total(), 0);
    }
}
