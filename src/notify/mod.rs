// ==========================================
// VitalVida Sync Pipeline - notifications
// ==========================================
// Listeners insert QUEUED rows in their transaction;
// the dispatcher delivers them afterwards.
// ==========================================

pub mod channel;
pub mod dispatcher;
pub mod templates;

pub use channel::{ChannelError, LogChannel, NotificationChannel};
pub use dispatcher::{DispatchReport, NotificationDispatcher};
