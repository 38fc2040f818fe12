// ==========================================
// VitalVida Sync Pipeline - application layer
// ==========================================
// Responsibility: build the object graph the worker binary runs
// ==========================================

pub mod state;

pub use state::{get_default_db_path, AppState, DEFAULT_POLL_INTERVAL};
