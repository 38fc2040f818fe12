// ==========================================
// VitalVida Sync Pipeline - import layer
// ==========================================
// Responsibility: bulk DA roster intake (CSV)
// ==========================================

pub mod error;
pub mod file_parser;
pub mod roster_importer;

pub use error::{ImportError, ImportResult};
pub use file_parser::{parse_roster, RawRow, ROSTER_COLUMNS};
pub use roster_importer::{ImportSummary, RejectedRow, RosterImporter};
