pub mod cli;
pub mod confirm;
pub mod erase;
mod error;
pub mod extract;
pub mod io;
pub mod patch;
pub mod record;
pub mod report;
pub mod scanner;

pub use confirm::{ConfirmGate, PendingWrite, TerminalGate, WriteKind};
pub use erase::{erase, Erased};
pub use error::{ImageRole, Result, UcodeError};
pub use extract::{extract, Extracted};
pub use patch::{patch, Patched};
pub use record::{validate, MicrocodeRecord};
pub use report::{report, ScanEvent, ScanReporter};
pub use scanner::{RecordScanner, ScanEntry};
