//! Orchestrates request/response sessions between a caller and a
//! MicroPython-compatible device helper subprocess: spawns and supervises
//! the helper, serializes operations onto its single request/response
//! channel, frames and parses the delimited text protocol, and exposes a
//! typed async API per operation kind.

pub mod child;
pub mod codec;
pub mod config;
pub mod error;
pub mod operation;
pub mod ops;
pub mod project_sync;
pub mod queue;
pub mod reader;
pub mod rtc;
pub mod session;
pub mod state_machine;

pub use config::HelperConfig;
pub use error::SessionError;
pub use operation::{FileRecord, OperationKind, OperationOutcome};
pub use project_sync::UploadProjectRequest;
pub use session::{scan_ports, Session};
