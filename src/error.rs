use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The error type for an inventory run.
///
/// Only [`InventoryError::Configuration`] ever fails a whole run. Every other
/// variant is captured per unit of work, logged, and turned into a degraded
/// entry in the final report.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The volume list is empty or malformed. Raised before anything is dispatched.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The platform capacity query failed for one volume.
    #[error("capacity probe failed for {path}: {reason}")]
    Probe {
        /// The volume root that was probed.
        path: PathBuf,
        /// What the platform reported.
        reason: String,
    },
    /// The top-level folder of a scan unit could not be opened or listed.
    #[error("cannot open scan root {path}: {source}")]
    ScanRoot {
        /// The folder that failed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// An entry below a scan root could not be read. Absorbed by the scanner.
    #[error("unreadable entry {path}: {reason}")]
    ScanLeaf {
        /// The entry that failed, if the walker knew it.
        path: PathBuf,
        /// The walker's description of the failure.
        reason: String,
    },
    /// A unit of work did not finish within its deadline.
    #[error("{path} did not finish within {timeout_ms} ms")]
    TimedOut {
        /// The volume or folder the unit was working on.
        path: PathBuf,
        /// The configured deadline.
        timeout_ms: u64,
    },
    /// A scan stopped because its cancellation token fired.
    #[error("scan cancelled")]
    Cancelled,
    /// A worker task panicked or was aborted before reporting.
    #[error("worker failed: {0}")]
    Worker(String),
}

impl InventoryError {
    /// Short machine-friendly code, used in log records and the JSON report.
    pub fn code(&self) -> &'static str {
        match self {
            InventoryError::Configuration(_) => "configuration",
            InventoryError::Probe { .. } => "probe_failed",
            InventoryError::ScanRoot { .. } => "scan_root_failed",
            InventoryError::ScanLeaf { .. } => "scan_leaf_failed",
            InventoryError::TimedOut { .. } => "timed_out",
            InventoryError::Cancelled => "cancelled",
            InventoryError::Worker(_) => "worker_failed",
        }
    }

    /// Whether this error fails the whole run rather than a single entry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, InventoryError::Configuration(_))
    }
}

impl From<walkdir::Error> for InventoryError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
        let reason = match err.io_error() {
            Some(io_err) => format!("{}: {}", io_err.kind(), io_err),
            None => err.to_string(),
        };
        InventoryError::ScanLeaf { path, reason }
    }
}

impl From<globset::Error> for InventoryError {
    fn from(err: globset::Error) -> Self {
        InventoryError::Configuration(format!("Invalid glob pattern: {}", err))
    }
}

/// A type alias for `Result<T, InventoryError>`.
pub type InventoryResult<T> = Result<T, InventoryError>;
