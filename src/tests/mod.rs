//! Unit and integration tests for the inventory engine.
//!
//! ## Test Modules
//!
//! - **format_tests**: Human readable sizes and execution time
//! - **ranking_tests**: Size ordering, stability and idempotence
//! - **probe_tests**: Capacity probing and threshold classification
//! - **scanner_tests**: Directory sizing and failure absorption
//! - **collector_tests**: Full runs against synthetic volumes
//! - **config_tests**: Configuration loading and validation
//! - **report_tests**: Text and JSON rendering
//! - **error_tests**: Error codes and messages
//!
//! Individual modules can be run with e.g. `cargo test scanner_tests`.

pub mod collector_tests;

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{InventoryError, InventoryResult};
use crate::probe::CapacityProbe;
use crate::types::Capacity;

/// Probe returning fixed numbers, optionally failing or stalling for some paths.
pub struct FakeProbe {
    pub capacity: Capacity,
    pub fail_for: Vec<String>,
    pub delay: Option<Duration>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeProbe {
    pub fn new(total: u64, free: u64) -> Self {
        Self {
            capacity: Capacity { total, free, available: free },
            fail_for: Vec::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl CapacityProbe for FakeProbe {
    fn capacity(&self, path: &Path) -> InventoryResult<Capacity> {
        let p = path.to_string_lossy().to_string();
        self.calls.lock().unwrap().push(p.clone());
        if let Some(d) = self.delay {
            std::thread::sleep(d);
        }
        if self.fail_for.iter().any(|f| p.contains(f.as_str())) {
            return Err(InventoryError::Probe { path: path.to_path_buf(), reason: "stale handle".into() });
        }
        Ok(self.capacity)
    }
}

pub fn write_file(path: &Path, len: usize) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, vec![b'x'; len]).unwrap();
}
