//! Run statistics, tallied by the collector's coordinator as unit reports arrive.

use serde::{Deserialize, Serialize};

use crate::error::InventoryResult;
use crate::scanner::ScanOutcome;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub units_dispatched: usize,
    pub units_completed: usize,
    pub units_failed: usize,
    pub files_scanned: u64,
    pub dirs_scanned: u64,
    pub bytes_scanned: u64,
    pub warnings_count: u64,
    pub elapsed_ms: u64,
}

impl RunStats {
    pub fn dispatched(units: usize) -> Self {
        Self { units_dispatched: units, ..Self::default() }
    }

    pub fn record_probe<T>(&mut self, result: &InventoryResult<T>) {
        match result {
            Ok(_) => self.units_completed += 1,
            Err(_) => self.units_failed += 1,
        }
    }

    pub fn record_scan(&mut self, result: &InventoryResult<ScanOutcome>) {
        match result {
            Ok(outcome) => {
                self.units_completed += 1;
                self.files_scanned = self.files_scanned.saturating_add(outcome.files);
                self.dirs_scanned = self.dirs_scanned.saturating_add(outcome.dirs);
                self.bytes_scanned = self.bytes_scanned.saturating_add(outcome.total_bytes);
                self.warnings_count = self.warnings_count.saturating_add(outcome.warnings);
            }
            Err(_) => self.units_failed += 1,
        }
    }

    /// A unit that exited without reporting.
    pub fn record_missing(&mut self) {
        self.units_failed += 1;
    }
}
