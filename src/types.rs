use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::format::byte_count_si;
use crate::metrics::RunStats;
use crate::ranking::SortDirection;

/// A configured storage root and the folders to size inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub path: PathBuf,
    pub label: Option<String>,
    pub folders: Vec<String>,
}

impl Volume {
    pub fn new(path: impl Into<PathBuf>, folders: Vec<String>) -> Self {
        Self { path: path.into(), label: None, folders }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Name shown in reports: the label when set, the path otherwise.
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(l) if !l.trim().is_empty() => l.clone(),
            _ => self.path.to_string_lossy().to_string(),
        }
    }

    /// Absolute path of one configured folder.
    pub fn folder_path(&self, folder: &str) -> PathBuf {
        self.path.join(folder)
    }
}

/// Raw capacity numbers for the filesystem backing a volume, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    pub total: u64,
    pub free: u64,
    /// Free bytes usable by an unprivileged caller.
    pub available: u64,
}

impl Capacity {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.free)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "kebab-case")]
pub enum UsageStatus {
    OverThreshold,
    Normal,
    Error(String),
}

impl UsageStatus {
    pub fn label(&self) -> &'static str {
        match self {
            UsageStatus::OverThreshold => "over-threshold",
            UsageStatus::Normal => "normal",
            UsageStatus::Error(_) => "error",
        }
    }
}

/// Result of probing one volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeUsage {
    pub path: PathBuf,
    pub display_name: String,
    pub capacity: Option<Capacity>,
    pub percent_used: Option<f64>,
    pub status: UsageStatus,
    pub message: String,
}

/// One measured folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeEntry {
    /// Folder name as configured, or the child directory name.
    pub name: String,
    /// Full display path.
    pub key: String,
    pub bytes: u64,
    /// Human readable `bytes` (SI units).
    pub size: String,
    pub error: Option<String>,
    /// Ranked sizes of the immediate subdirectories.
    pub children: Vec<SizeEntry>,
}

impl SizeEntry {
    pub fn measured(name: impl Into<String>, key: impl Into<String>, bytes: u64) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            bytes,
            size: byte_count_si(bytes),
            error: None,
            children: Vec::new(),
        }
    }

    /// A zero-sized entry flagged with the failure that produced it.
    pub fn degraded(name: impl Into<String>, key: impl Into<String>, error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), ..Self::measured(name, key, 0) }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Entries ordered by size in `direction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntries {
    pub direction: SortDirection,
    pub entries: Vec<SizeEntry>,
}

impl RankedEntries {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SizeEntry> {
        self.entries.iter()
    }
}

/// The sealed, ranked folder sizes of one volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderInventory {
    pub folder_root: String,
    pub entries: RankedEntries,
}

/// Everything one run produced, handed to a renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub run_id: Uuid,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub elapsed_ms: u64,
    pub usages: Vec<VolumeUsage>,
    pub inventories: Vec<FolderInventory>,
    pub stats: RunStats,
}

impl Report {
    pub fn degraded_count(&self) -> usize {
        let usages = self.usages.iter().filter(|u| matches!(u.status, UsageStatus::Error(_))).count();
        let folders = self
            .inventories
            .iter()
            .flat_map(|inv| inv.entries.iter())
            .filter(|e| e.is_degraded())
            .count();
        usages + folders
    }
}
