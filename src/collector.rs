//! Concurrent inventory of configured volumes.
//!
//! One unit of work is dispatched per volume (capacity probe) and per
//! (volume, folder) pair (size scan). Units run on the blocking pool, capped
//! by a semaphore, and report on an mpsc channel. The coordinator counts
//! reports, writes each into the slot reserved for it and seals a volume's
//! [`FolderInventory`] once the last of its folders has reported.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use globset::GlobSet;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{InventoryError, InventoryResult};
use crate::metrics::RunStats;
use crate::probe::{self, classify, CapacityProbe, SystemProbe};
use crate::ranking::{rank, SortDirection};
use crate::scanner::{build_globset, child_key, dir_size, ScanOptions, ScanOutcome};
use crate::types::{Capacity, FolderInventory, Report, SizeEntry, UsageStatus, Volume, VolumeUsage};

#[derive(Debug, Clone)]
pub struct CollectorOptions {
    /// Maximum number of units running at once.
    pub concurrency: usize,
    /// Deadline for a single probe or folder scan.
    pub unit_timeout: Option<Duration>,
    pub percent_threshold: u8,
    pub sort: SortDirection,
    pub scan: ScanOptions,
    pub message_over_threshold: String,
    pub message_normal: String,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            unit_timeout: None,
            percent_threshold: 80,
            sort: SortDirection::Desc,
            scan: ScanOptions::default(),
            message_over_threshold: "usage above threshold".to_string(),
            message_normal: "ok".to_string(),
        }
    }
}

/// About three quarters of the CPU cores, never less than two.
pub fn default_concurrency() -> usize {
    (num_cpus::get() * 3 / 4).max(2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Dispatching,
    Collecting,
    Complete,
}

fn enter(run_id: Uuid, phase: &mut RunPhase, next: RunPhase) {
    debug!(%run_id, from = ?*phase, to = ?next, "inventory phase");
    *phase = next;
}

enum UnitReport {
    Usage { volume: usize, result: InventoryResult<(Capacity, f64)> },
    Folder { volume: usize, folder: usize, result: InventoryResult<ScanOutcome> },
}

pub struct InventoryCollector {
    probe: Arc<dyn CapacityProbe>,
    options: CollectorOptions,
    excludes: Arc<GlobSet>,
    cancel: CancellationToken,
}

impl InventoryCollector {
    pub fn new(probe: Arc<dyn CapacityProbe>, options: CollectorOptions) -> InventoryResult<Self> {
        let excludes = Arc::new(build_globset(&options.scan.excludes)?);
        Ok(Self { probe, options, excludes, cancel: CancellationToken::new() })
    }

    pub fn with_system_probe(options: CollectorOptions) -> InventoryResult<Self> {
        Self::new(Arc::new(SystemProbe), options)
    }

    /// Cancelling this token stops outstanding scans; they report as degraded entries.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs one full inventory pass.
    ///
    /// Fails only when `volumes` is empty or malformed. Every other failure is
    /// logged and reported as a degraded entry, so the returned report always
    /// holds one usage and one inventory per volume, in configuration order.
    pub async fn run(&self, volumes: &[Volume]) -> InventoryResult<Report> {
        validate_volumes(volumes)?;

        let run_id = Uuid::new_v4();
        let mut phase = RunPhase::Idle;
        let started_at = Local::now();
        let clock = Instant::now();
        let sem = Arc::new(Semaphore::new(self.options.concurrency.max(1)));

        let folder_total: usize = volumes.iter().map(|v| v.folders.len()).sum();
        let expected = volumes.len() + folder_total;
        info!(%run_id, volumes = volumes.len(), folders = folder_total, concurrency = self.options.concurrency, "inventory started");

        let (tx, mut rx) = mpsc::channel::<UnitReport>(expected.max(1));
        let mut stats = RunStats::dispatched(expected);

        enter(run_id, &mut phase, RunPhase::Dispatching);
        for (vi, volume) in volumes.iter().enumerate() {
            self.dispatch_probe(vi, volume.path.clone(), &sem, &tx);
            for (fi, folder) in volume.folders.iter().enumerate() {
                self.dispatch_scan(vi, fi, volume.folder_path(folder), &sem, &tx);
            }
        }
        drop(tx);

        enter(run_id, &mut phase, RunPhase::Collecting);
        let mut usages: Vec<Option<VolumeUsage>> = vec![None; volumes.len()];
        let mut slots: Vec<Vec<Option<SizeEntry>>> =
            volumes.iter().map(|v| vec![None; v.folders.len()]).collect();
        let mut pending: Vec<usize> = volumes.iter().map(|v| v.folders.len()).collect();
        let mut sealed: Vec<Option<FolderInventory>> = vec![None; volumes.len()];

        for (vi, volume) in volumes.iter().enumerate() {
            if pending[vi] == 0 {
                sealed[vi] = Some(self.seal(volume, &mut slots[vi], &mut stats));
            }
        }

        let mut reported = 0usize;
        while reported < expected {
            let Some(report) = rx.recv().await else {
                break;
            };
            reported += 1;
            match report {
                UnitReport::Usage { volume, result } => {
                    stats.record_probe(&result);
                    usages[volume] = Some(self.usage_from(&volumes[volume], result));
                }
                UnitReport::Folder { volume, folder, result } => {
                    stats.record_scan(&result);
                    let v = &volumes[volume];
                    slots[volume][folder] = Some(self.entry_from(v, &v.folders[folder], result));
                    pending[volume] = pending[volume].saturating_sub(1);
                    if pending[volume] == 0 {
                        sealed[volume] = Some(self.seal(v, &mut slots[volume], &mut stats));
                    }
                }
            }
        }
        if reported < expected {
            warn!(%run_id, reported, expected, "some units exited without reporting");
        }

        let mut filled_usages = Vec::with_capacity(volumes.len());
        for (usage, volume) in usages.into_iter().zip(volumes) {
            let usage = match usage {
                Some(usage) => usage,
                None => {
                    stats.record_missing();
                    self.usage_from(volume, Err(InventoryError::Worker("probe exited without reporting".into())))
                }
            };
            filled_usages.push(usage);
        }
        let mut inventories = Vec::with_capacity(volumes.len());
        for (vi, inv) in sealed.into_iter().enumerate() {
            let inv = match inv {
                Some(inv) => inv,
                None => self.seal(&volumes[vi], &mut slots[vi], &mut stats),
            };
            inventories.push(inv);
        }

        enter(run_id, &mut phase, RunPhase::Complete);
        stats.elapsed_ms = clock.elapsed().as_millis() as u64;
        info!(
            %run_id,
            completed = stats.units_completed,
            failed = stats.units_failed,
            bytes = stats.bytes_scanned,
            warnings = stats.warnings_count,
            elapsed_ms = stats.elapsed_ms,
            "inventory finished"
        );

        Ok(Report {
            run_id,
            started_at,
            finished_at: Local::now(),
            elapsed_ms: stats.elapsed_ms,
            usages: filled_usages,
            inventories,
            stats,
        })
    }

    fn dispatch_probe(
        &self,
        volume: usize,
        path: PathBuf,
        sem: &Arc<Semaphore>,
        tx: &mpsc::Sender<UnitReport>,
    ) {
        let sem = sem.clone();
        let tx = tx.clone();
        let prober = self.probe.clone();
        let cancel = self.cancel.child_token();
        let deadline = self.options.unit_timeout;
        tokio::spawn(async move {
            let Ok(permit) = sem.acquire_owned().await else {
                return;
            };
            let probe_path = path.clone();
            let result = run_blocking(&path, deadline, &cancel, permit, move || {
                probe::probe(prober.as_ref(), &probe_path)
            })
            .await;
            let _ = tx.send(UnitReport::Usage { volume, result }).await;
        });
    }

    fn dispatch_scan(
        &self,
        volume: usize,
        folder: usize,
        path: PathBuf,
        sem: &Arc<Semaphore>,
        tx: &mpsc::Sender<UnitReport>,
    ) {
        let sem = sem.clone();
        let tx = tx.clone();
        let options = self.options.scan.clone();
        let excludes = self.excludes.clone();
        let cancel = self.cancel.child_token();
        let deadline = self.options.unit_timeout;
        tokio::spawn(async move {
            let Ok(permit) = sem.acquire_owned().await else {
                return;
            };
            let scan_path = path.clone();
            let scan_cancel = cancel.clone();
            let result = run_blocking(&path, deadline, &cancel, permit, move || {
                dir_size(&scan_path, &options, &excludes, &scan_cancel)
            })
            .await;
            let _ = tx.send(UnitReport::Folder { volume, folder, result }).await;
        });
    }

    fn usage_from(&self, volume: &Volume, result: InventoryResult<(Capacity, f64)>) -> VolumeUsage {
        let display_name = volume.display_name();
        match result {
            Ok((capacity, pct)) => {
                let status = classify(pct, self.options.percent_threshold);
                let message = match status {
                    UsageStatus::OverThreshold => self.options.message_over_threshold.clone(),
                    _ => self.options.message_normal.clone(),
                };
                debug!(volume = %display_name, percent = pct, status = status.label(), "volume probed");
                VolumeUsage {
                    path: volume.path.clone(),
                    display_name,
                    capacity: Some(capacity),
                    percent_used: Some(pct),
                    status,
                    message,
                }
            }
            Err(err) => {
                warn!(volume = %volume.path.display(), code = err.code(), error = %err, "capacity probe failed");
                let reason = err.to_string();
                VolumeUsage {
                    path: volume.path.clone(),
                    display_name,
                    capacity: None,
                    percent_used: None,
                    status: UsageStatus::Error(reason.clone()),
                    message: reason,
                }
            }
        }
    }

    fn entry_from(&self, volume: &Volume, folder: &str, result: InventoryResult<ScanOutcome>) -> SizeEntry {
        let path = volume.folder_path(folder);
        let key = path.to_string_lossy().to_string();
        match result {
            Ok(outcome) => {
                let mut entry = SizeEntry::measured(folder, key, outcome.total_bytes);
                entry.children = outcome
                    .children
                    .into_iter()
                    .map(|child| {
                        let key = child_key(&path, &child.name);
                        let mut entry = SizeEntry::measured(child.name, key, child.bytes);
                        if child.warnings > 0 {
                            entry.error = Some(format!("{} unreadable entries skipped", child.warnings));
                        }
                        entry
                    })
                    .collect();
                entry
            }
            Err(err) => {
                warn!(folder = %path.display(), code = err.code(), error = %err, "folder scan failed");
                SizeEntry::degraded(folder, key, err.to_string())
            }
        }
    }

    /// Ranks a volume's folder entries. Slots that never reported become degraded entries.
    fn seal(&self, volume: &Volume, slots: &mut [Option<SizeEntry>], stats: &mut RunStats) -> FolderInventory {
        let entries: Vec<SizeEntry> = slots
            .iter_mut()
            .zip(&volume.folders)
            .map(|(slot, folder)| {
                slot.take().unwrap_or_else(|| {
                    let key = volume.folder_path(folder).to_string_lossy().to_string();
                    warn!(folder = %key, "folder scan exited without reporting");
                    stats.record_missing();
                    SizeEntry::degraded(folder.as_str(), key, "scan exited without reporting")
                })
            })
            .collect();
        let inventory = FolderInventory { folder_root: volume.display_name(), entries: rank(entries, self.options.sort) };
        debug!(volume = %inventory.folder_root, folders = inventory.entries.len(), "volume sealed");
        inventory
    }
}

/// Runs `work` on the blocking pool, bounded by `deadline`.
///
/// On timeout `cancel` fires so the worker stops at its next check. The
/// permit moves onto the blocking thread and is released only when `work`
/// returns, so a timed-out unit keeps its slot until its thread is free.
async fn run_blocking<T, F>(
    path: &Path,
    deadline: Option<Duration>,
    cancel: &CancellationToken,
    permit: OwnedSemaphorePermit,
    work: F,
) -> InventoryResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> InventoryResult<T> + Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(InventoryError::Cancelled);
    }
    let handle = task::spawn_blocking(move || {
        let _permit = permit;
        work()
    });
    let joined = match deadline {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                cancel.cancel();
                return Err(InventoryError::TimedOut {
                    path: path.to_path_buf(),
                    timeout_ms: limit.as_millis() as u64,
                });
            }
        },
        None => handle.await,
    };
    joined.map_err(|e| InventoryError::Worker(e.to_string()))?
}

fn validate_volumes(volumes: &[Volume]) -> InventoryResult<()> {
    if volumes.is_empty() {
        return Err(InventoryError::Configuration("no volumes configured".into()));
    }
    for (i, volume) in volumes.iter().enumerate() {
        if volume.path.as_os_str().is_empty() {
            return Err(InventoryError::Configuration(format!("volume #{} has an empty path", i + 1)));
        }
        for folder in &volume.folders {
            if folder.trim().is_empty() {
                return Err(InventoryError::Configuration(format!(
                    "volume {} has an empty folder name",
                    volume.path.display()
                )));
            }
            if Path::new(folder).is_absolute() {
                return Err(InventoryError::Configuration(format!(
                    "folder {} of volume {} must be relative",
                    folder,
                    volume.path.display()
                )));
            }
        }
    }
    Ok(())
}
