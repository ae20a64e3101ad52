//! Volume capacity probing.
//!
//! [`CapacityProbe`] hides the platform query so the collector can be driven
//! by a fake in tests. [`SystemProbe`] uses `statvfs` on unix and
//! `GetDiskFreeSpaceExW` on Windows, and only accepts mount roots.

use std::fs;
use std::path::Path;

use crate::error::{InventoryError, InventoryResult};
use crate::types::{Capacity, UsageStatus};

/// Reports total/free/available bytes of the filesystem containing a path.
pub trait CapacityProbe: Send + Sync {
    fn capacity(&self, path: &Path) -> InventoryResult<Capacity>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl CapacityProbe for SystemProbe {
    fn capacity(&self, path: &Path) -> InventoryResult<Capacity> {
        match fs::metadata(path) {
            Ok(md) if md.is_dir() => {}
            Ok(_) => {
                return Err(InventoryError::Probe {
                    path: path.to_path_buf(),
                    reason: "not a directory".into(),
                })
            }
            Err(e) => {
                return Err(InventoryError::Probe {
                    path: path.to_path_buf(),
                    reason: format!("{}: {}", e.kind(), e),
                })
            }
        }
        if !is_mount_root(path)? {
            return Err(InventoryError::Probe { path: path.to_path_buf(), reason: "not a mount point".into() });
        }
        platform_capacity(path)
    }
}

/// A directory is a mount root when it sits on a different device than its parent.
#[cfg(unix)]
fn is_mount_root(path: &Path) -> InventoryResult<bool> {
    use std::os::unix::fs::MetadataExt;

    let io_err = |e: std::io::Error| InventoryError::Probe { path: path.to_path_buf(), reason: e.to_string() };
    let canonical = fs::canonicalize(path).map_err(io_err)?;
    let Some(parent) = canonical.parent() else {
        return Ok(true);
    };
    let dev = fs::metadata(&canonical).map_err(io_err)?.dev();
    let parent_dev = fs::metadata(parent).map_err(io_err)?.dev();
    Ok(dev != parent_dev)
}

/// A directory is a mount root when it is its own volume path.
#[cfg(windows)]
#[allow(unsafe_code)]
fn is_mount_root(path: &Path) -> InventoryResult<bool> {
    use std::os::windows::ffi::OsStrExt;
    use windows::core::PCWSTR;
    use windows::Win32::Storage::FileSystem::GetVolumePathNameW;

    let w: Vec<u16> = path.as_os_str().encode_wide().chain(std::iter::once(0)).collect();
    let mut buf = [0u16; 261];
    let res = unsafe { GetVolumePathNameW(PCWSTR(w.as_ptr()), &mut buf) };
    res.map_err(|e| InventoryError::Probe {
        path: path.to_path_buf(),
        reason: format!("GetVolumePathNameW failed: {}", e),
    })?;
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    let volume = String::from_utf16_lossy(&buf[..len]);
    let given = path.to_string_lossy();
    Ok(volume.trim_end_matches('\\').eq_ignore_ascii_case(given.trim_end_matches(['\\', '/'])))
}

#[cfg(not(any(unix, windows)))]
fn is_mount_root(_path: &Path) -> InventoryResult<bool> {
    Ok(true)
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn platform_capacity(path: &Path) -> InventoryResult<Capacity> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| InventoryError::Probe {
        path: path.to_path_buf(),
        reason: "path contains a NUL byte".into(),
    })?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if ret != 0 {
        return Err(InventoryError::Probe {
            path: path.to_path_buf(),
            reason: format!("statvfs failed: {}", std::io::Error::last_os_error()),
        });
    }

    let block_size = stat.f_frsize as u64;
    Ok(Capacity {
        total: (stat.f_blocks as u64).saturating_mul(block_size),
        free: (stat.f_bfree as u64).saturating_mul(block_size),
        available: (stat.f_bavail as u64).saturating_mul(block_size),
    })
}

#[cfg(windows)]
fn platform_capacity(path: &Path) -> InventoryResult<Capacity> {
    use std::os::windows::ffi::OsStrExt;
    use windows::core::PCWSTR;
    use windows::Win32::Storage::FileSystem::GetDiskFreeSpaceExW;

    let w: Vec<u16> = path.as_os_str().encode_wide().chain(std::iter::once(0)).collect();
    let mut available: u64 = 0;
    let mut total: u64 = 0;
    let mut free: u64 = 0;
    let res = unsafe {
        GetDiskFreeSpaceExW(PCWSTR(w.as_ptr()), Some(&mut available), Some(&mut total), Some(&mut free))
    };
    res.map_err(|e| InventoryError::Probe {
        path: path.to_path_buf(),
        reason: format!("GetDiskFreeSpaceExW failed: {}", e),
    })?;
    Ok(Capacity { total, free, available })
}

#[cfg(not(any(unix, windows)))]
fn platform_capacity(path: &Path) -> InventoryResult<Capacity> {
    Err(InventoryError::Probe {
        path: path.to_path_buf(),
        reason: "capacity queries are not supported on this platform".into(),
    })
}

/// `(total - free) / total * 100`, rounded to two decimals.
pub fn percent_used(capacity: &Capacity) -> Option<f64> {
    if capacity.total == 0 {
        return None;
    }
    let pct = capacity.used() as f64 / capacity.total as f64 * 100.0;
    Some((pct * 100.0).round() / 100.0)
}

/// Probes `path` and derives its percent used.
pub fn probe(prober: &dyn CapacityProbe, path: &Path) -> InventoryResult<(Capacity, f64)> {
    let capacity = prober.capacity(path)?;
    let pct = percent_used(&capacity).ok_or_else(|| InventoryError::Probe {
        path: path.to_path_buf(),
        reason: "filesystem reports zero capacity".into(),
    })?;
    Ok((capacity, pct))
}

/// Over-threshold when `percent_used >= threshold`.
pub fn classify(percent_used: f64, threshold: u8) -> UsageStatus {
    if percent_used >= threshold as f64 {
        UsageStatus::OverThreshold
    } else {
        UsageStatus::Normal
    }
}
