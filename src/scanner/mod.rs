use std::{
    fs,
    path::{Path, PathBuf},
};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::error::{InventoryError, InventoryResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    pub follow_symlinks: bool,
    pub excludes: Vec<String>,
    /// Also total each immediate subdirectory of the scanned folder.
    pub breakdown: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self { follow_symlinks: false, excludes: vec![], breakdown: true }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub total_bytes: u64,
    pub files: u64,
    pub dirs: u64,
    /// Entries below the root that could not be read.
    pub warnings: u64,
    /// Immediate subdirectories with their totals, in discovery (file name) order.
    pub children: Vec<ChildSize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSize {
    pub name: String,
    pub bytes: u64,
    /// Unreadable entries inside this subdirectory.
    pub warnings: u64,
}

impl ChildSize {
    pub fn new(name: impl Into<String>, bytes: u64) -> Self {
        Self { name: name.into(), bytes, warnings: 0 }
    }
}

/// Sums the sizes of all regular files below `root`.
///
/// Fails only when `root` itself cannot be listed. Anything unreadable below
/// it is logged, counted in `warnings` and contributes nothing.
pub fn dir_size(
    root: &Path,
    options: &ScanOptions,
    excludes: &GlobSet,
    cancel: &CancellationToken,
) -> InventoryResult<ScanOutcome> {
    fs::read_dir(root).map_err(|source| InventoryError::ScanRoot { path: root.to_path_buf(), source })?;

    let mut outcome = ScanOutcome::default();
    // Index into `children` of the depth-1 directory currently being walked.
    let mut current_child: Option<usize> = None;

    let mut it = WalkDir::new(root)
        .follow_links(options.follow_symlinks)
        .sort_by_file_name()
        .min_depth(1)
        .into_iter();

    while let Some(next) = it.next() {
        if cancel.is_cancelled() {
            return Err(InventoryError::Cancelled);
        }
        let entry = match next {
            Ok(e) => e,
            Err(e) => {
                let failed = e.path().map(Path::to_path_buf);
                record_leaf(&mut outcome, root, current_child, failed.as_deref(), InventoryError::from(e));
                continue;
            }
        };

        let depth = entry.depth();
        let path = entry.path();
        if matches_excludes(path, excludes) {
            if entry.file_type().is_dir() {
                it.skip_current_dir();
            }
            if depth == 1 {
                current_child = None;
            }
            continue;
        }

        if entry.file_type().is_dir() {
            outcome.dirs += 1;
            if depth == 1 {
                if options.breakdown {
                    outcome.children.push(ChildSize::new(entry.file_name().to_string_lossy(), 0));
                    current_child = Some(outcome.children.len() - 1);
                } else {
                    current_child = None;
                }
            }
            continue;
        }

        if depth == 1 {
            current_child = None;
        }
        let md = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                record_leaf(&mut outcome, root, current_child, Some(path), InventoryError::from(e));
                continue;
            }
        };
        if !md.is_file() {
            continue;
        }
        let len = md.len();
        outcome.files += 1;
        outcome.total_bytes = outcome.total_bytes.saturating_add(len);
        if depth > 1 {
            if let Some(idx) = current_child {
                let child = &mut outcome.children[idx];
                child.bytes = child.bytes.saturating_add(len);
            }
        }
    }

    tracing::debug!(
        root = %root.display(),
        bytes = outcome.total_bytes,
        files = outcome.files,
        dirs = outcome.dirs,
        warnings = outcome.warnings,
        "folder scanned"
    );
    Ok(outcome)
}

/// Counts an absorbed leaf failure, charging it to the child it sits under.
fn record_leaf(
    outcome: &mut ScanOutcome,
    root: &Path,
    current_child: Option<usize>,
    failed: Option<&Path>,
    err: InventoryError,
) {
    outcome.warnings += 1;
    tracing::warn!(root = %root.display(), code = err.code(), error = %err, "skipping unreadable entry");

    let top = failed
        .and_then(|p| p.strip_prefix(root).ok())
        .and_then(|rel| rel.components().next())
        .map(|c| c.as_os_str().to_string_lossy().to_string());
    if let (Some(idx), Some(top)) = (current_child, top) {
        let child = &mut outcome.children[idx];
        if child.name == top {
            child.warnings += 1;
        }
    }
}

pub fn build_globset(patterns: &[String]) -> InventoryResult<GlobSet> {
    let mut b = GlobSetBuilder::new();
    for p in patterns {
        if p.trim().is_empty() {
            continue;
        }
        // Backslashes are normalised to match the path form used in `matches_excludes`.
        let norm = p.trim().replace('\\', "/");
        let g = Glob::new(&norm)?;
        b.add(g);
    }
    Ok(b.build()?)
}

fn matches_excludes(path: &Path, set: &GlobSet) -> bool {
    if set.is_empty() {
        return false;
    }
    let s = path.to_string_lossy().replace('\\', "/");
    set.is_match(&s)
}

/// `root` joined with a child name, as a display string.
pub fn child_key(root: &Path, name: &str) -> String {
    let p: PathBuf = root.join(name);
    p.to_string_lossy().to_string()
}
