#[cfg(test)]
mod tests {
    use crate::collector::{CollectorOptions, InventoryCollector};
    use crate::error::{InventoryError, InventoryResult};
    use crate::probe::CapacityProbe;
    use crate::ranking::SortDirection;
    use crate::tests::{write_file, FakeProbe};
    use crate::types::{Capacity, RankedEntries, SizeEntry, UsageStatus, Volume};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn options() -> CollectorOptions {
        CollectorOptions { concurrency: 4, ..CollectorOptions::default() }
    }

    fn collector(probe: FakeProbe, options: CollectorOptions) -> InventoryCollector {
        InventoryCollector::new(Arc::new(probe), options).unwrap()
    }

    fn folders(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn find<'a>(entries: &'a RankedEntries, name: &str) -> &'a SizeEntry {
        entries.iter().find(|e| e.name == name).unwrap()
    }

    /// Sleeps in every call and records how many calls overlapped.
    #[derive(Default)]
    struct SlowProbe {
        live: AtomicUsize,
        peak: AtomicUsize,
    }

    impl CapacityProbe for SlowProbe {
        fn capacity(&self, _path: &Path) -> InventoryResult<Capacity> {
            let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            self.live.fetch_sub(1, Ordering::SeqCst);
            Ok(Capacity { total: 1000, free: 500, available: 500 })
        }
    }

    #[tokio::test]
    async fn test_unreadable_folder_is_degraded_not_dropped() {
        let vol = TempDir::new().unwrap();
        write_file(&vol.path().join("x/data.bin"), 100);
        // "y" does not exist, so its root cannot be opened.
        let volumes = vec![Volume::new(vol.path(), folders(&["x", "y"]))];

        let report = collector(FakeProbe::new(1000, 500), options()).run(&volumes).await.unwrap();

        assert_eq!(report.inventories.len(), 1);
        let inv = &report.inventories[0];
        assert_eq!(inv.folder_root, vol.path().to_string_lossy());
        assert_eq!(inv.entries.len(), 2);
        let x = find(&inv.entries, "x");
        assert_eq!(x.bytes, 100);
        assert!(x.error.is_none());
        let y = find(&inv.entries, "y");
        assert_eq!(y.bytes, 0);
        assert!(y.is_degraded());
        assert!(y.error.as_deref().unwrap().contains("cannot open scan root"));
        assert_eq!(report.stats.units_failed, 1);
        assert_eq!(report.degraded_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_volume_list_is_configuration_error() {
        let c = collector(FakeProbe::new(1000, 500), options());
        let err = c.run(&[]).await.unwrap_err();
        assert!(matches!(err, InventoryError::Configuration(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_malformed_volume_rejected_before_dispatch() {
        let probe = Arc::new(FakeProbe::new(1000, 500));
        let c = InventoryCollector::new(probe.clone(), options()).unwrap();
        let err = c.run(&[Volume::new("/data", folders(&["/etc"]))]).await.unwrap_err();
        assert!(matches!(err, InventoryError::Configuration(_)));
        let err = c.run(&[Volume::new("", Vec::new())]).await.unwrap_err();
        assert!(matches!(err, InventoryError::Configuration(_)));
        assert!(probe.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_usage_status_against_threshold() {
        let vol = TempDir::new().unwrap();
        let volumes = vec![Volume::new(vol.path(), Vec::new()).with_label("data")];

        let over = collector(FakeProbe::new(1000, 175), options()).run(&volumes).await.unwrap();
        let usage = &over.usages[0];
        assert_eq!(usage.display_name, "data");
        assert_eq!(usage.percent_used, Some(82.5));
        assert_eq!(usage.status, UsageStatus::OverThreshold);
        assert_eq!(usage.message, CollectorOptions::default().message_over_threshold);

        let normal = collector(FakeProbe::new(10_000, 2_001), options()).run(&volumes).await.unwrap();
        assert_eq!(normal.usages[0].percent_used, Some(79.99));
        assert_eq!(normal.usages[0].status, UsageStatus::Normal);
    }

    #[tokio::test]
    async fn test_probe_failure_degrades_usage_only() {
        let ok = TempDir::new().unwrap();
        let bad = TempDir::new().unwrap();
        write_file(&bad.path().join("f/file.bin"), 10);
        let mut probe = FakeProbe::new(1000, 250);
        probe.fail_for.push(bad.path().to_string_lossy().to_string());
        let volumes = vec![
            Volume::new(ok.path(), Vec::new()),
            Volume::new(bad.path(), folders(&["f"])),
        ];

        let report = collector(probe, options()).run(&volumes).await.unwrap();
        assert_eq!(report.usages.len(), 2);
        assert_eq!(report.usages[0].percent_used, Some(75.0));
        assert!(matches!(report.usages[1].status, UsageStatus::Error(_)));
        assert!(report.usages[1].percent_used.is_none());
        // The folder scan on the failing volume still ran.
        assert_eq!(find(&report.inventories[1].entries, "f").bytes, 10);
    }

    #[tokio::test]
    async fn test_results_keep_configuration_order_and_rank() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write_file(&a.path().join("small/f"), 10);
        write_file(&a.path().join("large/f"), 1000);
        write_file(&a.path().join("medium/f"), 100);
        write_file(&b.path().join("only/f"), 1);
        let volumes = vec![
            Volume::new(a.path(), folders(&["small", "large", "medium"])),
            Volume::new(b.path(), folders(&["only"])),
        ];

        let report = collector(FakeProbe::new(1000, 500), options()).run(&volumes).await.unwrap();
        assert_eq!(report.usages[0].path, a.path());
        assert_eq!(report.usages[1].path, b.path());
        let names: Vec<&str> = report.inventories[0].entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["large", "medium", "small"]);
        assert_eq!(report.inventories[0].entries.direction, SortDirection::Desc);
        assert_eq!(report.inventories[1].entries.len(), 1);
        assert_eq!(report.stats.units_dispatched, 6);
        assert_eq!(report.stats.units_completed, 6);
        assert_eq!(report.stats.bytes_scanned, 1111);
    }

    #[tokio::test]
    async fn test_ascending_and_child_breakdown() {
        let vol = TempDir::new().unwrap();
        write_file(&vol.path().join("projects/big/f"), 300);
        write_file(&vol.path().join("projects/tiny/f"), 3);
        write_file(&vol.path().join("projects/loose.txt"), 5);
        write_file(&vol.path().join("backups/f"), 1);
        let volumes = vec![Volume::new(vol.path(), folders(&["projects", "backups"]))];
        let opts = CollectorOptions { sort: SortDirection::Asc, ..options() };

        let report = collector(FakeProbe::new(1000, 500), opts).run(&volumes).await.unwrap();
        let inv = &report.inventories[0];
        let names: Vec<&str> = inv.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["backups", "projects"]);
        let projects = find(&inv.entries, "projects");
        assert_eq!(projects.bytes, 308);
        assert_eq!(projects.size, "308 B");
        let children: Vec<(&str, u64)> = projects.children.iter().map(|c| (c.name.as_str(), c.bytes)).collect();
        assert_eq!(children, vec![("tiny", 3), ("big", 300)]);
        assert!(projects.children[1].key.ends_with("big"));
    }

    #[tokio::test]
    async fn test_repeated_runs_are_identical() {
        let vol = TempDir::new().unwrap();
        for name in ["a", "b", "c", "d"] {
            write_file(&vol.path().join(format!("top/{name}/f")), 64);
        }
        write_file(&vol.path().join("other/f"), 64);
        let volumes = vec![Volume::new(vol.path(), folders(&["top", "other", "missing"]))];
        let c = collector(FakeProbe::new(1000, 500), options());

        let first = c.run(&volumes).await.unwrap();
        let second = c.run(&volumes).await.unwrap();
        assert_eq!(first.inventories, second.inventories);
        assert_ne!(first.run_id, second.run_id);
    }

    #[tokio::test]
    async fn test_single_worker_still_completes() {
        let vol = TempDir::new().unwrap();
        let names: Vec<String> = (0..20).map(|i| format!("d{i:02}")).collect();
        for (i, n) in names.iter().enumerate() {
            write_file(&vol.path().join(n).join("f"), i + 1);
        }
        let volumes = vec![Volume::new(vol.path(), names.clone())];
        let opts = CollectorOptions { concurrency: 1, ..options() };

        let report = collector(FakeProbe::new(1000, 500), opts).run(&volumes).await.unwrap();
        assert_eq!(report.inventories[0].entries.len(), 20);
        assert_eq!(report.inventories[0].entries.entries[0].name, "d19");
        let total: u64 = report.inventories[0].entries.iter().map(|e| e.bytes).sum();
        assert_eq!(total, (1..=20).sum::<u64>());
    }

    #[tokio::test]
    async fn test_slow_probe_times_out() {
        let vol = TempDir::new().unwrap();
        write_file(&vol.path().join("f/file"), 42);
        let mut probe = FakeProbe::new(1000, 500);
        probe.delay = Some(Duration::from_millis(500));
        let opts = CollectorOptions { unit_timeout: Some(Duration::from_millis(50)), ..options() };
        let volumes = vec![Volume::new(vol.path(), folders(&["f"]))];

        let report = collector(probe, opts).run(&volumes).await.unwrap();
        match &report.usages[0].status {
            UsageStatus::Error(reason) => assert!(reason.contains("did not finish within 50 ms")),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(find(&report.inventories[0].entries, "f").bytes, 42);
    }

    #[tokio::test]
    async fn test_cancelled_run_still_reports_every_folder() {
        let vol = TempDir::new().unwrap();
        write_file(&vol.path().join("a/f"), 1);
        write_file(&vol.path().join("b/f"), 1);
        let c = collector(FakeProbe::new(1000, 500), options());
        c.cancellation_token().cancel();

        let report = c.run(&[Volume::new(vol.path(), folders(&["a", "b"]))]).await.unwrap();
        let inv = &report.inventories[0];
        assert_eq!(inv.entries.len(), 2);
        assert!(inv.entries.iter().all(|e| e.is_degraded()));
        assert!(matches!(report.usages[0].status, UsageStatus::Error(_)));
    }

    #[tokio::test]
    async fn test_timed_out_units_keep_their_slot() {
        let dirs: Vec<TempDir> = (0..6).map(|_| TempDir::new().unwrap()).collect();
        let volumes: Vec<Volume> = dirs.iter().map(|d| Volume::new(d.path(), Vec::new())).collect();
        let probe = Arc::new(SlowProbe::default());
        let opts = CollectorOptions { concurrency: 1, unit_timeout: Some(Duration::from_millis(20)), ..options() };

        let report = InventoryCollector::new(probe.clone(), opts).unwrap().run(&volumes).await.unwrap();
        assert_eq!(probe.peak.load(Ordering::SeqCst), 1);
        assert_eq!(report.usages.len(), 6);
        for usage in &report.usages {
            match &usage.status {
                UsageStatus::Error(reason) => assert!(reason.contains("did not finish within")),
                other => panic!("expected timeout, got {other:?}"),
            }
        }
        assert_eq!(report.stats.units_failed, 6);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_link_flags_child_and_keeps_size() {
        let vol = TempDir::new().unwrap();
        write_file(&vol.path().join("x/sub/data.bin"), 100);
        std::os::unix::fs::symlink(vol.path().join("x/sub/gone"), vol.path().join("x/sub/broken")).unwrap();
        let volumes = vec![Volume::new(vol.path(), folders(&["x", "y"]))];
        let mut opts = options();
        opts.scan.follow_symlinks = true;

        let report = collector(FakeProbe::new(1000, 500), opts).run(&volumes).await.unwrap();
        let inv = &report.inventories[0];
        assert_eq!(inv.entries.len(), 2);

        let x = find(&inv.entries, "x");
        assert_eq!(x.bytes, 100);
        assert!(x.error.is_none());
        assert_eq!(x.children.len(), 1);
        assert_eq!(x.children[0].bytes, 100);
        assert_eq!(x.children[0].error.as_deref(), Some("1 unreadable entries skipped"));

        let y = find(&inv.entries, "y");
        assert_eq!(y.bytes, 0);
        assert!(y.is_degraded());

        assert_eq!(report.stats.warnings_count, 1);
        assert_eq!(report.stats.units_failed, 1);
        assert_eq!(report.stats.units_completed, 2);
    }
}
