//! Performance benchmarks for hookhost.
//!
//! This module contains benchmarks for:
//! - Plugin folder scanning
//! - Capability lookups with and without sorting overrides
//! - Merged settings reads across overlays
//!
//! Run with: `cargo bench`

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hookhost::plugin::{
    scan_folder, Capability, CapabilityTable, EntryPoint, ManagerOptions, Plugin, PluginFolder,
    PluginManager, PluginManifest,
};
use hookhost::settings::{plugin_settings, MemorySettings, SettingsStore};
use serde_json::json;

trait Probe: Send + Sync {
    fn probe(&self) -> usize;
}

impl Capability for dyn Probe {
    const NAME: &'static str = "probe";
}

struct Fixture(usize);

impl Probe for Fixture {
    fn probe(&self) -> usize {
        self.0
    }
}

impl Plugin for Fixture {
    fn implements(self: Arc<Self>, table: &mut CapabilityTable) {
        table.provide::<dyn Probe>(self);
    }
}

fn manager_with(count: usize) -> PluginManager {
    let mut options = ManagerOptions::default();
    for i in 0..count {
        let manifest = PluginManifest::new(format!("plugin_{i:04}"));
        options = options.with_entry_point(EntryPoint::from_instance(manifest, Arc::new(Fixture(i))));
        if i % 10 == 0 {
            options = options.with_sorting_order(format!("plugin_{i:04}"), "bench", -(i as i64));
        }
    }
    let manager = PluginManager::new(options);
    manager.initialize().expect("Failed to initialize manager");
    manager
}

// ============================================================================
// Discovery Benchmarks
// ============================================================================

fn bench_scan_folder(c: &mut Criterion) {
    let mut group = c.benchmark_group("discovery/scan");

    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");

    for count in [10, 100].iter() {
        let root = temp_dir.path().join(format!("plugins_{count}"));
        for i in 0..*count {
            let dir = root.join(format!("plugin_{i}"));
            std::fs::create_dir_all(&dir).expect("Failed to create plugin dir");
            std::fs::write(
                dir.join("plugin.toml"),
                format!("[plugin]\nidentifier = \"plugin_{i}\"\nversion = \"1.0.0\"\nhooks = [\"host.ui.tabs\"]\n"),
            )
            .expect("Failed to write manifest");
        }

        let folder = PluginFolder::new(&root);
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("scan_folder", count), count, |b, _| {
            b.iter(|| black_box(scan_folder(black_box(&folder))));
        });
    }

    group.finish();
}

// ============================================================================
// Dispatch Benchmarks
// ============================================================================

fn bench_implementations(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/implementations");

    for count in [10, 100, 500].iter() {
        let manager = manager_with(*count);
        group.throughput(Throughput::Elements(*count as u64));

        group.bench_with_input(BenchmarkId::new("unsorted", count), count, |b, _| {
            b.iter(|| black_box(manager.implementations::<dyn Probe>(None)));
        });
        group.bench_with_input(BenchmarkId::new("with_context", count), count, |b, _| {
            b.iter(|| black_box(manager.implementations::<dyn Probe>(Some("bench"))));
        });
    }

    group.finish();
}

fn bench_call_plugin(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/call");
    let manager = manager_with(100);

    group.bench_function("call_100_plugins", |b| {
        b.iter(|| {
            let mut total = 0;
            manager
                .call_plugin::<dyn Probe, _, _>("probe", |plugin| Ok(plugin.probe()))
                .on_success(|_, _, value| {
                    total += value;
                    Ok(())
                })
                .run()
                .expect("Dispatch failed");
            black_box(total)
        });
    });

    group.finish();
}

// ============================================================================
// Settings Benchmarks
// ============================================================================

fn bench_settings_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("settings/get");

    let store: Arc<dyn SettingsStore> = Arc::new(MemorySettings::new());
    let settings = plugin_settings("bench", store).with_defaults(json!({
        "fps": 25,
        "render": { "enabled": true, "format": "mp4", "threads": 4 },
    }));
    settings.set(&["render", "threads"], 8).expect("Failed to set");

    for overlays in [0, 5, 20].iter() {
        let keys: Vec<String> = (0..*overlays)
            .map(|i| settings.add_overlay(json!({ "fps": i })).expect("Failed to add overlay"))
            .collect();

        group.bench_with_input(BenchmarkId::new("leaf", overlays), overlays, |b, _| {
            b.iter(|| black_box(settings.get_int(black_box(&["fps"]))));
        });
        group.bench_with_input(BenchmarkId::new("merged_subtree", overlays), overlays, |b, _| {
            b.iter(|| black_box(settings.get_all_data()));
        });

        for key in &keys {
            settings.remove_overlay(key);
        }
    }

    group.finish();
}

// ============================================================================
// Criterion Groups and Main
// ============================================================================

criterion_group!(discovery_benches, bench_scan_folder,);

criterion_group!(dispatch_benches, bench_implementations, bench_call_plugin,);

criterion_group!(settings_benches, bench_settings_reads,);

criterion_main!(discovery_benches, dispatch_benches, settings_benches,);
