use std::path::Path;
use std::sync::Arc;

use image::{Rgb, RgbImage};
use tempfile::TempDir;
use vitrine_core::cache::GallerySnapshot;
use vitrine_core::scan::InMemoryFs;
use vitrine_core::thumbs::{ThumbnailBackend, ThumbnailStore};
use vitrine_core::{GalleryConfig, GalleryService, ProgressEvent, ProgressSubscription, ThumbnailKey, ThumbnailVariant};

fn write_image(path: &Path, w: u32, h: u32) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_fn(w, h, |x, y| Rgb([(x % 255) as u8, (y % 255) as u8, 90]))
        .save(path)
        .unwrap();
}

/// Three images and one video directly under the root.
fn sample_root() -> TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write_image(&root.join("alpha.png"), 640, 480);
    write_image(&root.join("beta.jpg"), 200, 900);
    write_image(&root.join("gamma.png"), 32, 32);
    std::fs::write(root.join("clip.mp4"), b"\x00\x00\x00\x18ftypmp42").unwrap();
    tmp
}

fn fast_config() -> GalleryConfig {
    let mut config = GalleryConfig::default();
    config.scheduler.delay_ms = 5;
    config.scheduler.large_delay_ms = 5;
    config
}

fn drain(sub: &mut ProgressSubscription) -> Vec<ProgressEvent> {
    std::iter::from_fn(|| sub.try_recv()).collect()
}

fn names(snapshot: &GallerySnapshot, dir: &str) -> Vec<String> {
    snapshot.by_directory[dir]
        .iter()
        .map(|e| e.descriptor.name.clone())
        .collect()
}

#[tokio::test]
async fn fresh_root_generates_every_thumbnail() {
    let tmp = sample_root();
    let service = GalleryService::new(tmp.path(), fast_config());
    let mut events = service.subscribe_progress();

    let snapshot = service.get_snapshot().await;
    assert_eq!(snapshot.total_count, 4);
    assert_eq!(snapshot.by_directory.len(), 1);
    assert_eq!(
        names(&snapshot, "."),
        vec!["alpha.png", "beta.jpg", "clip.mp4", "gamma.png"]
    );
    assert_eq!(snapshot.ready_count(), 0);

    service.wait_idle().await;
    let events = drain(&mut events);

    let ready: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::ThumbnailReady { relative_path, .. } => Some(relative_path.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(ready.len(), 4);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, ProgressEvent::TinyPreviewReady { .. })),
        "background jobs skip the tiny phase"
    );

    let last_progress = events
        .iter()
        .rev()
        .find(|e| matches!(e, ProgressEvent::GlobalProgress { .. }))
        .unwrap();
    assert_eq!(
        last_progress,
        &ProgressEvent::GlobalProgress {
            total: 4,
            completed: 4,
            current_file: None,
            progress: 100,
            is_generating: false,
        }
    );
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::GenerationFinished {
            total: 4,
            succeeded: 4,
            failed: 0
        })
    );

    // The cached snapshot picked up the ready flags.
    assert_eq!(service.get_snapshot().await.ready_count(), 4);
    assert_eq!(service.rebuild_count(), 1);

    let thumbs = tmp.path().join(".vitrine-cache/thumbnails");
    for name in ["alpha.png", "beta.jpg", "clip.mp4", "gamma.png"] {
        let key = ThumbnailKey::for_relative_path(name);
        assert!(thumbs.join(key.file_name(ThumbnailVariant::Full)).is_file());
        assert!(!thumbs.join(key.file_name(ThumbnailVariant::Tiny)).exists());
    }
}

#[tokio::test]
async fn repeated_snapshots_within_the_window_do_not_rescan() {
    let tmp = sample_root();
    let service = GalleryService::new(tmp.path(), fast_config());
    service.get_snapshot().await;
    service.wait_idle().await;

    let first = service.get_snapshot().await;
    let second = service.get_snapshot().await;
    assert_eq!(first, second);
    assert_eq!(service.rebuild_count(), 1);

    // A second service over the same root finds everything cached.
    let again = GalleryService::new(tmp.path(), fast_config());
    let snapshot = again.get_snapshot().await;
    assert_eq!(snapshot.ready_count(), 4);
    assert_eq!(again.status().await.total_jobs, 0);
}

#[tokio::test]
async fn concurrent_callers_share_one_rebuild() {
    let tmp = sample_root();
    let service = Arc::new(GalleryService::new(tmp.path(), fast_config()));
    let (a, b, c) = tokio::join!(
        service.get_snapshot(),
        service.get_snapshot(),
        service.get_snapshot()
    );
    assert_eq!(service.rebuild_count(), 1);
    assert_eq!(a.total_count, 4);
    assert_eq!(a.captured_at, b.captured_at);
    assert_eq!(b.captured_at, c.captured_at);
    service.shutdown().await;
}

#[tokio::test]
async fn invalidation_is_lazy_and_announced() {
    let tmp = sample_root();
    let service = GalleryService::new(tmp.path(), fast_config());
    service.get_snapshot().await;
    service.wait_idle().await;
    let mut events = service.subscribe_progress();

    write_image(&tmp.path().join("later/delta.png"), 50, 50);
    service.invalidate("test change");
    assert_eq!(service.rebuild_count(), 1);
    assert_eq!(
        drain(&mut events),
        vec![ProgressEvent::CacheInvalidated {
            reason: "test change".into()
        }]
    );

    let snapshot = service.get_snapshot().await;
    assert_eq!(service.rebuild_count(), 2);
    assert_eq!(snapshot.total_count, 5);
    assert_eq!(names(&snapshot, "later"), vec!["delta.png"]);
    service.wait_idle().await;

    let finished: Vec<_> = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, ProgressEvent::GenerationFinished { .. }))
        .collect();
    assert_eq!(
        finished,
        vec![ProgressEvent::GenerationFinished {
            total: 1,
            succeeded: 1,
            failed: 0
        }]
    );

    let rescanned = service.force_rescan().await;
    assert_eq!(service.rebuild_count(), 3);
    assert_eq!(rescanned.ready_count(), 5);
}

#[tokio::test]
async fn cache_directory_contents_are_never_scanned() {
    let tmp = sample_root();
    let root = tmp.path();
    write_image(&root.join(".vitrine-cache/thumbnails/looks-real.jpg"), 8, 8);
    write_image(&root.join(".vitrine-cache/stray.png"), 8, 8);
    write_image(&root.join("album/thumbs/small.jpg"), 8, 8);
    write_image(&root.join("node_modules/pkg/logo.png"), 8, 8);

    let service = GalleryService::new(root, fast_config());
    let snapshot = service.get_snapshot().await;
    assert_eq!(snapshot.total_count, 4);
    assert!(
        snapshot
            .entries()
            .all(|e| !e.descriptor.relative_path.contains("cache")
                && !e.descriptor.relative_path.contains("thumbs"))
    );
    service.wait_idle().await;

    // Generated thumbnails must not show up on the next scan either.
    let rescanned = service.force_rescan().await;
    assert_eq!(rescanned.total_count, 4);
}

#[tokio::test]
async fn orphans_are_removed_exactly_once() {
    let tmp = sample_root();
    let service = GalleryService::new(tmp.path(), fast_config());
    service.get_snapshot().await;
    service.wait_idle().await;

    let thumbs = tmp.path().join(".vitrine-cache/thumbnails");
    std::fs::write(thumbs.join("%%%garbage%%%.jpg"), b"x").unwrap();
    std::fs::remove_file(tmp.path().join("beta.jpg")).unwrap();

    assert_eq!(service.cleanup_orphans().await.unwrap(), 1);
    assert_eq!(service.cleanup_orphans().await.unwrap(), 0);
    assert!(thumbs.join("%%%garbage%%%.jpg").exists());
    let alpha = ThumbnailKey::for_relative_path("alpha.png").file_name(ThumbnailVariant::Full);
    assert!(thumbs.join(alpha).exists());
}

#[tokio::test]
async fn unreadable_directory_only_hides_its_own_subtree() {
    let tmp = tempfile::tempdir().unwrap();
    let mut fs = InMemoryFs::new();
    fs.add_file("/gallery/one.jpg", 10);
    fs.add_file("/gallery/left/two.png", 10);
    fs.deny("/gallery/locked");
    fs.add_file("/gallery/right/three.mp4", 10);

    let store = ThumbnailStore::new(
        tmp.path().join("thumbs"),
        GalleryConfig::default().thumbnails,
    );
    let backend: Arc<dyn ThumbnailBackend> = Arc::new(store);
    let service = GalleryService::with_parts("/gallery", fast_config(), Arc::new(fs), backend);
    let mut events = service.subscribe_progress();

    let snapshot = service.get_snapshot().await;
    assert_eq!(snapshot.total_count, 3);
    assert_eq!(
        snapshot.by_directory.keys().map(String::as_str).collect::<Vec<_>>(),
        vec![".", "left", "right"]
    );

    service.wait_idle().await;
    // The images do not exist on disk, so they fail; the video placeholder
    // does not need the source and succeeds.
    let finished = drain(&mut events)
        .into_iter()
        .find(|e| matches!(e, ProgressEvent::GenerationFinished { .. }))
        .unwrap();
    assert_eq!(
        finished,
        ProgressEvent::GenerationFinished {
            total: 3,
            succeeded: 1,
            failed: 2
        }
    );
}

#[tokio::test]
async fn viewport_report_reorders_pending_work() {
    let tmp = tempfile::tempdir().unwrap();
    for i in 0..9 {
        write_image(&tmp.path().join(format!("img{i}.png")), 40, 40);
    }
    let service = GalleryService::new(tmp.path(), fast_config());
    let mut events = service.subscribe_progress();

    assert!(service.toggle_pause());
    service.get_snapshot().await;
    let moved = service
        .report_viewport(&["img8.png".to_string(), "img5.png".to_string()])
        .await;
    assert_eq!(moved, 2);
    assert!(!service.toggle_pause());
    service.wait_idle().await;

    let order: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            ProgressEvent::TinyPreviewReady { relative_path, .. } => Some(format!("tiny:{relative_path}")),
            ProgressEvent::ThumbnailReady { relative_path, .. } => Some(format!("full:{relative_path}")),
            _ => None,
        })
        .collect();
    assert_eq!(order.len(), 11);
    let position = |label: &str| order.iter().position(|o| o == label).unwrap();
    assert!(position("tiny:img8.png") < position("full:img8.png"));
    assert!(position("tiny:img5.png") < position("full:img5.png"));
    // The promoted pair rides in the first batch; the next batch starts only
    // after it completes.
    assert!(position("full:img8.png") < position("full:img1.png"));
    assert!(position("full:img5.png") < position("full:img1.png"));
}
