use serde_json::json;

use crate::common;

#[tokio::test]
async fn health_reports_components_and_worker_state() {
    let srv = common::spawn().await;
    let (status, body) = srv.get_json("/health").await;
    assert_eq!(status, 200);

    // All HTTP collaborators are unroutable in the harness; the KV store is
    // the in-memory backend and always healthy.
    assert_eq!(body["services"]["kv_store"], "healthy");
    assert_eq!(body["services"]["fast_engine"], "unhealthy");
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["async_memory"]["running"], false);
    assert!(body["async_memory"]["processed"].is_u64());
}

#[tokio::test]
async fn metrics_expose_uptime_system_and_version() {
    let srv = common::spawn().await;
    let (status, body) = srv.get_json("/metrics").await;
    assert_eq!(status, 200);
    assert!(body["uptime_seconds"].is_u64());
    assert!(body["system"]["rss_bytes"].is_u64());
    assert_eq!(body["memory_stats"]["total_memories"], 0);
    assert!(body["version"].is_string());
    assert!(body["services"].is_object());
}

/// Archive sweep through the admin endpoint: 1500 memories spanning 60 days
/// collapse to the keep window plus the young, with one JSON file on disk.
#[tokio::test]
async fn admin_archive_sweeps_old_memories_to_disk() {
    let srv = common::spawn().await;
    let now = archive::memory::now_epoch_secs();
    for i in 0..1500 {
        // One per hour going back ~62 days.
        srv.seed_memory(&format!("aging memory {i}"), now - i as f64 * 3600.0)
            .await;
    }

    let (status, body) = srv.post_json("/admin/archive_old_memories", json!({})).await;
    assert_eq!(status, 200);
    let archived = body["archived_count"].as_u64().unwrap();
    assert!(archived > 0, "expected a non-empty sweep");

    let (_, list) = srv.get_json("/memories?limit=1").await;
    assert_eq!(list["total"].as_u64().unwrap(), 1500 - archived);

    let archive_root = srv.data_dir.path().join("archive");
    let month_dirs: Vec<_> = std::fs::read_dir(&archive_root).unwrap().collect();
    assert!(!month_dirs.is_empty());

    // Second run in the same day is a no-op.
    let (_, body) = srv.post_json("/admin/archive_old_memories", json!({})).await;
    assert_eq!(body["archived_count"], 0);
}
