// tests/storage_snapshot.rs
use chrono::{TimeZone, Utc};
use trend_harvester::storage::{ArtifactSink, FsArtifactSink, SnapshotStore};
use trend_harvester::types::{
    kst, logical_slot, Attempt, AttemptKind, Capture, ComboResult, ComboTarget, RunSnapshot,
    TopicRecord,
};

fn snapshot() -> RunSnapshot {
    let fetched_at = Utc
        .with_ymd_and_hms(2026, 10, 19, 3, 41, 7)
        .unwrap()
        .with_timezone(&kst());
    let rec = TopicRecord::build(1, "Comet sighting", "Visible before dawn", vec![]).unwrap();
    let capture = Capture {
        source_url: "https://trends.test/trending?geo=KR".to_string(),
        http_status: 200,
        fingerprint: trend_harvester::normalize::fingerprint_records(std::slice::from_ref(&rec)),
        item_count: 1,
        items: vec![rec],
        attempt_provenance: vec![Attempt::new(AttemptKind::Dom, "dom").finish(1)],
        used_export: false,
        snapshot_ref: Some("data/snapshots/trending_KR_4h_cat3_x.html".to_string()),
    };
    RunSnapshot {
        fetched_at,
        logical_slot: logical_slot(fetched_at),
        strategy: "render".to_string(),
        combos: vec![
            ComboResult::captured(ComboTarget::new("KR", 4, "3"), capture),
            ComboResult::failed(ComboTarget::new("KR", 24, "3"), "navigating: timed out"),
        ],
    }
}

#[tokio::test]
async fn writes_latest_and_history_then_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("data"));
    store.ensure_dirs().await.unwrap();
    assert!(store.snapshot_dir().is_dir());

    let snap = snapshot();
    let at = Utc.with_ymd_and_hms(2026, 10, 19, 3, 41, 7).unwrap();
    let (latest, history) = store.write(&snap, at).await.unwrap();

    assert_eq!(latest, store.latest_path());
    assert!(history.ends_with("history/latest_202610190341.json"));

    let back = store.read_latest().await.unwrap();
    assert_eq!(back, snap);

    // history copy is compact, latest is pretty
    let pretty = std::fs::read_to_string(&latest).unwrap();
    let compact = std::fs::read_to_string(&history).unwrap();
    assert!(pretty.contains('\n'));
    assert!(!compact.contains('\n'));
    let h: RunSnapshot = serde_json::from_str(&compact).unwrap();
    assert_eq!(h, snap);
}

#[tokio::test]
async fn document_uses_camel_case_layout() {
    let snap = snapshot();
    let v = serde_json::to_value(&snap).unwrap();

    assert_eq!(v["fetchedAt"], "2026-10-19T12:41:07+09:00");
    assert_eq!(v["logicalSlot"], "2026-10-19T12:00:00+09:00");
    assert_eq!(v["strategy"], "render");

    let ok = &v["combos"][0];
    assert_eq!(ok["geo"], "KR");
    assert_eq!(ok["hours"], 4);
    assert_eq!(ok["category"], "3");
    assert_eq!(ok["itemCount"], 1);
    assert_eq!(ok["httpStatus"], 200);
    assert_eq!(ok["items"][0]["rank"], 1);
    assert_eq!(ok["attemptProvenance"][0]["kind"], "dom");
    assert!(ok["snapshotRef"].is_string());
    assert!(ok.get("error").is_none());

    let failed = &v["combos"][1];
    assert_eq!(failed["error"], "navigating: timed out");
    assert_eq!(failed["itemCount"], 0);
    assert!(failed.get("items").is_none());
    assert!(failed.get("fingerprint").is_none());
}

#[tokio::test]
async fn artifact_sink_writes_into_directory() {
    let dir = tempfile::tempdir().unwrap();
    let sink = FsArtifactSink::new(dir.path());
    let path = sink.store("api_KR_4h_cat3_s.txt", b")]}'").await.unwrap();
    assert!(path.ends_with("api_KR_4h_cat3_s.txt"));
    assert_eq!(std::fs::read(&path).unwrap(), b")]}'");

    let missing = FsArtifactSink::new(dir.path().join("nope"));
    assert!(missing.store("x.txt", b"x").await.is_err());
}
