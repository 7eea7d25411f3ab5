//! End-to-end run over real files and directories.

use std::{fs, sync::Arc};

use tempfile::TempDir;

use jobtrack::{
    csv_codec::{self, BOM},
    handles::local::{LocalDirectoryHandle, LocalFileHandle},
    ErrorCode, JobTracker, RecordDraft, StoreConfig, WriteMode,
};

fn draft(job_id: &str, status: &str) -> RecordDraft {
    RecordDraft {
        job_id: Some(job_id.into()),
        company: Some("Acme, Inc.".into()),
        status: Some(status.into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn tracker_and_exports_round_trip_through_disk() {
    let workspace = TempDir::new().unwrap();
    let csv_path = workspace.path().join("jobs.csv");
    let exports = workspace.path().join("exports");
    fs::write(&csv_path, "").unwrap();
    fs::create_dir(&exports).unwrap();

    let config = StoreConfig::new(workspace.path().join("state"));
    {
        let tracker = JobTracker::open_local(config.clone()).unwrap();
        tracker
            .bind_store(Some(Arc::new(LocalFileHandle::new(&csv_path))))
            .await
            .unwrap();
        tracker
            .bind_output_dir(Some(Arc::new(LocalDirectoryHandle::new(&exports))))
            .await
            .unwrap();

        tracker
            .upsert(draft("1", "Saved"), WriteMode::Replace)
            .await
            .unwrap();
        tracker.write_artifact("posting", "first").await.unwrap();
    }

    // A new process finds both bindings through the vault.
    let tracker = JobTracker::open_local(config).unwrap();
    tracker
        .upsert(draft("1", "Applied"), WriteMode::Replace)
        .await
        .unwrap();
    let second = tracker.write_artifact("posting", "second").await.unwrap();
    assert_eq!(second.written_file_name, "posting_1.txt");

    let text = fs::read_to_string(&csv_path).unwrap();
    assert!(text.starts_with(BOM));
    let table = csv_codec::parse(&text);
    assert!(csv_codec::is_header_match(&table.headers));
    assert_eq!(table.records.len(), 1);
    assert_eq!(table.records[0].company, "Acme, Inc.");
    assert_eq!(table.records[0].status, "Applied");

    assert_eq!(fs::read_to_string(exports.join("posting.txt")).unwrap(), "first");
    assert_eq!(fs::read_to_string(exports.join("posting_1.txt")).unwrap(), "second");
}

#[tokio::test]
async fn deleted_tracker_file_needs_rebind() {
    let workspace = TempDir::new().unwrap();
    let csv_path = workspace.path().join("jobs.csv");
    fs::write(&csv_path, csv_codec::template(true)).unwrap();

    let tracker = JobTracker::open_local(StoreConfig::new(workspace.path().join("state"))).unwrap();
    tracker
        .bind_store(Some(Arc::new(LocalFileHandle::new(&csv_path))))
        .await
        .unwrap();

    fs::remove_file(&csv_path).unwrap();
    let failure = tracker
        .upsert(draft("1", "Saved"), WriteMode::Replace)
        .await
        .unwrap_err();
    assert_eq!(failure.error_code, ErrorCode::FileNotFound);
    assert!(failure.needs_rebind);
    assert!(!csv_path.exists());

    let state = tracker.get_binding_state().await;
    assert!(state.needs_rebind);
}
