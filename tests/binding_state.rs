mod common;

use common::{draft, file_handle, Harness};
use jobtrack::{csv_codec, models::CSV_HEADERS, ErrorCode, PermissionState, WriteMode};

#[tokio::test]
async fn fresh_store_is_unbound_and_quiet() {
    let h = Harness::new();
    let state = h.tracker.get_binding_state().await;
    assert!(!state.is_bound);
    assert!(!state.needs_rebind);
    assert_eq!(state.bound_at, None);
    assert_eq!(state.permission, None);

    let output = h.tracker.get_output_state().await;
    assert!(!output.is_bound);
    assert!(!output.needs_rebind);
}

#[tokio::test]
async fn revoked_permission_needs_rebind_but_stays_bound() {
    let h = Harness::new();
    let file = h.bound_tracker().await;

    let state = h.tracker.get_binding_state().await;
    assert!(state.is_bound);
    assert!(!state.needs_rebind);
    assert_eq!(state.permission, Some(PermissionState::Granted));
    assert!(state.bound_at.is_some());

    file.set_permission(PermissionState::Denied);
    let state = h.tracker.get_binding_state().await;
    assert!(state.is_bound);
    assert!(state.needs_rebind);
    assert_eq!(state.permission, Some(PermissionState::Denied));

    let failure = h
        .tracker
        .upsert(draft("1"), WriteMode::Replace)
        .await
        .unwrap_err();
    assert_eq!(failure.error_code, ErrorCode::PermissionDenied);
    assert!(failure.needs_rebind);
}

#[tokio::test]
async fn schema_mismatch_leaves_store_unbound() {
    let h = Harness::new();
    let mut headers = CSV_HEADERS.to_vec();
    headers[3] = "title";
    let file = h.tracker_file(&format!("{}\n", headers.join(",")));

    let failure = h
        .tracker
        .bind_store(Some(file_handle(&file)))
        .await
        .unwrap_err();
    assert_eq!(failure.error_code, ErrorCode::SchemaMismatch);
    assert!(failure.needs_rebind);

    let state = h.tracker.get_binding_state().await;
    assert!(!state.is_bound);
    assert!(state.needs_rebind);
    assert_eq!(state.last_error, Some(ErrorCode::SchemaMismatch));
}

#[tokio::test]
async fn sticky_error_holds_until_rebind() {
    let h = Harness::new();
    let file = h.bound_tracker().await;
    let content = file.contents().unwrap();

    file.remove();
    let failure = h
        .tracker
        .upsert(draft("1"), WriteMode::Replace)
        .await
        .unwrap_err();
    assert_eq!(failure.error_code, ErrorCode::FileNotFound);

    // The file is back, but the recorded error still demands a rebind.
    file.set_contents(content);
    let state = h.tracker.get_binding_state().await;
    assert!(state.is_bound);
    assert!(state.needs_rebind);
    assert_eq!(state.last_error, Some(ErrorCode::FileNotFound));
    let failure = h
        .tracker
        .upsert(draft("1"), WriteMode::Replace)
        .await
        .unwrap_err();
    assert_eq!(failure.error_code, ErrorCode::FileNotFound);

    let reply = h.tracker.bind_store(None).await.unwrap();
    assert_eq!(reply.name, "jobs.csv");
    let state = h.tracker.get_binding_state().await;
    assert!(!state.needs_rebind);
    assert_eq!(state.last_error, None);
    h.tracker
        .upsert(draft("1"), WriteMode::Replace)
        .await
        .unwrap();
}

#[tokio::test]
async fn rebind_without_handle_asks_for_permission_again() {
    let h = Harness::new();
    let file = h.bound_tracker().await;
    file.set_permission(PermissionState::Prompt);

    let failure = h.tracker.bind_store(None).await.unwrap_err();
    assert_eq!(failure.error_code, ErrorCode::PermissionDenied);

    file.grant_on_request(true);
    h.tracker.bind_store(None).await.unwrap();
    let state = h.tracker.get_binding_state().await;
    assert!(state.is_bound);
    assert!(!state.needs_rebind);
    assert_eq!(state.permission, Some(PermissionState::Granted));
}

#[tokio::test]
async fn rebind_without_any_stored_handle_fails() {
    let h = Harness::new();
    let failure = h.tracker.bind_store(None).await.unwrap_err();
    assert_eq!(failure.error_code, ErrorCode::NoBoundFile);
}

#[tokio::test]
async fn failing_probe_counts_as_unknown_permission() {
    let h = Harness::new();
    let file = h.bound_tracker().await;
    file.fail_permission_probe(true);

    let state = h.tracker.get_binding_state().await;
    assert!(state.is_bound);
    assert!(state.needs_rebind);
    assert_eq!(state.permission, None);

    file.fail_permission_probe(false);
    let state = h.tracker.get_binding_state().await;
    assert!(!state.needs_rebind);
}

#[tokio::test]
async fn vanished_handle_needs_rebind() {
    let h = Harness::new();
    let file = h.bound_tracker().await;
    h.platform.forget(&jobtrack::FileHandle::descriptor(&*file));

    let state = h.tracker.get_binding_state().await;
    assert!(!state.is_bound);
    assert!(state.needs_rebind);
    assert_eq!(state.file_name, "jobs.csv");
}

#[tokio::test]
async fn bindings_survive_restart() {
    let h = Harness::new();
    h.bound_tracker().await;
    h.bound_output().await;
    h.tracker
        .upsert(draft("5"), WriteMode::Replace)
        .await
        .unwrap();
    let before = h.tracker.get_binding_state().await;

    let h = h.reopen();
    let after = h.tracker.get_binding_state().await;
    assert_eq!(after, before);
    assert!(after.is_bound);
    assert!(after.last_sync_at.is_some());

    let output = h.tracker.get_output_state().await;
    assert!(output.is_bound);
    assert_eq!(output.directory_name, "exports");

    let record = h.tracker.get_by_key("5").await.unwrap().record;
    assert!(record.is_some());
}

#[tokio::test]
async fn scopes_do_not_share_state() {
    let h = Harness::new();
    h.bound_tracker().await;

    let failure = h.tracker.write_artifact("note", "text").await.unwrap_err();
    assert_eq!(failure.error_code, ErrorCode::NoOutputDirBound);

    let tracker_state = h.tracker.get_binding_state().await;
    assert!(!tracker_state.needs_rebind);
    assert_eq!(tracker_state.last_error, None);

    let output_state = h.tracker.get_output_state().await;
    assert!(output_state.needs_rebind);
    assert_eq!(output_state.last_error, Some(ErrorCode::NoOutputDirBound));

    // Binding a template file still works independently.
    let file = h.tracker_file(&csv_codec::template(false));
    h.tracker.bind_store(Some(file_handle(&file))).await.unwrap();
}
