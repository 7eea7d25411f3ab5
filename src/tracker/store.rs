use std::sync::Arc;

use crate::{
    binding::{self, HandleProbe},
    csv_codec::{self, CsvTable, BOM},
    db::{HandleVault, TRACKER_HANDLE_KEY},
    error::{ErrorCode, TrackerError, TrackerResult},
    handles::{FileHandle, HandleError, PermissionState},
    log_info, log_warn,
    meta::BindingMetaStore,
    models::{
        BindOutcome, BindingScope, BindingState, MetaPatch, RecordDraft, TrackerRecord,
        ValidDraft, WriteMode, CSV_HEADERS,
    },
    utils::{run_blocking, time::now_iso},
};

use super::{merge, WriteQueue};

const ENABLE_LOGS: bool = true;
const SCOPE: BindingScope = BindingScope::Tracker;

fn handle_error(err: HandleError) -> TrackerError {
    TrackerError::from_handle(SCOPE, err)
}

fn denied(handle: &dyn FileHandle, permission: PermissionState) -> TrackerError {
    TrackerError::new(
        ErrorCode::permission(SCOPE),
        format!(
            "read/write access to {} is {}",
            handle.name(),
            permission.as_str()
        ),
    )
}

/// Query permission, asking once when it is not already granted.
fn ensure_access(handle: &dyn FileHandle) -> TrackerResult<()> {
    let mut permission = handle.query_permission().map_err(handle_error)?;
    if permission != PermissionState::Granted {
        permission = handle.request_permission().map_err(handle_error)?;
    }
    match permission {
        PermissionState::Granted => Ok(()),
        other => Err(denied(handle, other)),
    }
}

fn read_text(handle: &dyn FileHandle) -> TrackerResult<String> {
    let bytes = handle.read().map_err(handle_error)?;
    String::from_utf8(bytes).map_err(|_| {
        TrackerError::new(
            ErrorCode::SchemaMismatch,
            format!("{} is not UTF-8 text", handle.name()),
        )
    })
}

fn is_blank(text: &str) -> bool {
    text.trim_start_matches(BOM).trim().is_empty()
}

fn parse_table(name: &str, text: &str) -> TrackerResult<CsvTable> {
    let table = csv_codec::parse(text);
    if !csv_codec::is_header_match(&table.headers) {
        return Err(TrackerError::new(
            ErrorCode::SchemaMismatch,
            format!("{name} does not start with the tracker header row"),
        ));
    }
    Ok(table)
}

/// Read the whole table. A blank file reads as an empty table.
fn load_table(handle: &dyn FileHandle) -> TrackerResult<CsvTable> {
    let text = read_text(handle)?;
    if is_blank(&text) {
        return Ok(CsvTable {
            headers: CSV_HEADERS.iter().map(|h| h.to_string()).collect(),
            ..Default::default()
        });
    }
    parse_table(&handle.name(), &text)
}

/// Access and schema checks for a file about to be bound. A blank file is
/// initialized with the header template.
fn prepare_for_binding(handle: &dyn FileHandle) -> TrackerResult<()> {
    ensure_access(handle)?;
    let text = read_text(handle)?;
    if is_blank(&text) {
        return handle
            .write(csv_codec::template(true).as_bytes())
            .map_err(handle_error);
    }
    parse_table(&handle.name(), &text).map(|_| ())
}

/// Upsert/query engine over the bound tracker CSV.
///
/// Every mutation of the file goes through the store's own [`WriteQueue`].
/// Reads bypass the queue and may see the table as it was just before or just
/// after a concurrent write, never a mix of both.
#[derive(Clone)]
pub struct TrackerStore {
    vault: HandleVault,
    meta: Arc<BindingMetaStore>,
    queue: WriteQueue,
}

impl TrackerStore {
    pub fn new(vault: HandleVault, meta: Arc<BindingMetaStore>) -> Self {
        Self {
            vault,
            meta,
            queue: WriteQueue::new(),
        }
    }

    /// Bind `handle`, or re-bind the stored handle when `None` (after asking
    /// for permission again).
    pub async fn bind(&self, handle: Option<Arc<dyn FileHandle>>) -> TrackerResult<BindOutcome> {
        let result = self.try_bind(handle).await;
        if let Err(err) = &result {
            self.record_failure(err);
        }
        result
    }

    /// Write the header-only template into `handle`, then bind it.
    pub async fn create_template_and_bind(
        &self,
        handle: Arc<dyn FileHandle>,
    ) -> TrackerResult<BindOutcome> {
        let target = Arc::clone(&handle);
        let written = run_blocking("tracker template", move || -> TrackerResult<()> {
            ensure_access(&*target)?;
            target
                .write(csv_codec::template(true).as_bytes())
                .map_err(handle_error)
        })
        .await;

        if let Err(err) = written {
            self.record_failure(&err);
            return Err(err);
        }
        self.bind(Some(handle)).await
    }

    pub async fn state(&self) -> BindingState {
        let meta = self.meta.get(SCOPE);
        let probe = match self.vault.file(TRACKER_HANDLE_KEY).await {
            Ok(Some(handle)) => {
                HandleProbe::probe(handle.name(), move || handle.query_permission()).await
            }
            Ok(None) => HandleProbe::Absent,
            Err(err) => {
                log_warn!("tracker handle lookup failed: {err:#}");
                HandleProbe::Absent
            }
        };

        let resolved = binding::resolve(&meta, probe);
        if resolved.needs_rebind != meta.needs_rebind {
            let patch = MetaPatch {
                needs_rebind: Some(resolved.needs_rebind),
                ..Default::default()
            };
            if let Err(err) = self.meta.update(SCOPE, patch) {
                log_warn!("failed to cache tracker rebind flag: {err:#}");
            }
        }
        resolved.into()
    }

    /// Insert or update the row for the draft's key, serialized behind every
    /// earlier mutation.
    pub async fn upsert(&self, draft: RecordDraft, mode: WriteMode) -> TrackerResult<TrackerRecord> {
        let valid = draft.validate()?;
        let store = self.clone();

        self.queue
            .enqueue(async move {
                let result = store.write_record(valid, mode).await;
                match &result {
                    Ok(record) => {
                        log_info!("tracked {} ({:?})", record.job_key, mode);
                    }
                    Err(err) => store.record_failure(err),
                }
                result
            })
            .await
    }

    /// Latest row for `key`, without queueing behind pending writes. A job url
    /// is accepted in any form that canonicalizes to the stored one.
    pub async fn get_by_key(&self, key: &str) -> TrackerResult<Option<TrackerRecord>> {
        let key = key.trim();
        if key.is_empty() {
            return Err(TrackerError::new(
                ErrorCode::InvalidInput,
                "lookup key is empty",
            ));
        }

        let records = self.list_records().await?;
        Ok(merge::find_for_lookup(&records, key).and_then(|index| records.into_iter().nth(index)))
    }

    /// Snapshot of every row in file order.
    pub async fn list_records(&self) -> TrackerResult<Vec<TrackerRecord>> {
        let result = self.read_records().await;
        if let Err(err) = &result {
            self.record_failure(err);
        }
        result
    }

    async fn try_bind(&self, handle: Option<Arc<dyn FileHandle>>) -> TrackerResult<BindOutcome> {
        let handle = match handle {
            Some(handle) => handle,
            None => self.vault.file(TRACKER_HANDLE_KEY).await?.ok_or_else(|| {
                TrackerError::new(ErrorCode::unbound(SCOPE), "no tracker file has been chosen")
            })?,
        };

        let checked = Arc::clone(&handle);
        run_blocking("tracker bind", move || prepare_for_binding(&*checked)).await?;

        self.vault.put_file(TRACKER_HANDLE_KEY, &*handle).await?;
        let name = handle.name();
        let bound_at = now_iso();
        self.meta
            .update(SCOPE, MetaPatch::bound(name.clone(), bound_at.clone()))?;

        log_info!("tracker bound to {name}");
        Ok(BindOutcome { name, bound_at })
    }

    /// The bound handle, provided no rebind is pending and access is granted.
    async fn usable_handle(&self) -> TrackerResult<Arc<dyn FileHandle>> {
        if let Some(code) = self.meta.get(SCOPE).last_error.filter(ErrorCode::needs_rebind) {
            return Err(TrackerError::new(
                code,
                "the tracker file must be chosen again before it can be used",
            ));
        }

        let handle = self
            .vault
            .file(TRACKER_HANDLE_KEY)
            .await?
            .ok_or_else(|| {
                TrackerError::new(ErrorCode::unbound(SCOPE), "no tracker file is bound")
            })?;

        let probe = Arc::clone(&handle);
        let permission = run_blocking("tracker permission probe", move || {
            probe.query_permission().map_err(handle_error)
        })
        .await?;
        if permission != PermissionState::Granted {
            return Err(denied(&*handle, permission));
        }
        Ok(handle)
    }

    async fn read_records(&self) -> TrackerResult<Vec<TrackerRecord>> {
        let handle = self.usable_handle().await?;
        run_blocking("tracker read", move || {
            load_table(&*handle).map(|table| table.records)
        })
        .await
    }

    async fn write_record(&self, valid: ValidDraft, mode: WriteMode) -> TrackerResult<TrackerRecord> {
        let handle = self.usable_handle().await?;

        let record = run_blocking("tracker write", move || -> TrackerResult<TrackerRecord> {
            let mut records = load_table(&*handle)?.records;
            let record = merge::apply(&mut records, &valid, mode, &now_iso());
            let text = csv_codec::serialize(&records, &CSV_HEADERS, true);
            handle.write(text.as_bytes()).map_err(handle_error)?;
            Ok(record)
        })
        .await?;

        // The row is on disk at this point; a metadata hiccup must not report
        // the write as failed.
        if let Err(err) = self
            .meta
            .update(SCOPE, MetaPatch::activity(record.updated_at.clone()))
        {
            log_warn!("failed to record tracker sync time: {err:#}");
        }
        Ok(record)
    }

    fn record_failure(&self, err: &TrackerError) {
        log_warn!("tracker operation failed: {err}");
        if let Err(meta_err) = self.meta.update(SCOPE, MetaPatch::failure(err.code)) {
            log_warn!("failed to record tracker failure: {meta_err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::MemoryPlatform;

    #[test]
    fn blank_file_is_initialized_on_bind() {
        let platform = MemoryPlatform::new();
        let file = platform.new_file("jobs.csv", "\u{feff}  \n");
        prepare_for_binding(&*file).unwrap();

        let text = file.contents_string().unwrap();
        assert_eq!(text, csv_codec::template(true));
    }

    #[test]
    fn non_utf8_file_is_a_schema_mismatch() {
        let platform = MemoryPlatform::new();
        let file = platform.new_file("jobs.csv", vec![0xff, 0xfe, 0x00, 0x41]);
        let err = prepare_for_binding(&*file).unwrap_err();
        assert_eq!(err.code, ErrorCode::SchemaMismatch);
    }

    #[test]
    fn access_is_requested_once_when_prompted() {
        let platform = MemoryPlatform::new();
        let file = platform.new_file("jobs.csv", csv_codec::template(true));
        file.set_permission(PermissionState::Prompt);

        let err = ensure_access(&*file).unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);

        file.grant_on_request(true);
        ensure_access(&*file).unwrap();
    }

    #[test]
    fn blank_table_loads_empty() {
        let platform = MemoryPlatform::new();
        let file = platform.new_file("jobs.csv", "");
        let table = load_table(&*file).unwrap();
        assert!(table.records.is_empty());
        assert!(csv_codec::is_header_match(&table.headers));
    }
}
