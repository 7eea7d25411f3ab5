use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    binding::{self, HandleProbe},
    config::StoreConfig,
    db::{HandleVault, OUTPUT_DIR_HANDLE_KEY},
    error::{ErrorCode, TrackerError, TrackerResult},
    handles::{DirectoryHandle, HandleError, PermissionState},
    log_info, log_warn,
    meta::BindingMetaStore,
    models::{BindOutcome, BindingScope, MetaPatch, OutputBindingState},
    utils::{run_blocking, time::now_iso},
};

use super::naming;

const ENABLE_LOGS: bool = true;
const SCOPE: BindingScope = BindingScope::Output;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrittenArtifact {
    pub written_file_name: String,
    pub written_at: String,
}

fn handle_error(err: HandleError) -> TrackerError {
    TrackerError::from_handle(SCOPE, err)
}

fn denied(directory: &dyn DirectoryHandle, permission: PermissionState) -> TrackerError {
    TrackerError::new(
        ErrorCode::permission(SCOPE),
        format!(
            "write access to {} is {}",
            directory.name(),
            permission.as_str()
        ),
    )
}

fn ensure_access(directory: &dyn DirectoryHandle) -> TrackerResult<()> {
    let mut permission = directory.query_permission().map_err(handle_error)?;
    if permission != PermissionState::Granted {
        permission = directory.request_permission().map_err(handle_error)?;
    }
    match permission {
        PermissionState::Granted => Ok(()),
        other => Err(denied(directory, other)),
    }
}

/// Create the first free candidate name and write `bytes` into it.
///
/// A name that turns out to be taken at creation time (another writer won the
/// race) moves on to the next candidate. Existing entries are never opened.
fn write_new_file(
    directory: &dyn DirectoryHandle,
    stem: &str,
    extension: &str,
    max_attempts: u32,
    bytes: &[u8],
) -> TrackerResult<String> {
    for attempt in 0..max_attempts {
        let file_name = naming::candidate(stem, extension, attempt);
        if directory.contains(&file_name).map_err(handle_error)? {
            continue;
        }

        let mut writer = match directory.create_file(&file_name) {
            Ok(writer) => writer,
            Err(HandleError::AlreadyExists) => continue,
            Err(err) => return Err(handle_error(err)),
        };
        if let Err(err) = writer.write(bytes) {
            writer.abort();
            return Err(handle_error(err));
        }
        writer.close().map_err(handle_error)?;
        return Ok(file_name);
    }

    Err(TrackerError::new(
        ErrorCode::OutputWriteFailed,
        format!("no free file name for {stem}.{extension} after {max_attempts} attempts"),
    ))
}

/// Exports text artifacts into the bound output directory.
#[derive(Clone)]
pub struct OutputWriter {
    vault: HandleVault,
    meta: Arc<BindingMetaStore>,
    extension: String,
    max_attempts: u32,
}

impl OutputWriter {
    pub fn new(vault: HandleVault, meta: Arc<BindingMetaStore>, config: &StoreConfig) -> Self {
        Self {
            vault,
            meta,
            extension: config.extension().to_string(),
            max_attempts: config.max_name_attempts,
        }
    }

    /// Bind `handle`, or re-bind the stored directory when `None`.
    pub async fn bind(
        &self,
        handle: Option<Arc<dyn DirectoryHandle>>,
    ) -> TrackerResult<BindOutcome> {
        let result = self.try_bind(handle).await;
        if let Err(err) = &result {
            self.record_failure(err);
        }
        result
    }

    pub async fn state(&self) -> OutputBindingState {
        let meta = self.meta.get(SCOPE);
        let probe = match self.vault.directory(OUTPUT_DIR_HANDLE_KEY).await {
            Ok(Some(directory)) => {
                HandleProbe::probe(directory.name(), move || directory.query_permission()).await
            }
            Ok(None) => HandleProbe::Absent,
            Err(err) => {
                log_warn!("output directory lookup failed: {err:#}");
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
                log_warn!("failed to cache output rebind flag: {err:#}");
            }
        }
        resolved.into()
    }

    /// Write `content` under a fresh name derived from `base_name`. Never
    /// overwrites an existing entry.
    pub async fn write_artifact(
        &self,
        base_name: &str,
        content: &str,
    ) -> TrackerResult<WrittenArtifact> {
        let Some(stem) = naming::stem(base_name, &self.extension) else {
            return Err(TrackerError::new(
                ErrorCode::InvalidInput,
                format!("{base_name:?} is not a usable file name"),
            ));
        };

        let result = self.try_write(stem, content.as_bytes().to_vec()).await;
        if let Err(err) = &result {
            self.record_failure(err);
        }
        result
    }

    async fn try_bind(
        &self,
        handle: Option<Arc<dyn DirectoryHandle>>,
    ) -> TrackerResult<BindOutcome> {
        let directory = match handle {
            Some(directory) => directory,
            None => self
                .vault
                .directory(OUTPUT_DIR_HANDLE_KEY)
                .await?
                .ok_or_else(|| {
                    TrackerError::new(
                        ErrorCode::unbound(SCOPE),
                        "no output directory has been chosen",
                    )
                })?,
        };

        let checked = Arc::clone(&directory);
        run_blocking("output bind", move || ensure_access(&*checked)).await?;

        self.vault
            .put_directory(OUTPUT_DIR_HANDLE_KEY, &*directory)
            .await?;
        let name = directory.name();
        let bound_at = now_iso();
        self.meta
            .update(SCOPE, MetaPatch::bound(name.clone(), bound_at.clone()))?;

        log_info!("output directory bound to {name}");
        Ok(BindOutcome { name, bound_at })
    }

    async fn usable_directory(&self) -> TrackerResult<Arc<dyn DirectoryHandle>> {
        if let Some(code) = self.meta.get(SCOPE).last_error.filter(ErrorCode::needs_rebind) {
            return Err(TrackerError::new(
                code,
                "the output directory must be chosen again before it can be used",
            ));
        }

        let directory = self
            .vault
            .directory(OUTPUT_DIR_HANDLE_KEY)
            .await?
            .ok_or_else(|| {
                TrackerError::new(ErrorCode::unbound(SCOPE), "no output directory is bound")
            })?;

        let probe = Arc::clone(&directory);
        let permission = run_blocking("output permission probe", move || {
            probe.query_permission().map_err(handle_error)
        })
        .await?;
        if permission != PermissionState::Granted {
            return Err(denied(&*directory, permission));
        }
        Ok(directory)
    }

    async fn try_write(&self, stem: String, bytes: Vec<u8>) -> TrackerResult<WrittenArtifact> {
        let directory = self.usable_directory().await?;
        let extension = self.extension.clone();
        let max_attempts = self.max_attempts;

        let written_file_name = run_blocking("artifact write", move || {
            write_new_file(&*directory, &stem, &extension, max_attempts, &bytes)
        })
        .await?;

        let written_at = now_iso();
        if let Err(err) = self
            .meta
            .update(SCOPE, MetaPatch::activity(written_at.clone()))
        {
            log_warn!("failed to record artifact write time: {err:#}");
        }

        log_info!("wrote artifact {written_file_name}");
        Ok(WrittenArtifact {
            written_file_name,
            written_at,
        })
    }

    fn record_failure(&self, err: &TrackerError) {
        log_warn!("output operation failed: {err}");
        if let Err(meta_err) = self.meta.update(SCOPE, MetaPatch::failure(err.code)) {
            log_warn!("failed to record output failure: {meta_err:#}");
        }
    }
}
