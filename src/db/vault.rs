//! Durable storage for bound resource handles.
//!
//! Handles are persisted as JSON descriptors and rebuilt through a
//! [`HandleResolver`] on read. Anything that does not come back as a
//! structurally valid handle of the requested kind is reported as absent.

use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension};

use crate::{
    db::Database,
    handles::{DirectoryHandle, FileHandle, HandleDescriptor, HandleKind, HandleResolver},
    log_warn,
    utils::time::now_iso,
};

const ENABLE_LOGS: bool = true;

pub const TRACKER_HANDLE_KEY: &str = "trackerCsvHandle";
pub const OUTPUT_DIR_HANDLE_KEY: &str = "outputDirHandle";

#[derive(Clone)]
pub struct HandleVault {
    db: Database,
    resolver: Arc<dyn HandleResolver>,
}

impl HandleVault {
    pub fn new(db: Database, resolver: Arc<dyn HandleResolver>) -> Self {
        Self { db, resolver }
    }

    pub async fn put_file(&self, key: &str, handle: &dyn FileHandle) -> Result<()> {
        self.put_descriptor(key, handle.descriptor()).await
    }

    pub async fn put_directory(&self, key: &str, handle: &dyn DirectoryHandle) -> Result<()> {
        self.put_descriptor(key, handle.descriptor()).await
    }

    pub async fn file(&self, key: &str) -> Result<Option<Arc<dyn FileHandle>>> {
        let Some(descriptor) = self.descriptor(key, HandleKind::File).await? else {
            return Ok(None);
        };
        let handle = self.resolver.file(&descriptor);
        if handle.is_none() {
            log_warn!("stored file handle '{key}' could not be rebuilt; treating as unbound");
        }
        Ok(handle)
    }

    pub async fn directory(&self, key: &str) -> Result<Option<Arc<dyn DirectoryHandle>>> {
        let Some(descriptor) = self.descriptor(key, HandleKind::Directory).await? else {
            return Ok(None);
        };
        let handle = self.resolver.directory(&descriptor);
        if handle.is_none() {
            log_warn!("stored directory handle '{key}' could not be rebuilt; treating as unbound");
        }
        Ok(handle)
    }

    async fn put_descriptor(&self, key: &str, descriptor: HandleDescriptor) -> Result<()> {
        let key = key.to_string();
        let encoded =
            serde_json::to_string(&descriptor).context("failed to encode handle descriptor")?;
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO handles (key, descriptor, stored_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                         descriptor = excluded.descriptor,
                         stored_at = excluded.stored_at",
                    params![key, encoded, now_iso()],
                )
                .with_context(|| format!("failed to store handle '{key}'"))?;
                Ok(())
            })
            .await
    }

    /// Load the raw descriptor for `key`, dropping anything malformed.
    async fn descriptor(&self, key: &str, kind: HandleKind) -> Result<Option<HandleDescriptor>> {
        let lookup = key.to_string();
        let raw: Option<String> = self
            .db
            .execute(move |conn| {
                conn.query_row(
                    "SELECT descriptor FROM handles WHERE key = ?1",
                    params![lookup],
                    |row| row.get(0),
                )
                .optional()
                .context("failed to read stored handle")
            })
            .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str::<HandleDescriptor>(&raw) {
            Ok(descriptor) if descriptor.kind == kind && descriptor.is_well_formed() => {
                Ok(Some(descriptor))
            }
            Ok(descriptor) => {
                log_warn!(
                    "stored handle '{key}' has kind {:?}, expected {kind:?}; ignoring",
                    descriptor.kind
                );
                Ok(None)
            }
            Err(err) => {
                log_warn!("stored handle '{key}' is not a valid descriptor: {err}");
                Ok(None)
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn put_raw(&self, key: &str, raw: &str) -> Result<()> {
        let key = key.to_string();
        let raw = raw.to_string();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO handles (key, descriptor, stored_at) VALUES (?1, ?2, ?3)",
                    params![key, raw, now_iso()],
                )?;
                Ok(())
            })
            .await
    }
}
