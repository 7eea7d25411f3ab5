use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{error, info};
use rusqlite::Connection;

mod migrations;
pub mod vault;

use migrations::run_migrations;
use crate::worker::SerialWorker;

pub use vault::{HandleVault, OUTPUT_DIR_HANDLE_KEY, TRACKER_HANDLE_KEY};

/// SQLite database owned by a dedicated worker thread.
#[derive(Clone)]
pub struct Database {
    worker: SerialWorker<Connection>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let path_for_thread = db_path.clone();
        let worker = SerialWorker::spawn("jobtrack-db", move || {
            let mut conn = Connection::open(&path_for_thread)
                .context("failed to open SQLite database")?;

            if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                error!("Failed to enable WAL mode: {err}");
            }

            run_migrations(&mut conn).context("failed to run database migrations")?;
            Ok(conn)
        })?;

        info!("Handle database initialized at {}", db_path.display());

        Ok(Self { worker })
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.worker.execute(task).await
    }
}
