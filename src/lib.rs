pub mod binding;
pub mod commands;
pub mod config;
pub mod csv_codec;
pub mod db;
pub mod error;
pub mod handles;
pub mod keys;
pub mod meta;
pub mod models;
pub mod output;
pub mod tracker;
pub mod utils;
mod worker;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

pub use commands::{
    BindReply, ExportAndTrackReply, GetByKeyReply, TrackingOutcome, UpsertReply,
    WriteArtifactReply,
};
pub use config::StoreConfig;
pub use error::{ErrorCode, Failure, TrackerError};
pub use handles::{
    DirectoryHandle, FileHandle, HandleResolver, LocalResolver, MemoryPlatform, PermissionState,
};
pub use models::{
    BindingState, OutputBindingState, RecordDraft, RoundInput, TrackerRecord, WriteMode,
};
pub use utils::init_logging;

use db::{Database, HandleVault};
use meta::BindingMetaStore;
use output::OutputWriter;
use tracker::TrackerStore;

/// Process-wide job tracker: the tracker CSV binding and the output directory
/// binding, with the command surface in [`commands`].
pub struct JobTracker {
    pub(crate) tracker: TrackerStore,
    pub(crate) output: OutputWriter,
    config: StoreConfig,
}

impl JobTracker {
    /// Open the vault and metadata under `config.data_dir`. Must be called
    /// from inside a tokio runtime.
    pub fn open(config: StoreConfig, resolver: Arc<dyn HandleResolver>) -> Result<Self> {
        config.validate().context("invalid store configuration")?;
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("failed to create data directory {}", config.data_dir.display())
        })?;

        let database = Database::new(config.vault_path())?;
        let vault = HandleVault::new(database, resolver);
        let meta = Arc::new(BindingMetaStore::new(config.meta_path())?);

        let tracker = TrackerStore::new(vault.clone(), Arc::clone(&meta));
        let output = OutputWriter::new(vault, meta, &config);

        info!("Job tracker opened at {}", config.data_dir.display());
        Ok(Self {
            tracker,
            output,
            config,
        })
    }

    /// Open with filesystem-path handles.
    pub fn open_local(config: StoreConfig) -> Result<Self> {
        Self::open(config, Arc::new(LocalResolver))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}
