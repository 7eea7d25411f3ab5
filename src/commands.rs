//! Caller-facing command surface.
//!
//! Every command returns a serializable reply or a [`Failure`]. Nothing inside
//! the store escapes undecorated.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    error::Failure,
    handles::{DirectoryHandle, FileHandle},
    models::{
        BindOutcome, BindingState, OutputBindingState, RecordDraft, TrackerRecord, WriteMode,
    },
    JobTracker,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindReply {
    pub ok: bool,
    pub name: String,
    pub bound_at: String,
}

impl From<BindOutcome> for BindReply {
    fn from(outcome: BindOutcome) -> Self {
        Self {
            ok: true,
            name: outcome.name,
            bound_at: outcome.bound_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertReply {
    pub ok: bool,
    pub record: TrackerRecord,
    pub sync_state: BindingState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetByKeyReply {
    pub ok: bool,
    pub record: Option<TrackerRecord>,
    pub sync_state: BindingState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteArtifactReply {
    pub ok: bool,
    pub written_file_name: String,
    pub written_at: String,
    pub output_state: OutputBindingState,
}

/// What happened to the tracking half of an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum TrackingOutcome {
    Recorded { record: TrackerRecord },
    /// The artifact is on disk; only the tracker sync needs a retry.
    NotRecorded { failure: Failure },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportAndTrackReply {
    pub ok: bool,
    pub written_file_name: String,
    pub written_at: String,
    pub output_state: OutputBindingState,
    pub tracking: TrackingOutcome,
    pub sync_state: BindingState,
}

impl JobTracker {
    pub async fn bind_store(
        &self,
        handle: Option<Arc<dyn FileHandle>>,
    ) -> Result<BindReply, Failure> {
        Ok(self.tracker.bind(handle).await?.into())
    }

    /// Initialize `handle` as an empty tracker and bind it.
    pub async fn create_tracker(&self, handle: Arc<dyn FileHandle>) -> Result<BindReply, Failure> {
        Ok(self.tracker.create_template_and_bind(handle).await?.into())
    }

    pub async fn get_binding_state(&self) -> BindingState {
        self.tracker.state().await
    }

    pub async fn upsert(
        &self,
        draft: RecordDraft,
        mode: WriteMode,
    ) -> Result<UpsertReply, Failure> {
        let record = self.tracker.upsert(draft, mode).await?;
        Ok(UpsertReply {
            ok: true,
            record,
            sync_state: self.tracker.state().await,
        })
    }

    pub async fn get_by_key(&self, key: &str) -> Result<GetByKeyReply, Failure> {
        let record = self.tracker.get_by_key(key).await?;
        Ok(GetByKeyReply {
            ok: true,
            record,
            sync_state: self.tracker.state().await,
        })
    }

    pub async fn list_records(&self) -> Result<Vec<TrackerRecord>, Failure> {
        Ok(self.tracker.list_records().await?)
    }

    pub async fn bind_output_dir(
        &self,
        handle: Option<Arc<dyn DirectoryHandle>>,
    ) -> Result<BindReply, Failure> {
        Ok(self.output.bind(handle).await?.into())
    }

    pub async fn get_output_state(&self) -> OutputBindingState {
        self.output.state().await
    }

    pub async fn write_artifact(
        &self,
        base_name: &str,
        content: &str,
    ) -> Result<WriteArtifactReply, Failure> {
        let written = self.output.write_artifact(base_name, content).await?;
        Ok(WriteArtifactReply {
            ok: true,
            written_file_name: written.written_file_name,
            written_at: written.written_at,
            output_state: self.output.state().await,
        })
    }

    /// Write the artifact, then record the draft. A tracking failure after a
    /// successful write is reported in `tracking`, not as a failed export.
    pub async fn export_and_track(
        &self,
        base_name: &str,
        content: &str,
        draft: RecordDraft,
        mode: WriteMode,
    ) -> Result<ExportAndTrackReply, Failure> {
        // Reject an unusable draft before anything lands on disk.
        draft.clone().validate()?;

        let written = self.output.write_artifact(base_name, content).await?;
        let tracking = match self.tracker.upsert(draft, mode).await {
            Ok(record) => TrackingOutcome::Recorded { record },
            Err(err) => TrackingOutcome::NotRecorded {
                failure: err.into(),
            },
        };

        Ok(ExportAndTrackReply {
            ok: true,
            written_file_name: written.written_file_name,
            written_at: written.written_at,
            output_state: self.output.state().await,
            tracking,
            sync_state: self.tracker.state().await,
        })
    }
}
