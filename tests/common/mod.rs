//! Shared setup for the integration tests: a store backed by the in-memory
//! handle platform and a throwaway data directory.

#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use tempfile::TempDir;

use jobtrack::{
    csv_codec,
    handles::{MemoryDirectory, MemoryFile},
    DirectoryHandle, FileHandle, JobTracker, MemoryPlatform, RecordDraft, StoreConfig,
};

pub struct Harness {
    pub dir: TempDir,
    pub platform: Arc<MemoryPlatform>,
    pub tracker: JobTracker,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let platform = MemoryPlatform::new();
        let tracker = open(&platform, StoreConfig::new(dir.path()));
        Self {
            dir,
            platform,
            tracker,
        }
    }

    pub fn with_config(configure: impl FnOnce(&mut StoreConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        let platform = MemoryPlatform::new();
        let mut config = StoreConfig::new(dir.path());
        configure(&mut config);
        let tracker = open(&platform, config);
        Self {
            dir,
            platform,
            tracker,
        }
    }

    /// Drop the running store and open a fresh one over the same data.
    pub fn reopen(self) -> Self {
        let Harness {
            dir,
            platform,
            tracker,
        } = self;
        let config = tracker.config().clone();
        drop(tracker);
        let tracker = open(&platform, config);
        Self {
            dir,
            platform,
            tracker,
        }
    }

    pub fn tracker_file(&self, content: &str) -> Arc<MemoryFile> {
        self.platform.new_file("jobs.csv", content)
    }

    pub fn output_dir(&self) -> Arc<MemoryDirectory> {
        self.platform.new_directory("exports")
    }

    /// A template file, already bound.
    pub async fn bound_tracker(&self) -> Arc<MemoryFile> {
        let file = self.tracker_file(&csv_codec::template(true));
        self.tracker.bind_store(Some(file_handle(&file))).await.unwrap();
        file
    }

    /// An empty directory, already bound.
    pub async fn bound_output(&self) -> Arc<MemoryDirectory> {
        let directory = self.output_dir();
        self.tracker
            .bind_output_dir(Some(directory.handle()))
            .await
            .unwrap();
        directory
    }
}

fn open(platform: &Arc<MemoryPlatform>, config: StoreConfig) -> JobTracker {
    JobTracker::open(config, platform.clone()).unwrap()
}

pub fn file_handle(file: &Arc<MemoryFile>) -> Arc<dyn FileHandle> {
    file.clone()
}

pub fn directory_handle(directory: &Arc<MemoryDirectory>) -> Arc<dyn DirectoryHandle> {
    directory.handle()
}

pub fn draft(job_id: &str) -> RecordDraft {
    RecordDraft {
        job_id: Some(job_id.into()),
        company: Some("Acme".into()),
        position: Some("Engineer".into()),
        location: Some("Remote".into()),
        job_url: Some(format!("https://jobs.example.com/view/{job_id}")),
        ..Default::default()
    }
}

pub fn with_status(job_id: &str, status: &str) -> RecordDraft {
    RecordDraft {
        status: Some(status.into()),
        ..draft(job_id)
    }
}

/// Let the millisecond clock move on.
pub async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}
