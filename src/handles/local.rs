//! Filesystem-backed handles.
//!
//! Permission on a plain filesystem is probed, never prompted: a readable
//! entry without the read-only bit is `granted`, a read-only one is `denied`.

use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use atomic_write_file::AtomicWriteFile;

use crate::log_warn;

use super::{
    ArtifactWriter, DirectoryHandle, FileHandle, HandleDescriptor, HandleError, HandleKind,
    HandleResolver, HandleResult, PermissionState,
};

const ENABLE_LOGS: bool = true;

pub const PLATFORM: &str = "local";

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn probe(path: &Path, expect_dir: bool) -> HandleResult<PermissionState> {
    let metadata = fs::metadata(path)?;
    if metadata.is_dir() != expect_dir {
        return Err(HandleError::Invalid(format!(
            "{} is not a {}",
            path.display(),
            if expect_dir { "directory" } else { "file" }
        )));
    }
    if metadata.permissions().readonly() {
        Ok(PermissionState::Denied)
    } else {
        Ok(PermissionState::Granted)
    }
}

fn descriptor_for(kind: HandleKind, path: &Path) -> HandleDescriptor {
    HandleDescriptor {
        kind,
        platform: PLATFORM.into(),
        locator: path.to_string_lossy().into_owned(),
    }
}

#[derive(Debug, Clone)]
pub struct LocalFileHandle {
    path: PathBuf,
}

impl LocalFileHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FileHandle for LocalFileHandle {
    fn name(&self) -> String {
        display_name(&self.path)
    }

    fn read(&self) -> HandleResult<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }

    fn write(&self, bytes: &[u8]) -> HandleResult<()> {
        // A vanished file must surface as NotFound, not be silently recreated.
        if !self.path.exists() {
            return Err(HandleError::NotFound);
        }
        let mut file = AtomicWriteFile::open(&self.path)?;
        file.write_all(bytes)?;
        file.commit()?;
        Ok(())
    }

    fn query_permission(&self) -> HandleResult<PermissionState> {
        probe(&self.path, false)
    }

    fn request_permission(&self) -> HandleResult<PermissionState> {
        probe(&self.path, false)
    }

    fn descriptor(&self) -> HandleDescriptor {
        descriptor_for(HandleKind::File, &self.path)
    }
}

#[derive(Debug, Clone)]
pub struct LocalDirectoryHandle {
    path: PathBuf,
}

impl LocalDirectoryHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DirectoryHandle for LocalDirectoryHandle {
    fn name(&self) -> String {
        display_name(&self.path)
    }

    fn query_permission(&self) -> HandleResult<PermissionState> {
        probe(&self.path, true)
    }

    fn request_permission(&self) -> HandleResult<PermissionState> {
        probe(&self.path, true)
    }

    fn contains(&self, file_name: &str) -> HandleResult<bool> {
        if !self.path.is_dir() {
            return Err(HandleError::NotFound);
        }
        Ok(self.path.join(file_name).exists())
    }

    fn create_file(&self, file_name: &str) -> HandleResult<Box<dyn ArtifactWriter>> {
        let path = self.path.join(file_name);
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        Ok(Box::new(LocalArtifactWriter { path, file }))
    }

    fn descriptor(&self) -> HandleDescriptor {
        descriptor_for(HandleKind::Directory, &self.path)
    }
}

struct LocalArtifactWriter {
    path: PathBuf,
    file: File,
}

impl ArtifactWriter for LocalArtifactWriter {
    fn write(&mut self, bytes: &[u8]) -> HandleResult<()> {
        Ok(self.file.write_all(bytes)?)
    }

    fn close(self: Box<Self>) -> HandleResult<()> {
        if let Err(err) = self.file.sync_all() {
            self.abort();
            return Err(err.into());
        }
        Ok(())
    }

    fn abort(self: Box<Self>) {
        let LocalArtifactWriter { path, file } = *self;
        drop(file);
        if let Err(err) = fs::remove_file(&path) {
            log_warn!("failed to remove aborted artifact {}: {err}", path.display());
        }
    }
}

/// Rebuilds `local` descriptors. Relative paths are rejected as malformed.
#[derive(Debug, Default, Clone)]
pub struct LocalResolver;

impl LocalResolver {
    fn path_of(descriptor: &HandleDescriptor, kind: HandleKind) -> Option<PathBuf> {
        if descriptor.kind != kind || descriptor.platform != PLATFORM || !descriptor.is_well_formed()
        {
            return None;
        }
        let path = PathBuf::from(&descriptor.locator);
        path.is_absolute().then_some(path)
    }
}

impl HandleResolver for LocalResolver {
    fn file(&self, descriptor: &HandleDescriptor) -> Option<Arc<dyn FileHandle>> {
        Self::path_of(descriptor, HandleKind::File)
            .map(|path| Arc::new(LocalFileHandle::new(path)) as Arc<dyn FileHandle>)
    }

    fn directory(&self, descriptor: &HandleDescriptor) -> Option<Arc<dyn DirectoryHandle>> {
        Self::path_of(descriptor, HandleKind::Directory)
            .map(|path| Arc::new(LocalDirectoryHandle::new(path)) as Arc<dyn DirectoryHandle>)
    }
}
