//! Capability interfaces for user-selected resources.
//!
//! The store never touches a path or a platform object directly. A bound CSV
//! file is an `Arc<dyn FileHandle>`, a bound output directory is an
//! `Arc<dyn DirectoryHandle>`, and both persist as a [`HandleDescriptor`] that a
//! [`HandleResolver`] turns back into a live handle after a restart.

use std::{io, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod local;
pub mod memory;

pub use local::LocalResolver;
pub use memory::{MemoryDirectory, MemoryFile, MemoryPlatform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Prompt,
    Denied,
}

impl PermissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionState::Granted => "granted",
            PermissionState::Prompt => "prompt",
            PermissionState::Denied => "denied",
        }
    }
}

/// Typed failure reported by a platform adapter.
#[derive(Debug, Error)]
pub enum HandleError {
    #[error("resource not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("entry already exists")]
    AlreadyExists,
    #[error("invalid handle: {0}")]
    Invalid(String),
    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for HandleError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => HandleError::NotFound,
            io::ErrorKind::PermissionDenied => HandleError::PermissionDenied,
            io::ErrorKind::AlreadyExists => HandleError::AlreadyExists,
            _ => HandleError::Io(err),
        }
    }
}

pub type HandleResult<T> = std::result::Result<T, HandleError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleKind {
    File,
    Directory,
}

/// Persistable identity of a handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleDescriptor {
    pub kind: HandleKind,
    /// Which resolver can rebuild this handle (`local`, `memory`, ...).
    pub platform: String,
    pub locator: String,
}

impl HandleDescriptor {
    pub fn is_well_formed(&self) -> bool {
        !self.platform.trim().is_empty() && !self.locator.trim().is_empty()
    }
}

pub trait FileHandle: Send + Sync {
    fn name(&self) -> String;
    fn read(&self) -> HandleResult<Vec<u8>>;
    /// Replace the whole file content.
    fn write(&self, bytes: &[u8]) -> HandleResult<()>;
    fn query_permission(&self) -> HandleResult<PermissionState>;
    fn request_permission(&self) -> HandleResult<PermissionState>;
    fn descriptor(&self) -> HandleDescriptor;
}

pub trait DirectoryHandle: Send + Sync {
    fn name(&self) -> String;
    fn query_permission(&self) -> HandleResult<PermissionState>;
    fn request_permission(&self) -> HandleResult<PermissionState>;
    fn contains(&self, file_name: &str) -> HandleResult<bool>;
    /// Create `file_name`, failing with [`HandleError::AlreadyExists`] if taken.
    fn create_file(&self, file_name: &str) -> HandleResult<Box<dyn ArtifactWriter>>;
    fn descriptor(&self) -> HandleDescriptor;
}

/// In-progress write of one artifact. Nothing is visible until `close`.
pub trait ArtifactWriter: Send {
    fn write(&mut self, bytes: &[u8]) -> HandleResult<()>;
    /// Finish the artifact. A failed close leaves no entry behind.
    fn close(self: Box<Self>) -> HandleResult<()>;
    fn abort(self: Box<Self>);
}

/// Rebuilds live handles from persisted descriptors.
///
/// Returns `None` for descriptors this resolver does not own or can no longer
/// make sense of.
pub trait HandleResolver: Send + Sync {
    fn file(&self, descriptor: &HandleDescriptor) -> Option<Arc<dyn FileHandle>>;
    fn directory(&self, descriptor: &HandleDescriptor) -> Option<Arc<dyn DirectoryHandle>>;
}

/// Resolver that tries several platforms in order.
pub struct ChainResolver {
    resolvers: Vec<Arc<dyn HandleResolver>>,
}

impl ChainResolver {
    pub fn new(resolvers: Vec<Arc<dyn HandleResolver>>) -> Self {
        Self { resolvers }
    }
}

impl HandleResolver for ChainResolver {
    fn file(&self, descriptor: &HandleDescriptor) -> Option<Arc<dyn FileHandle>> {
        self.resolvers.iter().find_map(|r| r.file(descriptor))
    }

    fn directory(&self, descriptor: &HandleDescriptor) -> Option<Arc<dyn DirectoryHandle>> {
        self.resolvers.iter().find_map(|r| r.directory(descriptor))
    }
}
