//! In-process handles backed by byte buffers.
//!
//! Every knob a real host can turn is switchable here: permission can be
//! revoked, probes can fail, entries can vanish. Handles are registered with a
//! [`MemoryPlatform`], which is also their resolver, so they survive a
//! vault round-trip inside one process.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use uuid::Uuid;

use super::{
    ArtifactWriter, DirectoryHandle, FileHandle, HandleDescriptor, HandleError, HandleKind,
    HandleResolver, HandleResult, PermissionState,
};

pub const PLATFORM: &str = "memory";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Permission knobs shared by files and directories.
#[derive(Debug)]
struct Access {
    permission: Mutex<PermissionState>,
    grant_on_request: AtomicBool,
    probe_fails: AtomicBool,
}

impl Access {
    fn new() -> Self {
        Self {
            permission: Mutex::new(PermissionState::Granted),
            grant_on_request: AtomicBool::new(false),
            probe_fails: AtomicBool::new(false),
        }
    }

    fn query(&self) -> HandleResult<PermissionState> {
        if self.probe_fails.load(Ordering::SeqCst) {
            return Err(HandleError::Invalid("permission probe failed".into()));
        }
        Ok(*lock(&self.permission))
    }

    fn request(&self) -> HandleResult<PermissionState> {
        if self.grant_on_request.load(Ordering::SeqCst) {
            *lock(&self.permission) = PermissionState::Granted;
        }
        self.query()
    }

    fn require_granted(&self) -> HandleResult<()> {
        match *lock(&self.permission) {
            PermissionState::Granted => Ok(()),
            _ => Err(HandleError::PermissionDenied),
        }
    }
}

#[derive(Debug)]
pub struct MemoryFile {
    id: String,
    name: String,
    content: Mutex<Option<Vec<u8>>>,
    access: Access,
}

impl MemoryFile {
    pub fn contents(&self) -> Option<Vec<u8>> {
        lock(&self.content).clone()
    }

    pub fn contents_string(&self) -> Option<String> {
        self.contents()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn set_contents(&self, bytes: impl Into<Vec<u8>>) {
        *lock(&self.content) = Some(bytes.into());
    }

    /// Simulate the file being deleted behind the store's back.
    pub fn remove(&self) {
        *lock(&self.content) = None;
    }

    pub fn set_permission(&self, state: PermissionState) {
        *lock(&self.access.permission) = state;
    }

    /// When set, `request_permission` flips the state to `granted`.
    pub fn grant_on_request(&self, grant: bool) {
        self.access.grant_on_request.store(grant, Ordering::SeqCst);
    }

    pub fn fail_permission_probe(&self, fail: bool) {
        self.access.probe_fails.store(fail, Ordering::SeqCst);
    }
}

impl FileHandle for MemoryFile {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn read(&self) -> HandleResult<Vec<u8>> {
        self.access.require_granted()?;
        lock(&self.content).clone().ok_or(HandleError::NotFound)
    }

    fn write(&self, bytes: &[u8]) -> HandleResult<()> {
        self.access.require_granted()?;
        let mut content = lock(&self.content);
        match content.as_mut() {
            Some(existing) => {
                *existing = bytes.to_vec();
                Ok(())
            }
            None => Err(HandleError::NotFound),
        }
    }

    fn query_permission(&self) -> HandleResult<PermissionState> {
        self.access.query()
    }

    fn request_permission(&self) -> HandleResult<PermissionState> {
        self.access.request()
    }

    fn descriptor(&self) -> HandleDescriptor {
        HandleDescriptor {
            kind: HandleKind::File,
            platform: PLATFORM.into(),
            locator: self.id.clone(),
        }
    }
}

#[derive(Debug)]
pub struct MemoryDirectory {
    id: String,
    name: String,
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
    removed: AtomicBool,
    fail_writes: AtomicBool,
    fail_close: AtomicBool,
    access: Access,
}

impl MemoryDirectory {
    pub fn handle(self: &Arc<Self>) -> Arc<dyn DirectoryHandle> {
        Arc::new(Arc::clone(self))
    }

    pub fn read_entry(&self, file_name: &str) -> Option<Vec<u8>> {
        lock(&self.entries).get(file_name).cloned()
    }

    pub fn entry_names(&self) -> Vec<String> {
        lock(&self.entries).keys().cloned().collect()
    }

    /// Place an entry directly, as another program would.
    pub fn insert_entry(&self, file_name: &str, bytes: impl Into<Vec<u8>>) {
        lock(&self.entries).insert(file_name.to_string(), bytes.into());
    }

    pub fn remove(&self) {
        self.removed.store(true, Ordering::SeqCst);
    }

    pub fn set_permission(&self, state: PermissionState) {
        *lock(&self.access.permission) = state;
    }

    pub fn grant_on_request(&self, grant: bool) {
        self.access.grant_on_request.store(grant, Ordering::SeqCst);
    }

    /// Make every artifact write fail after creation.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every artifact fail to flush once its bytes are written.
    pub fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    fn ensure_present(&self) -> HandleResult<()> {
        if self.removed.load(Ordering::SeqCst) {
            Err(HandleError::NotFound)
        } else {
            Ok(())
        }
    }
}

impl DirectoryHandle for Arc<MemoryDirectory> {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn query_permission(&self) -> HandleResult<PermissionState> {
        self.ensure_present()?;
        self.access.query()
    }

    fn request_permission(&self) -> HandleResult<PermissionState> {
        self.ensure_present()?;
        self.access.request()
    }

    fn contains(&self, file_name: &str) -> HandleResult<bool> {
        self.ensure_present()?;
        Ok(lock(&self.entries).contains_key(file_name))
    }

    fn create_file(&self, file_name: &str) -> HandleResult<Box<dyn ArtifactWriter>> {
        self.ensure_present()?;
        self.access.require_granted()?;
        let mut entries = lock(&self.entries);
        if entries.contains_key(file_name) {
            return Err(HandleError::AlreadyExists);
        }
        entries.insert(file_name.to_string(), Vec::new());
        Ok(Box::new(MemoryArtifactWriter {
            directory: Arc::clone(self),
            file_name: file_name.to_string(),
            buffer: Vec::new(),
        }))
    }

    fn descriptor(&self) -> HandleDescriptor {
        HandleDescriptor {
            kind: HandleKind::Directory,
            platform: PLATFORM.into(),
            locator: self.id.clone(),
        }
    }
}

struct MemoryArtifactWriter {
    directory: Arc<MemoryDirectory>,
    file_name: String,
    buffer: Vec<u8>,
}

impl ArtifactWriter for MemoryArtifactWriter {
    fn write(&mut self, bytes: &[u8]) -> HandleResult<()> {
        if self.directory.fail_writes.load(Ordering::SeqCst) {
            return Err(HandleError::Io(std::io::Error::other("simulated write failure")));
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    fn close(self: Box<Self>) -> HandleResult<()> {
        let MemoryArtifactWriter {
            directory,
            file_name,
            buffer,
        } = *self;
        let mut entries = lock(&directory.entries);
        if directory.fail_close.load(Ordering::SeqCst) {
            entries.remove(&file_name);
            return Err(HandleError::Io(std::io::Error::other("simulated close failure")));
        }
        entries.insert(file_name, buffer);
        Ok(())
    }

    fn abort(self: Box<Self>) {
        lock(&self.directory.entries).remove(&self.file_name);
    }
}

/// Registry and resolver for memory handles.
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    files: Mutex<HashMap<String, Arc<MemoryFile>>>,
    directories: Mutex<HashMap<String, Arc<MemoryDirectory>>>,
}

impl MemoryPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn new_file(&self, name: &str, content: impl Into<Vec<u8>>) -> Arc<MemoryFile> {
        let file = Arc::new(MemoryFile {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            content: Mutex::new(Some(content.into())),
            access: Access::new(),
        });
        lock(&self.files).insert(file.id.clone(), Arc::clone(&file));
        file
    }

    pub fn new_directory(&self, name: &str) -> Arc<MemoryDirectory> {
        let directory = Arc::new(MemoryDirectory {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            entries: Mutex::new(BTreeMap::new()),
            removed: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            access: Access::new(),
        });
        lock(&self.directories).insert(directory.id.clone(), Arc::clone(&directory));
        directory
    }

    /// Forget a handle, as a host does when its backing object is gone.
    pub fn forget(&self, descriptor: &HandleDescriptor) {
        match descriptor.kind {
            HandleKind::File => {
                lock(&self.files).remove(&descriptor.locator);
            }
            HandleKind::Directory => {
                lock(&self.directories).remove(&descriptor.locator);
            }
        }
    }
}

impl HandleResolver for MemoryPlatform {
    fn file(&self, descriptor: &HandleDescriptor) -> Option<Arc<dyn FileHandle>> {
        if descriptor.kind != HandleKind::File || descriptor.platform != PLATFORM {
            return None;
        }
        lock(&self.files)
            .get(&descriptor.locator)
            .map(|file| Arc::clone(file) as Arc<dyn FileHandle>)
    }

    fn directory(&self, descriptor: &HandleDescriptor) -> Option<Arc<dyn DirectoryHandle>> {
        if descriptor.kind != HandleKind::Directory || descriptor.platform != PLATFORM {
            return None;
        }
        lock(&self.directories)
            .get(&descriptor.locator)
            .map(|dir| Arc::new(Arc::clone(dir)) as Arc<dyn DirectoryHandle>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoked_file_rejects_io() {
        let platform = MemoryPlatform::new();
        let file = platform.new_file("tracker.csv", "a,b");
        file.set_permission(PermissionState::Denied);
        assert!(matches!(file.read(), Err(HandleError::PermissionDenied)));

        file.grant_on_request(true);
        assert_eq!(file.request_permission().unwrap(), PermissionState::Granted);
        assert_eq!(file.read().unwrap(), b"a,b");
    }

    #[test]
    fn resolver_round_trips_registered_handles() {
        let platform = MemoryPlatform::new();
        let file = platform.new_file("tracker.csv", "");
        let resolved = platform.file(&file.descriptor()).expect("registered");
        assert_eq!(resolved.name(), "tracker.csv");
        assert!(platform.directory(&file.descriptor()).is_none());

        platform.forget(&file.descriptor());
        assert!(platform.file(&file.descriptor()).is_none());
    }

    #[test]
    fn artifact_is_reserved_then_committed() {
        let platform = MemoryPlatform::new();
        let dir = platform.new_directory("exports");
        let handle = dir.handle();

        let mut writer = handle.create_file("a.txt").unwrap();
        assert!(handle.contains("a.txt").unwrap());
        writer.write(b"hello").unwrap();
        writer.close().unwrap();
        assert_eq!(dir.read_entry("a.txt").unwrap(), b"hello");
    }
}
