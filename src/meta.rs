use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use crate::{
    log_warn,
    models::{BindingMeta, BindingScope, MetaPatch},
};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct MetaFile {
    tracker: BindingMeta,
    output: BindingMeta,
}

impl MetaFile {
    fn scope(&self, scope: BindingScope) -> &BindingMeta {
        match scope {
            BindingScope::Tracker => &self.tracker,
            BindingScope::Output => &self.output,
        }
    }

    fn scope_mut(&mut self, scope: BindingScope) -> &mut BindingMeta {
        match scope {
            BindingScope::Tracker => &mut self.tracker,
            BindingScope::Output => &mut self.output,
        }
    }
}

/// Per-scope binding metadata, written through to a JSON file on every update.
pub struct BindingMetaStore {
    path: PathBuf,
    data: RwLock<MetaFile>,
}

impl BindingMetaStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path).with_context(|| {
                format!("Failed to read binding metadata from {}", path.display())
            })?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!(
                    "binding metadata at {} is unreadable ({err}); starting from defaults",
                    path.display()
                );
                MetaFile::default()
            })
        } else {
            MetaFile::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Current metadata for `scope`; defaults when nothing was ever stored.
    pub fn get(&self, scope: BindingScope) -> BindingMeta {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .scope(scope)
            .clone()
    }

    /// Merge `patch` over the stored value, persist, and return the result.
    pub fn update(&self, scope: BindingScope, patch: MetaPatch) -> Result<BindingMeta> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        patch.apply(next.scope_mut(scope));
        self.persist(&next)?;
        *guard = next;
        Ok(guard.scope(scope).clone())
    }

    fn persist(&self, data: &MetaFile) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let write = || -> std::io::Result<()> {
            let mut file = AtomicWriteFile::open(&self.path)?;
            file.write_all(serialized.as_bytes())?;
            file.commit()
        };
        write().with_context(|| {
            format!("Failed to write binding metadata to {}", self.path.display())
        })
    }
}
