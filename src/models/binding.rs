//! Binding metadata as stored, and binding state as reported to callers.

use serde::{Deserialize, Serialize};

use crate::{error::ErrorCode, handles::PermissionState};

/// The two independent bindings the store maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BindingScope {
    /// The tracker CSV file.
    Tracker,
    /// The directory text exports are written into.
    Output,
}

impl BindingScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingScope::Tracker => "tracker",
            BindingScope::Output => "output",
        }
    }
}

/// Human-facing record of one binding, persisted per scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BindingMeta {
    pub is_bound: bool,
    pub name: String,
    pub bound_at: Option<String>,
    /// Last successful sync (tracker) or artifact write (output).
    pub last_activity_at: Option<String>,
    pub last_error: Option<ErrorCode>,
    pub needs_rebind: bool,
}

/// Shallow patch over [`BindingMeta`]. `None` leaves a field untouched; the
/// nested `Option` on clearable fields distinguishes "clear" from "keep".
#[derive(Debug, Clone, Default)]
pub struct MetaPatch {
    pub is_bound: Option<bool>,
    pub name: Option<String>,
    pub bound_at: Option<Option<String>>,
    pub last_activity_at: Option<Option<String>>,
    pub last_error: Option<Option<ErrorCode>>,
    pub needs_rebind: Option<bool>,
}

impl MetaPatch {
    pub fn apply(self, meta: &mut BindingMeta) {
        if let Some(is_bound) = self.is_bound {
            meta.is_bound = is_bound;
        }
        if let Some(name) = self.name {
            meta.name = name;
        }
        if let Some(bound_at) = self.bound_at {
            meta.bound_at = bound_at;
        }
        if let Some(last_activity_at) = self.last_activity_at {
            meta.last_activity_at = last_activity_at;
        }
        if let Some(last_error) = self.last_error {
            meta.last_error = last_error;
        }
        if let Some(needs_rebind) = self.needs_rebind {
            meta.needs_rebind = needs_rebind;
        }
    }

    /// Patch recorded after a successful bind.
    pub fn bound(name: String, bound_at: String) -> Self {
        Self {
            is_bound: Some(true),
            name: Some(name),
            bound_at: Some(Some(bound_at)),
            last_error: Some(None),
            needs_rebind: Some(false),
            ..Default::default()
        }
    }

    /// Patch recorded after a successful sync or write.
    pub fn activity(at: String) -> Self {
        Self {
            last_activity_at: Some(Some(at)),
            last_error: Some(None),
            needs_rebind: Some(false),
            ..Default::default()
        }
    }

    /// Patch recording a classified failure.
    pub fn failure(code: ErrorCode) -> Self {
        Self {
            last_error: Some(Some(code)),
            needs_rebind: code.needs_rebind().then_some(true),
            ..Default::default()
        }
    }
}

/// Result of a successful bind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindOutcome {
    pub name: String,
    pub bound_at: String,
}

/// Scope-neutral outcome of binding resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBinding {
    pub is_bound: bool,
    pub name: String,
    pub bound_at: Option<String>,
    pub last_activity_at: Option<String>,
    pub last_error: Option<ErrorCode>,
    pub needs_rebind: bool,
    pub permission: Option<PermissionState>,
}

/// State of the tracker CSV binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingState {
    pub is_bound: bool,
    pub file_name: String,
    pub bound_at: Option<String>,
    pub last_sync_at: Option<String>,
    pub last_error: Option<ErrorCode>,
    pub needs_rebind: bool,
    pub permission: Option<PermissionState>,
}

impl From<ResolvedBinding> for BindingState {
    fn from(resolved: ResolvedBinding) -> Self {
        Self {
            is_bound: resolved.is_bound,
            file_name: resolved.name,
            bound_at: resolved.bound_at,
            last_sync_at: resolved.last_activity_at,
            last_error: resolved.last_error,
            needs_rebind: resolved.needs_rebind,
            permission: resolved.permission,
        }
    }
}

/// State of the output directory binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputBindingState {
    pub is_bound: bool,
    pub directory_name: String,
    pub bound_at: Option<String>,
    pub last_write_at: Option<String>,
    pub last_error: Option<ErrorCode>,
    pub needs_rebind: bool,
    pub permission: Option<PermissionState>,
}

impl From<ResolvedBinding> for OutputBindingState {
    fn from(resolved: ResolvedBinding) -> Self {
        Self {
            is_bound: resolved.is_bound,
            directory_name: resolved.name,
            bound_at: resolved.bound_at,
            last_write_at: resolved.last_activity_at,
            last_error: resolved.last_error,
            needs_rebind: resolved.needs_rebind,
            permission: resolved.permission,
        }
    }
}
