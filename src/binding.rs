//! Binding state resolution.
//!
//! Combines stored metadata with what the vault and a live permission probe
//! report right now. [`resolve`] owns no data and has no side effects; the
//! caller decides whether to cache the derived `needs_rebind` flag back into
//! metadata.

use crate::{
    handles::{HandleError, HandleResult, PermissionState},
    models::{BindingMeta, ResolvedBinding},
    utils::run_blocking,
};

/// What the vault yielded for a scope, plus the probe result if it yielded
/// anything.
#[derive(Debug)]
pub enum HandleProbe {
    Absent,
    Present {
        name: String,
        permission: HandleResult<PermissionState>,
    },
}

impl HandleProbe {
    /// Run a permission `query` off the executor. A probe that cannot even be
    /// scheduled counts as a failed probe.
    pub async fn probe<Q>(name: String, query: Q) -> Self
    where
        Q: FnOnce() -> HandleResult<PermissionState> + Send + 'static,
    {
        let permission = run_blocking("permission probe", move || anyhow::Ok(query()))
            .await
            .unwrap_or_else(|err| Err(HandleError::Invalid(format!("{err:#}"))));
        HandleProbe::Present { name, permission }
    }
}

pub fn resolve(meta: &BindingMeta, probe: HandleProbe) -> ResolvedBinding {
    let mut needs_rebind = false;
    let mut is_bound = false;
    let mut permission = None;
    let mut name = meta.name.clone();

    match probe {
        HandleProbe::Absent => {
            if meta.is_bound {
                needs_rebind = true;
            }
        }
        HandleProbe::Present {
            name: handle_name,
            permission: probed,
        } => {
            is_bound = true;
            if name.is_empty() {
                name = handle_name;
            }
            match probed {
                Ok(PermissionState::Granted) => permission = Some(PermissionState::Granted),
                Ok(other) => {
                    permission = Some(other);
                    needs_rebind = true;
                }
                // Unknown permission.
                Err(_) => needs_rebind = true,
            }
        }
    }

    if meta.last_error.is_some_and(|code| code.needs_rebind()) {
        needs_rebind = true;
    }

    ResolvedBinding {
        is_bound,
        name,
        bound_at: meta.bound_at.clone(),
        last_activity_at: meta.last_activity_at.clone(),
        last_error: meta.last_error,
        needs_rebind,
        permission,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorCode, handles::HandleError};

    fn bound_meta() -> BindingMeta {
        BindingMeta {
            is_bound: true,
            name: "jobs.csv".into(),
            bound_at: Some("2024-01-01T00:00:00.000Z".into()),
            ..Default::default()
        }
    }

    fn present(permission: HandleResult<PermissionState>) -> HandleProbe {
        HandleProbe::Present {
            name: "jobs.csv".into(),
            permission,
        }
    }

    #[test]
    fn never_bound_is_quiet() {
        let state = resolve(&BindingMeta::default(), HandleProbe::Absent);
        assert!(!state.is_bound);
        assert!(!state.needs_rebind);
        assert_eq!(state.permission, None);
    }

    #[test]
    fn vanished_handle_needs_rebind() {
        let state = resolve(&bound_meta(), HandleProbe::Absent);
        assert!(!state.is_bound);
        assert!(state.needs_rebind);
    }

    #[test]
    fn granted_handle_is_healthy() {
        let state = resolve(&bound_meta(), present(Ok(PermissionState::Granted)));
        assert!(state.is_bound);
        assert!(!state.needs_rebind);
        assert_eq!(state.permission, Some(PermissionState::Granted));
    }

    #[test]
    fn denied_or_prompt_keeps_bound_but_needs_rebind() {
        for permission in [PermissionState::Denied, PermissionState::Prompt] {
            let state = resolve(&bound_meta(), present(Ok(permission)));
            assert!(state.is_bound);
            assert!(state.needs_rebind);
            assert_eq!(state.permission, Some(permission));
        }
    }

    #[test]
    fn probe_failure_is_unknown_permission() {
        let state = resolve(&bound_meta(), present(Err(HandleError::NotFound)));
        assert!(state.is_bound);
        assert!(state.needs_rebind);
        assert_eq!(state.permission, None);
    }

    #[test]
    fn sticky_error_overrides_healthy_probe() {
        let meta = BindingMeta {
            last_error: Some(ErrorCode::FileNotFound),
            ..bound_meta()
        };
        let state = resolve(&meta, present(Ok(PermissionState::Granted)));
        assert!(state.needs_rebind);

        let transient = BindingMeta {
            last_error: Some(ErrorCode::UnknownError),
            ..bound_meta()
        };
        let state = resolve(&transient, present(Ok(PermissionState::Granted)));
        assert!(!state.needs_rebind);
    }

    #[tokio::test]
    async fn probe_runs_the_query() {
        let probe = HandleProbe::probe("jobs.csv".into(), || Ok(PermissionState::Prompt)).await;
        let state = resolve(&bound_meta(), probe);
        assert_eq!(state.permission, Some(PermissionState::Prompt));
        assert!(state.needs_rebind);
    }

    #[test]
    fn handle_name_fills_missing_display_name() {
        let state = resolve(
            &BindingMeta::default(),
            HandleProbe::Present {
                name: "picked.csv".into(),
                permission: Ok(PermissionState::Granted),
            },
        );
        assert_eq!(state.name, "picked.csv");
    }
}
