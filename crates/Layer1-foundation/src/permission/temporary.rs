//! Temporary grants
//!
//! 다른 앱이 발급한 세션 한정 권한 (메모리 전용, 재시작 시 초기화).
//! 수신 앱은 이 권한으로 덮이는 경로를 영속화할 수 있다.

use super::types::{normalize_path, OperationMode, PathPolicy};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

type GrantKey = (String, PathBuf, OperationMode);

/// Session-scoped grant table shared between managers
#[derive(Debug, Default)]
pub struct TemporaryGrants {
    grants: RwLock<HashSet<GrantKey>>,
}

impl TemporaryGrants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `(path, mode)` grants for `app_id`
    pub fn grant(&self, app_id: &str, policies: &[PathPolicy]) {
        if let Ok(mut grants) = self.grants.write() {
            for policy in policies {
                grants.insert((app_id.to_string(), normalize_path(&policy.path), policy.mode));
            }
        }
    }

    /// A grant on `path` itself or on one of its ancestor directories
    pub fn is_granted(&self, app_id: &str, path: &Path, mode: OperationMode) -> bool {
        let path = normalize_path(path);
        self.grants
            .read()
            .map(|grants| {
                grants.iter().any(|(app, granted, granted_mode)| {
                    app == app_id && *granted_mode == mode && path.starts_with(granted)
                })
            })
            .unwrap_or(false)
    }

    pub fn check(&self, app_id: &str, policies: &[PathPolicy]) -> Vec<bool> {
        policies
            .iter()
            .map(|p| self.is_granted(app_id, &p.path, p.mode))
            .collect()
    }
}
