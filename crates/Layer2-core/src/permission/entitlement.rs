//! 영속화 자격 판정
//!
//! 호출 앱이 어떤 경로를 영속화할 수 있는지 결정한다.

use crate::uri::UriResolver;
use fileshare_foundation::permission::{CURRENT_USER, USER_STORAGE_ROOT};
use fileshare_foundation::{
    acl, AppIdentity, OperationMode, ShareConfig, TemporaryGrants, UserDirectory,
};
use std::path::{Path, PathBuf};

/// Why a path may be persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitlementSource {
    PrivateSandbox,
    UserDirectory(UserDirectory),
    SharedWithCaller,
    TemporaryGrant,
}

#[derive(Debug, Clone)]
pub struct Entitlement {
    private_root: PathBuf,
    share_root: PathBuf,
    user_storage_root: PathBuf,
    user_name: String,
}

impl Entitlement {
    pub fn new(resolver: &UriResolver) -> Self {
        Self {
            private_root: resolver.private_root(),
            share_root: resolver.share_root(),
            user_storage_root: PathBuf::from(USER_STORAGE_ROOT),
            user_name: CURRENT_USER.to_string(),
        }
    }

    pub fn from_config(resolver: &UriResolver, config: &ShareConfig) -> Self {
        Self::new(resolver).with_user_storage(config.user_storage_root(), config.user_name())
    }

    pub fn with_user_storage(mut self, root: impl Into<PathBuf>, user_name: &str) -> Self {
        self.user_storage_root = root.into();
        self.user_name = if user_name.is_empty() {
            CURRENT_USER.to_string()
        } else {
            user_name.to_string()
        };
        self
    }

    /// First rule that entitles `caller` to persist `(path, mode)`
    pub fn source(
        &self,
        caller: &AppIdentity,
        path: &Path,
        mode: OperationMode,
        temporary: &TemporaryGrants,
    ) -> Option<EntitlementSource> {
        if path.starts_with(&self.private_root) {
            return Some(EntitlementSource::PrivateSandbox);
        }

        if let Some(dir) = self.user_directory(path) {
            if caller.holds(dir.permission()) || caller.holds(acl::FILE_ACCESS_MANAGER) {
                return Some(EntitlementSource::UserDirectory(dir));
            }
        }

        if path.starts_with(&self.share_root) {
            return Some(EntitlementSource::SharedWithCaller);
        }

        if temporary.is_granted(&caller.app_id, path, mode) {
            return Some(EntitlementSource::TemporaryGrant);
        }

        None
    }

    pub fn is_entitled(
        &self,
        caller: &AppIdentity,
        path: &Path,
        mode: OperationMode,
        temporary: &TemporaryGrants,
    ) -> bool {
        self.source(caller, path, mode, temporary).is_some()
    }

    fn user_directory(&self, path: &Path) -> Option<UserDirectory> {
        UserDirectory::ALL
            .into_iter()
            .find(|dir| path.starts_with(dir.path_in(&self.user_storage_root, &self.user_name)))
    }
}
