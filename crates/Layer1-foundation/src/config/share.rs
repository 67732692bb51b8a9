//! Share Config - 파일 공유 서비스 설정
//!
//! 글로벌(<config_dir>/fileshare/) + 프로젝트(.fileshare/) 병합, 프로젝트 우선

use crate::device::{DeviceClass, Platform};
use crate::permission::{AppIdentity, MAX_POLICY_COUNT, USER_STORAGE_ROOT};
use crate::storage::{ConfigScope, JsonStore};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// 설정 파일명
pub const SHARE_CONFIG_FILE: &str = "fileshare.json";

/// Environment variable overriding the calling app id
pub const APP_ID_ENV: &str = "FILESHARE_APP_ID";

pub const DEFAULT_APP_ID: &str = "com.fileshare.cli";
pub const DEFAULT_SANDBOX_ROOT: &str = "/data/storage/el2";

/// 파일 공유 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareConfig {
    /// 호출 앱 id (URI authority)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    /// 사용자 디렉토리 이름 (없으면 currentUser)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_root: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_storage_root: Option<PathBuf>,

    /// grants.db 위치
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_mount_enabled: Option<bool>,

    /// 기기 종류와 무관하게 영속 권한 지원 여부 강제
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_supported: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_policies: Option<usize>,

    /// 앱이 보유한 ACL 권한 이름
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub granted_permissions: BTreeSet<String>,
}

impl ShareConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드, 환경변수 적용
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        for scope in [ConfigScope::Global, ConfigScope::Project] {
            if let Ok(store) = JsonStore::for_scope(scope) {
                config.merge(Self::load_from(&store)?);
            }
        }

        config.apply_env();
        Ok(config)
    }

    /// 지정한 저장소에서만 로드 (파일이 없으면 기본값)
    pub fn load_from(store: &JsonStore) -> Result<Self> {
        Ok(store.read::<ShareConfig>(SHARE_CONFIG_FILE)?.unwrap_or_default())
    }

    /// 지정한 저장소에 저장, 저장된 파일 경로 반환
    pub fn save_to(&self, store: &JsonStore) -> Result<PathBuf> {
        store.write(SHARE_CONFIG_FILE, self)
    }

    pub fn save(&self, scope: ConfigScope) -> Result<PathBuf> {
        self.save_to(&JsonStore::for_scope(scope)?)
    }

    fn apply_env(&mut self) {
        if let Some(class) = DeviceClass::from_env() {
            self.device_type = Some(class.name().to_string());
        }
        if let Ok(app_id) = std::env::var(APP_ID_ENV) {
            if !app_id.trim().is_empty() {
                self.app_id = Some(app_id);
            }
        }
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 다른 설정과 병합 (other가 우선)
    pub fn merge(&mut self, other: ShareConfig) {
        if other.app_id.is_some() {
            self.app_id = other.app_id;
        }
        if other.user_name.is_some() {
            self.user_name = other.user_name;
        }
        if other.sandbox_root.is_some() {
            self.sandbox_root = other.sandbox_root;
        }
        if other.user_storage_root.is_some() {
            self.user_storage_root = other.user_storage_root;
        }
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
        if other.device_type.is_some() {
            self.device_type = other.device_type;
        }
        if other.full_mount_enabled.is_some() {
            self.full_mount_enabled = other.full_mount_enabled;
        }
        if other.permission_supported.is_some() {
            self.permission_supported = other.permission_supported;
        }
        if other.max_policies.is_some() {
            self.max_policies = other.max_policies;
        }
        self.granted_permissions.extend(other.granted_permissions);
    }

    // ========================================================================
    // Resolved values
    // ========================================================================

    pub fn app_id(&self) -> &str {
        self.app_id.as_deref().unwrap_or(DEFAULT_APP_ID)
    }

    pub fn user_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or_default()
    }

    pub fn sandbox_root(&self) -> PathBuf {
        self.sandbox_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SANDBOX_ROOT))
    }

    pub fn user_storage_root(&self) -> PathBuf {
        self.user_storage_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(USER_STORAGE_ROOT))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_local_dir()
            .map(|d| d.join("fileshare"))
            .ok_or_else(|| Error::Config("Cannot find data directory".to_string()))
    }

    pub fn max_policies(&self) -> usize {
        self.max_policies.unwrap_or(MAX_POLICY_COUNT)
    }

    pub fn device_class(&self) -> DeviceClass {
        self.device_type
            .as_deref()
            .map(DeviceClass::parse)
            .unwrap_or_default()
    }

    pub fn platform(&self) -> Platform {
        Platform::new(self.device_class())
            .with_full_mount(self.full_mount_enabled.unwrap_or(false))
            .with_permission_override(self.permission_supported)
    }

    pub fn identity(&self) -> AppIdentity {
        AppIdentity::new(self.app_id()).with_permissions(self.granted_permissions.iter().cloned())
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }

    pub fn with_sandbox_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sandbox_root = Some(root.into());
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }
}
