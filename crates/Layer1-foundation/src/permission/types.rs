//! 권한 타입 정의
//!
//! URI 정책(PolicyInfo), 접근 모드, 정책별 실패 결과, 호출 앱 식별자

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Maximum number of policies accepted in one request
pub const MAX_POLICY_COUNT: usize = 500;

/// Access mode of a policy. Values match the wire bit codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    Read,
    Write,
}

impl OperationMode {
    pub const READ_CODE: u32 = 1 << 0;
    pub const WRITE_CODE: u32 = 1 << 1;

    pub fn code(&self) -> u32 {
        match self {
            Self::Read => Self::READ_CODE,
            Self::Write => Self::WRITE_CODE,
        }
    }

    /// Parse a raw bit code; anything but a single known bit is rejected.
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            Self::READ_CODE => Ok(Self::Read),
            Self::WRITE_CODE => Ok(Self::Write),
            other => Err(Error::ParameterError(format!(
                "Invalid operation mode: {}",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for OperationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" | "r" | "1" => Ok(Self::Read),
            "write" | "w" | "2" => Ok(Self::Write),
            other => Err(Error::ParameterError(format!(
                "Invalid operation mode: {}",
                other
            ))),
        }
    }
}

/// A requested (uri, mode) pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct PolicyInfo {
    pub uri: String,
    pub operation_mode: OperationMode,
}

impl PolicyInfo {
    pub fn new(uri: impl Into<String>, operation_mode: OperationMode) -> Self {
        Self {
            uri: uri.into(),
            operation_mode,
        }
    }

    pub fn read(uri: impl Into<String>) -> Self {
        Self::new(uri, OperationMode::Read)
    }

    pub fn write(uri: impl Into<String>) -> Self {
        Self::new(uri, OperationMode::Write)
    }
}

/// An already-resolved (path, mode) pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PathPolicy {
    pub path: PathBuf,
    pub mode: OperationMode,
}

impl PathPolicy {
    pub fn new(path: impl Into<PathBuf>, mode: OperationMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }
}

/// Lexical form of a path: `.` segments, repeated and trailing separators dropped
///
/// `..` is kept as-is; URIs carrying it are rejected before resolution.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Which grant table a path check consults
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    Temporary,
    Persistent,
}

/// Reason a single policy was rejected
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyErrorCode {
    PersistenceForbidden,
    InvalidPath,
    PermissionNotPersisted,
}

impl PolicyErrorCode {
    pub fn code(&self) -> u32 {
        match self {
            Self::PersistenceForbidden => 1,
            Self::InvalidPath => 3,
            Self::PermissionNotPersisted => 4,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::PersistenceForbidden => "URI forbid to be persisted!",
            Self::InvalidPath => "Invalid path!",
            Self::PermissionNotPersisted => "The policy is no persistent capability!",
        }
    }
}

/// Per-policy failure carried by `Error::OperationNotPermitted`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyErrorResult {
    pub uri: String,
    pub code: PolicyErrorCode,
    pub message: String,
}

impl PolicyErrorResult {
    pub fn new(uri: impl Into<String>, code: PolicyErrorCode) -> Self {
        Self {
            uri: uri.into(),
            code,
            message: code.message().to_string(),
        }
    }
}

// ============================================================
// 호출 앱 식별자
// ============================================================

/// The calling application and the access-control permissions it holds
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppIdentity {
    pub app_id: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl AppIdentity {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn holds(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

// ============================================================
// 사용자 디렉토리 / ACL 권한 이름
// ============================================================

pub mod acl {
    pub const READ_WRITE_DOWNLOAD_DIRECTORY: &str = "ohos.permission.READ_WRITE_DOWNLOAD_DIRECTORY";
    pub const READ_WRITE_DESKTOP_DIRECTORY: &str = "ohos.permission.READ_WRITE_DESKTOP_DIRECTORY";
    pub const READ_WRITE_DOCUMENTS_DIRECTORY: &str =
        "ohos.permission.READ_WRITE_DOCUMENTS_DIRECTORY";
    pub const FILE_ACCESS_MANAGER: &str = "ohos.permission.FILE_ACCESS_MANAGER";
    pub const SET_SANDBOX_POLICY: &str = "ohos.permission.SET_SANDBOX_POLICY";
    pub const CHECK_SANDBOX_POLICY: &str = "ohos.permission.CHECK_SANDBOX_POLICY";
}

/// Root of the shared user storage namespace
pub const USER_STORAGE_ROOT: &str = "/storage/Users";

/// Placeholder user name used when none is configured
pub const CURRENT_USER: &str = "currentUser";

/// Well-known user directories gated by a directory permission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserDirectory {
    Download,
    Desktop,
    Documents,
}

impl UserDirectory {
    pub const ALL: [UserDirectory; 3] = [Self::Download, Self::Desktop, Self::Documents];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Download => "Download",
            Self::Desktop => "Desktop",
            Self::Documents => "Documents",
        }
    }

    pub fn permission(&self) -> &'static str {
        match self {
            Self::Download => acl::READ_WRITE_DOWNLOAD_DIRECTORY,
            Self::Desktop => acl::READ_WRITE_DESKTOP_DIRECTORY,
            Self::Documents => acl::READ_WRITE_DOCUMENTS_DIRECTORY,
        }
    }

    pub fn from_permission(permission: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.permission() == permission)
    }

    /// `<root>/<user>/<dir>`; an empty user maps to `currentUser`
    pub fn path_in(&self, root: &Path, user: &str) -> PathBuf {
        let user = if user.is_empty() { CURRENT_USER } else { user };
        root.join(user).join(self.dir_name())
    }
}

/// Directory a directory permission unlocks, or an empty string for unknown permissions
pub fn path_by_permission(user: &str, permission: &str) -> String {
    UserDirectory::from_permission(permission)
        .map(|dir| {
            dir.path_in(Path::new(USER_STORAGE_ROOT), user)
                .to_string_lossy()
                .into_owned()
        })
        .unwrap_or_default()
}
