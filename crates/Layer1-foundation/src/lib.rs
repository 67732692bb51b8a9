//! # fileshare-foundation
//!
//! Foundation layer for FileShare:
//! - Permission: 정책 / 접근 모드 / 앱 식별자 / 임시 권한
//! - Storage: SQLite (영속 권한), JsonStore (설정)
//! - Config: ShareConfig (글로벌 + 프로젝트 병합)
//! - Device: 기기 종류와 영속 권한 지원 여부
//!
//! ## 아키텍처
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  fileshare-core                               │
//! │  ├── UriResolver (file:// → sandbox path)     │
//! │  └── FilePermissionManager                    │
//! │                     │                         │
//! │                     ▼                         │
//! │  fileshare-foundation                         │
//! │  ├── GrantStore (grants.db)                   │
//! │  ├── TemporaryGrants (session)                │
//! │  └── ShareConfig / Platform                   │
//! └──────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod permission;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{codes as error_codes, Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{ShareConfig, DEFAULT_APP_ID, DEFAULT_SANDBOX_ROOT, SHARE_CONFIG_FILE};

// ============================================================================
// Device (기기 종류)
// ============================================================================
pub use device::{DeviceClass, Platform};

// ============================================================================
// Permission (정책 타입)
// ============================================================================
pub use permission::{
    acl, normalize_path, path_by_permission, AppIdentity, OperationMode, PathPolicy,
    PolicyErrorCode, PolicyErrorResult, PolicyInfo, PolicyType, TemporaryGrants, UserDirectory,
    MAX_POLICY_COUNT,
};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{BatchOutcome, ConfigScope, GrantKey, GrantStore, JsonStore, PersistedGrant};
