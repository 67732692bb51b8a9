//! fileshare-core: Core Runtime for FileShare
//!
//! Layer2 - URI 해석과 영속 권한 관리
//!
//! # 주요 모듈
//!
//! - `uri`: file:// URI 파싱, 샌드박스 경로 해석, 브로커 공유 항목
//! - `permission`: 영속 권한 관리자 (FilePermissionManager)
//!
//! # 사용 예시
//!
//! ```ignore
//! use fileshare_core::{FilePermissionManager, PolicyInfo};
//! use fileshare_foundation::{GrantStore, ShareConfig, TemporaryGrants};
//!
//! let config = ShareConfig::load()?;
//! let store = Arc::new(GrantStore::open(config.data_dir()?)?);
//! let manager = FilePermissionManager::from_config(&config, store, Arc::new(TemporaryGrants::new()));
//!
//! // 즉시 실패(기기 미지원, 파라미터)는 바깥 Result, 검증 실패는 future 결과
//! manager
//!     .persist_permission(vec![PolicyInfo::read("file://docs/storage/Users/currentUser/Download/a.txt")])?
//!     .await?;
//! ```

pub mod permission;
pub mod uri;

// Re-exports: URI
pub use uri::{
    check_uri_format, is_remote_uri, FileUri, ResolveStrategy, ShareBroker, ShareFlag, UriResolver,
};

// Re-exports: Permission
pub use permission::{Entitlement, EntitlementSource, FilePermissionManager, PendingResult};

// Re-exports: Foundation value types used in the public API
pub use fileshare_foundation::{
    path_by_permission, OperationMode, PathPolicy, PolicyErrorCode, PolicyErrorResult, PolicyInfo,
    PolicyType,
};
