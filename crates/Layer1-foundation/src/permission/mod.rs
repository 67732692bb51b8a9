//! Permission value types for FileShare
//!
//! - `types`: 정책(PolicyInfo), 접근 모드, 정책별 실패 결과, 앱 식별자, 사용자 디렉토리
//! - `temporary`: 다른 앱이 발급한 세션 한정 권한 (TemporaryGrants)
//!
//! 영속 권한 자체는 `storage::GrantStore`가 소유한다.

mod temporary;
mod types;

pub use temporary::TemporaryGrants;

pub use types::{
    acl, normalize_path, path_by_permission, AppIdentity, OperationMode, PathPolicy,
    PolicyErrorCode, PolicyErrorResult, PolicyInfo, PolicyType, UserDirectory, CURRENT_USER,
    MAX_POLICY_COUNT, USER_STORAGE_ROOT,
};
