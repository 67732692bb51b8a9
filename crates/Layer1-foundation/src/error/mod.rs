//! Error types for FileShare
//!
//! 모든 에러를 중앙에서 관리

use crate::permission::PolicyErrorResult;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric codes surfaced to callers (CLI exit output, bindings)
pub mod codes {
    pub const PERMISSION_DENIED: i32 = 201;
    pub const PARAMETER_ERROR: i32 = 401;
    pub const DEVICE_NOT_SUPPORTED: i32 = 801;
    pub const OPERATION_NOT_PERMITTED: i32 = 13900001;
    pub const INVALID_ARGUMENT: i32 = 13900020;
    pub const UNKNOWN_ERROR: i32 = 13900042;
}

/// FileShare 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // URI / 파라미터
    // ========================================================================
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    // ========================================================================
    // 권한 관련
    // ========================================================================
    #[error("Device not supported: persistent permission is unavailable on this device")]
    UnsupportedDevice,

    #[error("Operation not permitted: {message}")]
    OperationNotPermitted {
        message: String,
        results: Vec<PolicyErrorResult>,
    },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // ========================================================================
    // 설정 / 저장소
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Numeric error code for this failure
    pub fn code(&self) -> i32 {
        match self {
            Error::PermissionDenied(_) => codes::PERMISSION_DENIED,
            Error::ParameterError(_) => codes::PARAMETER_ERROR,
            Error::UnsupportedDevice => codes::DEVICE_NOT_SUPPORTED,
            Error::OperationNotPermitted { .. } => codes::OPERATION_NOT_PERMITTED,
            Error::InvalidUri(_) => codes::INVALID_ARGUMENT,
            _ => codes::UNKNOWN_ERROR,
        }
    }

    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::InvalidUri(_)
                | Error::ParameterError(_)
                | Error::UnsupportedDevice
                | Error::OperationNotPermitted { .. }
                | Error::PermissionDenied(_)
        )
    }

    /// OperationNotPermitted 에러 생성 헬퍼
    pub fn not_permitted(message: impl Into<String>, results: Vec<PolicyErrorResult>) -> Self {
        Error::OperationNotPermitted {
            message: message.into(),
            results,
        }
    }

    /// Per-policy failures attached to an `OperationNotPermitted` error
    pub fn policy_results(&self) -> &[PolicyErrorResult] {
        match self {
            Error::OperationNotPermitted { results, .. } => results,
            _ => &[],
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::PolicyErrorCode;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::UnsupportedDevice.code(), 801);
        assert_eq!(Error::ParameterError("empty".into()).code(), 401);
        assert_eq!(Error::not_permitted("denied", vec![]).code(), 13900001);
        assert_eq!(Error::Storage("disk".into()).code(), codes::UNKNOWN_ERROR);
    }

    #[test]
    fn test_policy_results() {
        let err = Error::not_permitted(
            "persist failed",
            vec![PolicyErrorResult::new("file://a/x", PolicyErrorCode::InvalidPath)],
        );
        assert_eq!(err.policy_results().len(), 1);
        assert!(err.is_user_facing());
        assert!(Error::Internal("x".into()).policy_results().is_empty());
    }
}
