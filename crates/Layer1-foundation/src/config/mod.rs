//! Config - 설정 관리
//!
//! - `share.rs` - ShareConfig (앱 id, 샌드박스 경로, 기기 종류, 제한)

mod share;

pub use share::{
    ShareConfig, APP_ID_ENV, DEFAULT_APP_ID, DEFAULT_SANDBOX_ROOT, SHARE_CONFIG_FILE,
};
