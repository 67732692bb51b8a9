//! Storage module for FileShare
//!
//! - `db`: SQLite - 영속 권한 (persisted grants)
//! - `json`: JSON - 설정 파일 저장/로드

mod db;
mod json;

// SQLite Storage (persisted grants)
pub use db::{BatchOutcome, GrantKey, GrantStore, PersistedGrant, GRANTS_DB_FILE};

// JSON Storage (설정)
pub use json::{ConfigScope, JsonStore, CONFIG_DIR_NAME};
