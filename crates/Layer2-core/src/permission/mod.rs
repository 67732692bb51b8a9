//! Persistent permission management
//!
//! - `manager`: FilePermissionManager (persist / revoke / activate / deactivate / check)
//! - `entitlement`: 호출 앱의 영속화 자격 판정

mod entitlement;
mod manager;

pub use entitlement::{Entitlement, EntitlementSource};
pub use manager::{FilePermissionManager, PendingResult};
