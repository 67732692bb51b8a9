//! Device capability - 기기 종류 감지
//!
//! 영속 권한 지원 여부와 경로 네임스페이스(통합 / 샌드박스 재매핑)를 결정합니다.

use std::env;
use std::fmt;

/// Environment variable overriding the configured device class
pub const DEVICE_TYPE_ENV: &str = "FILESHARE_DEVICE_TYPE";

/// 기기 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceClass {
    #[default]
    Phone,
    Tablet,
    TwoInOne,
    Wearable,
    Tv,
    Unknown,
}

impl DeviceClass {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "phone" | "default" => Self::Phone,
            "tablet" => Self::Tablet,
            "2in1" | "2-in-1" | "pc" => Self::TwoInOne,
            "wearable" => Self::Wearable,
            "tv" => Self::Tv,
            _ => Self::Unknown,
        }
    }

    /// `FILESHARE_DEVICE_TYPE`, if set
    pub fn from_env() -> Option<Self> {
        env::var(DEVICE_TYPE_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| Self::parse(&v))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Tablet => "tablet",
            Self::TwoInOne => "2in1",
            Self::Wearable => "wearable",
            Self::Tv => "tv",
            Self::Unknown => "unknown",
        }
    }

    pub fn supports_persistent_permission(&self) -> bool {
        matches!(self, Self::Phone | Self::Tablet | Self::TwoInOne)
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Capability answers for the current device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Platform {
    pub device_class: DeviceClass,
    pub full_mount_enabled: bool,
    permission_override: Option<bool>,
}

impl Platform {
    pub fn new(device_class: DeviceClass) -> Self {
        Self {
            device_class,
            full_mount_enabled: false,
            permission_override: None,
        }
    }

    pub fn with_full_mount(mut self, enabled: bool) -> Self {
        self.full_mount_enabled = enabled;
        self
    }

    /// Force the persistent-permission capability regardless of device class
    pub fn with_permission_override(mut self, supported: Option<bool>) -> Self {
        self.permission_override = supported;
        self
    }

    pub fn supports_persistent_permission(&self) -> bool {
        self.permission_override
            .unwrap_or_else(|| self.device_class.supports_persistent_permission())
    }

    /// Shared user storage is visible at its real path
    pub fn is_unified_namespace(&self) -> bool {
        self.device_class == DeviceClass::TwoInOne || self.full_mount_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_class() {
        assert_eq!(DeviceClass::parse("default"), DeviceClass::Phone);
        assert_eq!(DeviceClass::parse("2in1"), DeviceClass::TwoInOne);
        assert_eq!(DeviceClass::parse("PC"), DeviceClass::TwoInOne);
        assert_eq!(DeviceClass::parse("fridge"), DeviceClass::Unknown);
    }

    #[test]
    fn test_capability() {
        assert!(Platform::new(DeviceClass::Tablet).supports_persistent_permission());
        assert!(!Platform::new(DeviceClass::Wearable).supports_persistent_permission());
        assert!(Platform::new(DeviceClass::Tv)
            .with_permission_override(Some(true))
            .supports_persistent_permission());
        assert!(!Platform::new(DeviceClass::Phone)
            .with_permission_override(Some(false))
            .supports_persistent_permission());
    }

    #[test]
    fn test_namespace() {
        assert!(Platform::new(DeviceClass::TwoInOne).is_unified_namespace());
        assert!(!Platform::new(DeviceClass::Phone).is_unified_namespace());
        assert!(Platform::new(DeviceClass::Phone)
            .with_full_mount(true)
            .is_unified_namespace());
    }
}
