//! URI → canonical sandbox path
//!
//! 해석은 파일시스템에 접근하지 않는다 (`full_directory_uri` 제외).
//! 결과 경로는 항상 정규화된다: `.`, 연속 `/`, 끝 `/` 제거.

use super::file_uri::{FileUri, DOCS_AUTHORITY, MEDIA_AUTHORITY};
use super::share::ShareFlag;
use fileshare_foundation::{normalize_path, Error, Platform, Result, ShareConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

/// How `docs` URIs map onto the caller's view of the filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStrategy {
    /// Shared storage is reachable only through the broker prefix
    SandboxRemap,
    /// Shared storage is mounted at its real path (2-in-1, full mount)
    UnifiedNamespace,
}

impl ResolveStrategy {
    pub fn for_platform(platform: &Platform) -> Self {
        if platform.is_unified_namespace() {
            Self::UnifiedNamespace
        } else {
            Self::SandboxRemap
        }
    }
}

/// Resolves file URIs for one calling app
#[derive(Debug, Clone)]
pub struct UriResolver {
    self_app: String,
    sandbox_root: PathBuf,
    strategy: ResolveStrategy,
}

impl UriResolver {
    pub fn new(
        self_app: impl Into<String>,
        sandbox_root: impl Into<PathBuf>,
        platform: &Platform,
    ) -> Self {
        Self::with_strategy(self_app, sandbox_root, ResolveStrategy::for_platform(platform))
    }

    pub fn with_strategy(
        self_app: impl Into<String>,
        sandbox_root: impl Into<PathBuf>,
        strategy: ResolveStrategy,
    ) -> Self {
        Self {
            self_app: self_app.into(),
            sandbox_root: sandbox_root.into(),
            strategy,
        }
    }

    pub fn from_config(config: &ShareConfig) -> Self {
        Self::new(config.app_id(), config.sandbox_root(), &config.platform())
    }

    /// Same strategy and sandbox layout, seen from another app
    pub fn for_app(&self, app_id: impl Into<String>) -> Self {
        Self {
            self_app: app_id.into(),
            ..self.clone()
        }
    }

    pub fn self_app(&self) -> &str {
        &self.self_app
    }

    pub fn strategy(&self) -> ResolveStrategy {
        self.strategy
    }

    pub fn sandbox_root(&self) -> &Path {
        &self.sandbox_root
    }

    /// `<sandbox-root>/base`
    pub fn private_root(&self) -> PathBuf {
        self.sandbox_root.join("base")
    }

    /// `<sandbox-root>/share`
    pub fn share_root(&self) -> PathBuf {
        self.sandbox_root.join("share")
    }

    /// `<sandbox-root>/share/r`
    pub fn broker_root(&self) -> PathBuf {
        self.share_root().join(ShareFlag::ReadOnly.dir_name())
    }

    /// `<sandbox-root>/share/<r|rw>/[<network-id>/]<authority>/<path>`
    pub fn share_entry(&self, flag: ShareFlag, uri: &FileUri) -> PathBuf {
        let mut base = self.share_root().join(flag.dir_name());
        if let Some(id) = uri.network_id() {
            base.push(id);
        }
        base.push(uri.authority());
        normalize_path(&join_relative(base, uri.decoded_path()))
    }

    /// `<sandbox-root>/media`
    pub fn media_root(&self) -> PathBuf {
        self.sandbox_root.join("media")
    }

    pub fn resolve(&self, uri: &str) -> Result<PathBuf> {
        let parsed = FileUri::parse(uri)?;
        Ok(self.resolve_uri(&parsed))
    }

    pub fn resolve_uri(&self, uri: &FileUri) -> PathBuf {
        let path = uri.decoded_path();

        let resolved = match (uri.authority(), uri.is_remote()) {
            (authority, false) if authority == self.self_app => normalize_path(Path::new(path)),
            (MEDIA_AUTHORITY, false) => normalize_path(&join_relative(self.media_root(), path)),
            (DOCS_AUTHORITY, false) if self.strategy == ResolveStrategy::UnifiedNamespace => {
                normalize_path(Path::new(path))
            }
            _ => self.share_entry(ShareFlag::ReadOnly, uri),
        };

        debug!(uri = %uri, path = %resolved.display(), "resolved uri");
        resolved
    }

    /// Directory URI for a file (up to its last '/') or the URI itself for a directory
    pub fn full_directory_uri(&self, uri: &str) -> Result<String> {
        let parsed = FileUri::parse(uri)?;
        let path = self.resolve_uri(&parsed);
        let metadata = std::fs::metadata(&path)
            .map_err(|e| Error::InvalidUri(format!("{} ({}): {}", uri, path.display(), e)))?;

        if metadata.is_dir() {
            Ok(uri.to_string())
        } else if metadata.is_file() {
            let end = uri.rfind('/').unwrap_or(uri.len());
            Ok(uri[..end].to_string())
        } else {
            Err(Error::InvalidUri(format!(
                "neither file nor directory: {}",
                path.display()
            )))
        }
    }
}

fn join_relative(mut base: PathBuf, path: &str) -> PathBuf {
    let relative = path.trim_start_matches('/');
    if !relative.is_empty() {
        base.push(relative);
    }
    base
}
