//! 브로커 공유 항목 생성 / 삭제
//!
//! 다른 앱의 파일을 대상 앱의 `<sandbox-root>/share/{r,rw}/<authority>/<path>` 에 연결한다.
//! 대상 앱의 resolver는 외부 URI를 `share/r/` 아래로 해석하므로, 공유된 파일은
//! 대상 앱에서 존재하는 경로가 되고 영속화 자격(SharedWithCaller)을 얻는다.
//!
//! 일반 파일은 하드 링크, 디렉토리(또는 하드 링크 실패 시)는 심볼릭 링크.

use super::file_uri::FileUri;
use super::resolver::UriResolver;
use fileshare_foundation::{Error, OperationMode, PolicyErrorCode, PolicyErrorResult, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Which broker directories receive an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShareFlag {
    #[default]
    ReadOnly,
    /// `r/` and `rw/`
    ReadWrite,
}

impl ShareFlag {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::ReadOnly => "r",
            Self::ReadWrite => "rw",
        }
    }
}

impl From<OperationMode> for ShareFlag {
    fn from(mode: OperationMode) -> Self {
        match mode {
            OperationMode::Read => Self::ReadOnly,
            OperationMode::Write => Self::ReadWrite,
        }
    }
}

/// Creates and removes broker share entries on behalf of file owners
#[derive(Debug, Clone)]
pub struct ShareBroker {
    resolver: UriResolver,
}

impl ShareBroker {
    pub fn new(resolver: UriResolver) -> Self {
        Self { resolver }
    }

    /// Link every URI into `target_app`'s broker directories
    ///
    /// Existing entries are replaced. URIs the target already reaches directly
    /// (its own files, media, docs in a unified namespace) get no entry.
    /// A failing URI does not stop the others; failures are returned together.
    pub fn create_share_file(
        &self,
        target_app: &str,
        uris: &[String],
        flag: ShareFlag,
    ) -> Result<Vec<PathBuf>> {
        check_request(target_app, uris)?;
        let view = self.resolver.for_app(target_app);

        let mut created = Vec::new();
        let mut failures = Vec::new();
        for uri in uris {
            match self.share_one(&view, uri, flag) {
                Ok(entries) => created.extend(entries),
                Err(code) => failures.push(PolicyErrorResult::new(uri.clone(), code)),
            }
        }

        if !failures.is_empty() {
            warn!(
                target = %target_app,
                total = uris.len(),
                rejected = failures.len(),
                "create share file failed"
            );
            return Err(Error::not_permitted(
                format!("share failed for {} of {} uris", failures.len(), uris.len()),
                failures,
            ));
        }

        info!(target = %target_app, count = created.len(), flag = flag.dir_name(), "created share files");
        Ok(created)
    }

    /// Remove the `r/` and `rw/` entries of every URI from `target_app`'s broker directories
    pub fn delete_share_file(&self, target_app: &str, uris: &[String]) -> Result<()> {
        check_request(target_app, uris)?;
        let view = self.resolver.for_app(target_app);

        for raw in uris {
            let uri = match FileUri::parse(raw) {
                Ok(uri) => uri,
                Err(e) => {
                    warn!(uri = %raw, error = %e, "skipping unparseable uri");
                    continue;
                }
            };

            for flag in [ShareFlag::ReadOnly, ShareFlag::ReadWrite] {
                let entry = view.share_entry(flag, &uri);
                if let Err(e) = remove_entry(&entry) {
                    warn!(entry = %entry.display(), error = %e, "failed to remove share entry");
                }
            }
        }

        info!(target = %target_app, count = uris.len(), "deleted share files");
        Ok(())
    }

    fn share_one(
        &self,
        view: &UriResolver,
        raw: &str,
        flag: ShareFlag,
    ) -> std::result::Result<Vec<PathBuf>, PolicyErrorCode> {
        let uri = FileUri::parse(raw).map_err(|_| PolicyErrorCode::InvalidPath)?;
        if uri.has_network_param() {
            return Err(PolicyErrorCode::InvalidPath);
        }
        if uri.is_media() || uri.authority() == view.self_app() {
            debug!(uri = %uri, "no share entry needed");
            return Ok(Vec::new());
        }

        // 소유 앱 관점의 실제 경로
        let source = self.resolver.for_app(uri.authority()).resolve_uri(&uri);
        if view.resolve_uri(&uri) == source {
            debug!(uri = %uri, "target sees the real path");
            return Ok(Vec::new());
        }
        if !source.exists() {
            debug!(uri = %uri, path = %source.display(), "share source does not exist");
            return Err(PolicyErrorCode::InvalidPath);
        }

        let read_entry = view.share_entry(ShareFlag::ReadOnly, &uri);
        let write_entry = view.share_entry(ShareFlag::ReadWrite, &uri);

        let entries = match flag {
            ShareFlag::ReadOnly => {
                remove_entry(&write_entry).map_err(|e| link_failed(&write_entry, e))?;
                vec![read_entry]
            }
            ShareFlag::ReadWrite => vec![read_entry, write_entry],
        };

        for entry in &entries {
            link_entry(&source, entry).map_err(|e| link_failed(entry, e))?;
        }
        Ok(entries)
    }
}

fn check_request(target_app: &str, uris: &[String]) -> Result<()> {
    if target_app.is_empty() {
        return Err(Error::ParameterError("Target app id is empty".to_string()));
    }
    if uris.is_empty() {
        return Err(Error::ParameterError("URI list is empty".to_string()));
    }
    Ok(())
}

fn link_failed(entry: &Path, e: io::Error) -> PolicyErrorCode {
    warn!(entry = %entry.display(), error = %e, "failed to prepare share entry");
    PolicyErrorCode::InvalidPath
}

fn link_entry(source: &Path, entry: &Path) -> io::Result<()> {
    if let Some(parent) = entry.parent() {
        fs::create_dir_all(parent)?;
    }
    remove_entry(entry)?;

    if source.is_file() && fs::hard_link(source, entry).is_ok() {
        return Ok(());
    }
    symlink(source, entry)
}

/// Remove an entry without following it; a missing entry is not an error
fn remove_entry(entry: &Path) -> io::Result<()> {
    match fs::symlink_metadata(entry) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(entry),
        Ok(_) => fs::remove_file(entry),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn symlink(source: &Path, entry: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, entry)
}

#[cfg(windows)]
fn symlink(source: &Path, entry: &Path) -> io::Result<()> {
    if source.is_dir() {
        std::os::windows::fs::symlink_dir(source, entry)
    } else {
        std::os::windows::fs::symlink_file(source, entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fileshare_foundation::{DeviceClass, Platform};
    use tempfile::TempDir;

    const OWNER: &str = "com.example.writer";
    const TARGET: &str = "com.example.reader";

    fn setup() -> (TempDir, ShareBroker, String) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = dir.path().join("owner/files/doc.txt");
        fs::create_dir_all(source.parent().expect("parent")).expect("mkdir");
        fs::write(&source, "shared").expect("write");

        let resolver = UriResolver::new(OWNER, dir.path(), &Platform::new(DeviceClass::Phone));
        let uri = format!("file://{}{}", OWNER, source.display());
        (dir, ShareBroker::new(resolver), uri)
    }

    #[test]
    fn test_read_only_share_is_visible_to_target() {
        let (_dir, broker, uri) = setup();

        let created = broker
            .create_share_file(TARGET, &[uri.clone()], ShareFlag::ReadOnly)
            .expect("Failed to share");
        assert_eq!(created.len(), 1);

        let target_view = broker.resolver.for_app(TARGET);
        let resolved = target_view.resolve(&uri).expect("resolve");
        assert_eq!(created[0], resolved);
        assert_eq!(fs::read_to_string(&resolved).expect("read entry"), "shared");
    }

    #[test]
    fn test_read_write_creates_both_entries() {
        let (_dir, broker, uri) = setup();
        let parsed = FileUri::parse(&uri).unwrap();
        let view = broker.resolver.for_app(TARGET);

        broker
            .create_share_file(TARGET, &[uri.clone()], ShareFlag::ReadWrite)
            .expect("Failed to share");
        assert!(view.share_entry(ShareFlag::ReadOnly, &parsed).exists());
        assert!(view.share_entry(ShareFlag::ReadWrite, &parsed).exists());

        // 읽기 전용으로 다시 공유하면 rw 항목은 사라진다
        broker
            .create_share_file(TARGET, &[uri], ShareFlag::ReadOnly)
            .expect("Failed to reshare");
        assert!(view.share_entry(ShareFlag::ReadOnly, &parsed).exists());
        assert!(!view.share_entry(ShareFlag::ReadWrite, &parsed).exists());
    }

    #[test]
    fn test_directory_share_and_delete() {
        let (dir, broker, _) = setup();
        let folder = dir.path().join("owner/files");
        let uri = format!("file://{}{}", OWNER, folder.display());

        let created = broker
            .create_share_file(TARGET, &[uri.clone()], ShareFlag::ReadWrite)
            .expect("Failed to share");
        assert!(created.iter().all(|entry| entry.join("doc.txt").exists()));

        broker
            .delete_share_file(TARGET, &[uri])
            .expect("Failed to delete");
        assert!(created.iter().all(|entry| !entry.exists()));
        assert!(folder.join("doc.txt").exists(), "source must survive");
    }

    #[test]
    fn test_missing_source_is_reported_without_stopping_others() {
        let (dir, broker, uri) = setup();
        let missing = format!("file://{}{}/owner/files/gone.txt", OWNER, dir.path().display());

        let err = broker
            .create_share_file(TARGET, &[missing.clone(), uri.clone()], ShareFlag::ReadOnly)
            .expect_err("missing source must fail");
        let results = err.policy_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].uri, missing);
        assert_eq!(results[0].code, PolicyErrorCode::InvalidPath);

        let resolved = broker.resolver.for_app(TARGET).resolve(&uri).expect("resolve");
        assert!(resolved.exists());
    }

    #[test]
    fn test_no_entry_needed() {
        let (_dir, broker, uri) = setup();
        let own = broker
            .create_share_file(OWNER, &[uri], ShareFlag::ReadOnly)
            .expect("own uri");
        assert!(own.is_empty());

        let media = broker
            .create_share_file(TARGET, &["file://media/Photo/1/a.jpg".to_string()], ShareFlag::ReadOnly)
            .expect("media uri");
        assert!(media.is_empty());
    }

    #[test]
    fn test_rejects_bad_requests() {
        let (_dir, broker, uri) = setup();
        assert!(matches!(
            broker.create_share_file("", &[uri.clone()], ShareFlag::ReadOnly),
            Err(Error::ParameterError(_))
        ));
        assert!(matches!(
            broker.delete_share_file(TARGET, &[]),
            Err(Error::ParameterError(_))
        ));

        let remote = format!("{}?networkid=", uri);
        let err = broker
            .create_share_file(TARGET, &[remote], ShareFlag::ReadOnly)
            .expect_err("network uri must fail");
        assert_eq!(err.policy_results()[0].code, PolicyErrorCode::InvalidPath);
    }
}
