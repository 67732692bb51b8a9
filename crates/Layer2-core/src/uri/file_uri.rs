//! file:// URI 파싱
//!
//! `file://<authority>/<path>[?networkid=<id>]`

use super::codec::{decode_path, encode_path};
use fileshare_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const FILE_SCHEME_PREFIX: &str = "file://";
pub const MEDIA_AUTHORITY: &str = "media";
pub const DOCS_AUTHORITY: &str = "docs";
pub const NETWORK_ID_KEY: &str = "networkid";

/// Real-path prefix of the media library
pub const MEDIA_FUSE_HEAD: &str = "/data/storage/el2/media";
/// Real-path prefix of shared user storage
pub const USER_STORAGE_HEAD: &str = "/storage/";

/// Parsed file URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUri {
    raw: String,
    authority: String,
    /// decoded path, always starts with '/'
    path: String,
    query: Option<String>,
}

impl FileUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix(FILE_SCHEME_PREFIX)
            .ok_or_else(|| Error::InvalidUri(format!("missing file:// scheme: {}", uri)))?;

        let (location, query) = match rest.split_once('?') {
            Some((location, query)) => (location, Some(query.to_string())),
            None => (rest, None),
        };

        let slash = location
            .find('/')
            .ok_or_else(|| Error::InvalidUri(format!("missing path: {}", uri)))?;
        let (authority, encoded_path) = location.split_at(slash);
        if authority.is_empty() {
            return Err(Error::InvalidUri(format!("empty authority: {}", uri)));
        }

        let path = decode_path(encoded_path)?.into_owned();
        if has_traversal(&path) {
            return Err(Error::InvalidUri(format!("path traversal: {}", uri)));
        }

        Ok(Self {
            raw: uri.to_string(),
            authority: authority.to_string(),
            path,
            query,
        })
    }

    /// Build a URI for a real path as seen by `self_app`
    ///
    /// `/storage/...` maps to `docs`, the media library to `media`,
    /// anything else to the caller's own authority.
    pub fn from_path(path: &str, self_app: &str) -> Result<Self> {
        if path.starts_with(FILE_SCHEME_PREFIX) {
            return Self::parse(path);
        }
        if !path.starts_with('/') {
            return Err(Error::InvalidUri(format!("not an absolute path: {}", path)));
        }
        if has_traversal(path) {
            return Err(Error::InvalidUri(format!("path traversal: {}", path)));
        }

        let (authority, uri_path) = if path.starts_with(USER_STORAGE_HEAD) {
            (DOCS_AUTHORITY, path)
        } else if let Some(media_path) = path
            .strip_prefix(MEDIA_FUSE_HEAD)
            .filter(|p| p.starts_with('/'))
        {
            (MEDIA_AUTHORITY, media_path)
        } else {
            (self_app, path)
        };

        if authority.is_empty() {
            return Err(Error::InvalidUri("empty authority".to_string()));
        }

        Ok(Self {
            raw: format!("{}{}{}", FILE_SCHEME_PREFIX, authority, encode_path(uri_path)),
            authority: authority.to_string(),
            path: uri_path.to_string(),
            query: None,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Full decoded path
    pub fn decoded_path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Decoded path; media URIs naming a file yield its parent directory
    pub fn path(&self) -> String {
        if self.authority == MEDIA_AUTHORITY && self.path.contains('.') {
            if let Some(pos) = self.path.rfind('/') {
                return self.path[..pos].to_string();
            }
        }
        self.path.clone()
    }

    /// Last path segment, empty for a trailing '/'
    pub fn name(&self) -> &str {
        self.path
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or_default()
    }

    pub fn network_id(&self) -> Option<String> {
        self.query.as_deref().and_then(network_id_in)
    }

    pub fn is_remote(&self) -> bool {
        self.network_id().is_some()
    }

    /// Any `networkid` parameter, including an empty or malformed one.
    /// Such URIs never name a file on this device.
    pub fn has_network_param(&self) -> bool {
        self.query.as_deref().is_some_and(|query| {
            url::form_urlencoded::parse(query.as_bytes()).any(|(key, _)| key == NETWORK_ID_KEY)
        })
    }

    pub fn is_media(&self) -> bool {
        self.authority == MEDIA_AUTHORITY
    }
}

impl fmt::Display for FileUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for FileUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn has_traversal(path: &str) -> bool {
    path.split('/').any(|segment| segment == "..")
}

fn network_id_in(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == NETWORK_ID_KEY)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty() && !value.contains('/'))
}

/// `true` iff the string carries a non-empty `networkid` query value
pub fn is_remote_uri(uri: &str) -> bool {
    uri.split_once('?')
        .and_then(|(_, query)| network_id_in(query))
        .is_some()
}

/// `file://` prefix and no `../` segment
pub fn check_uri_format(uri: &str) -> bool {
    uri.starts_with(FILE_SCHEME_PREFIX) && !uri.contains("../")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let uri = FileUri::parse("file://com.example.a/data/storage/el2/base/a.txt").unwrap();
        assert_eq!(uri.authority(), "com.example.a");
        assert_eq!(uri.decoded_path(), "/data/storage/el2/base/a.txt");
        assert_eq!(uri.name(), "a.txt");
        assert!(!uri.is_remote());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "/data/storage/el2/base/a.txt",
            "http://com.example.a/a.txt",
            "file:///a.txt",
            "file://com.example.a",
            "file://com.example.a/base/../../etc/passwd",
            "file://com.example.a/base/%2E%2E/secret",
        ] {
            assert!(
                matches!(FileUri::parse(bad), Err(Error::InvalidUri(_))),
                "accepted {}",
                bad
            );
        }
    }

    #[test]
    fn test_remote_detection() {
        assert!(is_remote_uri("file://docs/storage/Users/a.txt?networkid=abc123"));
        assert!(!is_remote_uri("file://docs/storage/Users/a.txt?networkid="));
        assert!(!is_remote_uri("file://docs/storage/Users/a.txt?networkid=a/b"));
        assert!(!is_remote_uri("file://docs/storage/Users/a.txt"));

        let uri = FileUri::parse("file://com.example.b/x/y.txt?networkid=dev1").unwrap();
        assert_eq!(uri.network_id().as_deref(), Some("dev1"));
        assert_eq!(uri.decoded_path(), "/x/y.txt");
        assert!(uri.has_network_param());
    }

    #[test]
    fn test_empty_network_param() {
        let uri = FileUri::parse("file://com.example.b/x/y.txt?networkid=").unwrap();
        assert!(!uri.is_remote());
        assert!(uri.has_network_param());

        let plain = FileUri::parse("file://com.example.b/x/y.txt?mode=r").unwrap();
        assert!(!plain.has_network_param());
    }

    #[test]
    fn test_media_path_and_name() {
        let uri = FileUri::parse("file://media/Photo/12/IMG_001/IMG_001.jpg").unwrap();
        assert_eq!(uri.path(), "/Photo/12/IMG_001");
        assert_eq!(uri.name(), "IMG_001.jpg");

        let dir = FileUri::parse("file://docs/storage/Users/currentUser/Download/").unwrap();
        assert_eq!(dir.name(), "");
    }

    #[test]
    fn test_from_path() {
        let docs = FileUri::from_path("/storage/Users/currentUser/Download/my file.txt", "com.a")
            .unwrap();
        assert_eq!(
            docs.as_str(),
            "file://docs/storage/Users/currentUser/Download/my%20file.txt"
        );

        let media = FileUri::from_path("/data/storage/el2/media/Photo/1/a.jpg", "com.a").unwrap();
        assert_eq!(media.as_str(), "file://media/Photo/1/a.jpg");

        let own = FileUri::from_path("/data/storage/el2/base/files/a.txt", "com.a").unwrap();
        assert_eq!(own.as_str(), "file://com.a/data/storage/el2/base/files/a.txt");

        assert!(FileUri::from_path("relative/a.txt", "com.a").is_err());
    }

    #[test]
    fn test_check_uri_format() {
        assert!(check_uri_format("file://com.a/a.txt"));
        assert!(!check_uri_format("file://com.a/../a.txt"));
        assert!(!check_uri_format("/com.a/a.txt"));
    }
}
