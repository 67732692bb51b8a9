//! URI 해석
//!
//! - `file_uri`: file:// URI 파싱 / 생성 (FileUri)
//! - `resolver`: URI → 샌드박스 경로 (UriResolver, ResolveStrategy)
//! - `share`: 브로커 공유 항목 생성 / 삭제 (ShareBroker)
//! - `codec`: 경로 퍼센트 인코딩

mod codec;
mod file_uri;
mod resolver;
mod share;

pub use codec::{decode_path, encode_path};
pub use file_uri::{
    check_uri_format, is_remote_uri, FileUri, DOCS_AUTHORITY, FILE_SCHEME_PREFIX,
    MEDIA_AUTHORITY, MEDIA_FUSE_HEAD, NETWORK_ID_KEY, USER_STORAGE_HEAD,
};
pub use resolver::{ResolveStrategy, UriResolver};
pub use share::{ShareBroker, ShareFlag};
