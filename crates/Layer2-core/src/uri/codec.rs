//! Percent-encoding for file URI paths

use fileshare_foundation::{Error, Result};
use std::borrow::Cow;

/// Characters kept verbatim besides ASCII alphanumerics
const PATH_RESERVED: &str = ";,/?:@&=+$-_.!~*()#'";

fn is_kept(c: char) -> bool {
    c.is_ascii_alphanumeric() || PATH_RESERVED.contains(c)
}

/// Percent-encode every character outside the kept set (UTF-8 bytes for non-ASCII)
pub fn encode_path(path: &str) -> Cow<'_, str> {
    if path.chars().all(is_kept) {
        return Cow::Borrowed(path);
    }

    let mut encoded = String::with_capacity(path.len() + 8);
    let mut buf = [0u8; 4];
    for c in path.chars() {
        if is_kept(c) {
            encoded.push(c);
        } else {
            encoded.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    Cow::Owned(encoded)
}

/// Decode `%XX` escapes; invalid UTF-8 after decoding is an invalid URI
pub fn decode_path(path: &str) -> Result<Cow<'_, str>> {
    urlencoding::decode(path).map_err(|e| Error::InvalidUri(format!("{}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_keeps_reserved() {
        assert_eq!(
            encode_path("/data/storage/el2/base/a-b_c.(1)!.txt"),
            "/data/storage/el2/base/a-b_c.(1)!.txt"
        );
        assert!(matches!(encode_path("/plain/path"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_encode_space_and_unicode() {
        assert_eq!(encode_path("/docs/my file.txt"), "/docs/my%20file.txt");
        assert_eq!(encode_path("/문서"), "/%EB%AC%B8%EC%84%9C");
        assert_eq!(decode_path("/%EB%AC%B8%EC%84%9C").unwrap(), "/문서");
    }

    #[test]
    fn test_decode_invalid_utf8() {
        assert!(matches!(decode_path("/bad%FF"), Err(Error::InvalidUri(_))));
    }
}
