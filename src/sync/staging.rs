use crate::s3::StorageError;
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Longest escaped name used as-is; anything longer is cut and suffixed
const MAX_PLAIN_NAME: usize = 180;

fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Turn an object key into a single safe file name.
///
/// Bytes outside `[A-Za-z0-9._-]` become `%XX`, as does a leading `.`, so the
/// mapping is injective: `a/b.replay` and `a_b.replay` never share a file, and
/// no key can name `.`/`..` or escape the staging directory.
///
/// Escaped names longer than 180 bytes are cut to 180 and suffixed with `~`
/// and the SHA-256 of the full key, which keeps every name under the usual
/// 255-byte limit. `~` is always escaped, so a cut name never equals a plain one.
pub fn escape_key(key: &str) -> String {
    let escaped = escape_bytes(key);
    if escaped.len() <= MAX_PLAIN_NAME {
        return escaped;
    }
    format!("{}~{}", &escaped[..MAX_PLAIN_NAME], sha256_hex(key))
}

fn escape_bytes(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for (i, byte) in key.bytes().enumerate() {
        let plain = byte.is_ascii_alphanumeric()
            || byte == b'_'
            || byte == b'-'
            || (byte == b'.' && i > 0);
        if plain {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{byte:02X}"));
        }
    }
    escaped
}

/// Local path a key is staged at before decoding
pub fn staging_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(escape_key(key))
}

/// Write downloaded object bytes to the key's staging path
pub async fn stage(dir: &Path, key: &str, data: &[u8]) -> Result<PathBuf, StorageError> {
    let staging_error = |e: std::io::Error| StorageError::StagingError(key.to_string(), e.to_string());

    tokio::fs::create_dir_all(dir).await.map_err(staging_error)?;
    let path = staging_path(dir, key);
    tokio::fs::write(&path, data).await.map_err(staging_error)?;

    debug!("Staged {} ({} bytes) at {}", key, data.len(), path.display());
    Ok(path)
}

/// Remove a staged file; a file that is already gone is not an error
pub async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove staged file {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_keys_are_unchanged() {
        assert_eq!(escape_key("match.replay"), "match.replay");
        assert_eq!(escape_key("Match_01-final.replay"), "Match_01-final.replay");
    }

    #[test]
    fn separators_are_escaped_without_collisions() {
        assert_eq!(escape_key("a/b.replay"), "a%2Fb.replay");
        assert_ne!(escape_key("a/b.replay"), escape_key("a_b.replay"));
        assert_ne!(escape_key("a/b.replay"), escape_key("a%2Fb.replay"));
        assert_eq!(escape_key("a%2Fb.replay"), "a%252Fb.replay");
        assert_eq!(escape_key("dir\\file.replay"), "dir%5Cfile.replay");
    }

    #[test]
    fn dot_segments_cannot_escape_the_staging_dir() {
        let dir = Path::new("/staging");
        for key in ["..", ".", "../../etc/passwd", ".hidden.replay"] {
            let path = staging_path(dir, key);
            assert_eq!(path.parent(), Some(dir), "key {key:?} -> {path:?}");
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            assert!(!name.starts_with('.'), "key {key:?} -> {name}");
        }
    }

    #[test]
    fn non_ascii_keys_are_escaped_bytewise() {
        assert_eq!(escape_key("é.replay"), "%C3%A9.replay");
        assert_eq!(escape_key("a b.replay"), "a%20b.replay");
    }

    #[test]
    fn long_keys_get_bounded_distinct_names() {
        let long = format!("uploads/{}.replay", "x".repeat(1010));
        assert_eq!(long.len(), 1024);
        let name = escape_key(&long);
        assert!(name.len() <= 255, "{} bytes", name.len());

        let worst = "/".repeat(1024);
        assert!(escape_key(&worst).len() <= 255);

        let a = format!("{}a.replay", "y".repeat(400));
        let b = format!("{}b.replay", "y".repeat(400));
        assert_ne!(escape_key(&a), escape_key(&b));
        assert_eq!(escape_key(&a), escape_key(&a));
    }

    #[test]
    fn names_at_the_cut_length_are_left_alone() {
        let key = "k".repeat(MAX_PLAIN_NAME);
        assert_eq!(escape_key(&key), key);
        assert!(escape_key(&format!("{key}k")).contains('~'));
    }

    #[tokio::test]
    async fn stage_creates_the_directory_and_discard_removes_the_file() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("staging");

        let path = stage(&dir, "2024/a.replay", b"bytes").await.unwrap();
        assert_eq!(path, dir.join("2024%2Fa.replay"));
        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");

        discard(&path).await;
        assert!(!path.exists());
        discard(&path).await;
    }
}
