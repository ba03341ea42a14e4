//! Content hashing for downloaded texture files

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;
use std::path::Path;

/// A SHA-256 digest of a file's contents.
///
/// Recorded for every downloaded texture so a host can tell whether a
/// re-run with the same prompt and seed produced identical images.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash an in-memory buffer
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Hash everything a reader yields, without buffering it whole
    pub fn from_reader<R: Read>(mut reader: R) -> std::io::Result<Self> {
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self(hasher.finalize().into()))
    }

    /// Hash a file on disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// `sha256:`-prefixed hex form used in scene files
    pub fn to_prefixed_hex(&self) -> String {
        format!("sha256:{}", self.to_hex())
    }

    /// Parse the `sha256:`-prefixed form
    pub fn from_prefixed_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix("sha256:")?;
        if hex.len() != 64 || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.to_prefixed_hex()
    }
}

impl TryFrom<String> for ContentHash {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        ContentHash::from_prefixed_hex(&value)
            .ok_or_else(|| format!("invalid content hash: {}", value))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_matches_bytes() {
        let data = vec![7u8; 20_000];
        let from_reader = ContentHash::from_reader(&data[..]).unwrap();
        assert_eq!(from_reader, ContentHash::from_bytes(&data));
    }

    #[test]
    fn test_different_content_different_hash() {
        assert_ne!(
            ContentHash::from_bytes(b"albedo"),
            ContentHash::from_bytes(b"normal")
        );
    }

    #[test]
    fn test_prefixed_hex_parse() {
        let h = ContentHash::from_bytes(b"stone wall");
        let prefixed = h.to_prefixed_hex();
        assert!(prefixed.starts_with("sha256:"));
        assert_eq!(ContentHash::from_prefixed_hex(&prefixed), Some(h));
        assert!(ContentHash::from_prefixed_hex("md5:abc").is_none());
        assert!(ContentHash::from_prefixed_hex("sha256:tooshort").is_none());
    }
}
