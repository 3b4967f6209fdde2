// invokeai-bridge/src/hashing.rs

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::Result;

const PSEUDO_HASH_CHUNK: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Crc32,
    Blake3,
}

/// Hashes text and returns the digest as lowercase hex.
pub fn hash_text(text: &str, algorithm: HashAlgorithm) -> String {
    match algorithm {
        HashAlgorithm::Crc32 => format!("{:08x}", crc32fast::hash(text.as_bytes())),
        HashAlgorithm::Blake3 => blake3::hash(text.as_bytes()).to_hex().to_string(),
    }
}

/// Cheap file fingerprint: length plus a CRC32 over the first and last MiB.
/// Good enough to key cached scan verdicts, not to prove integrity.
pub fn get_pseudo_hash(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();

    let mut hasher = crc32fast::Hasher::new();
    let mut buf = Vec::with_capacity(PSEUDO_HASH_CHUNK as usize);

    (&mut file).take(PSEUDO_HASH_CHUNK).read_to_end(&mut buf)?;
    hasher.update(&buf);

    if len > PSEUDO_HASH_CHUNK {
        let tail_start = len.saturating_sub(PSEUDO_HASH_CHUNK).max(PSEUDO_HASH_CHUNK);
        buf.clear();
        file.seek(SeekFrom::Start(tail_start))?;
        file.take(PSEUDO_HASH_CHUNK).read_to_end(&mut buf)?;
        hasher.update(&buf);
    }

    Ok(format!("{:x}-{:08x}", len, hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_crc32_of_known_text() {
        // Standard CRC-32 check value.
        assert_eq!(hash_text("123456789", HashAlgorithm::Crc32), "cbf43926");
        assert_eq!(hash_text("", HashAlgorithm::Blake3).len(), 64);
    }

    #[test]
    fn test_pseudo_hash_tracks_content_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.ckpt");
        let b = dir.path().join("b.ckpt");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();
        assert_eq!(get_pseudo_hash(&a).unwrap(), get_pseudo_hash(&b).unwrap());

        fs::write(&b, b"other bytes").unwrap();
        assert_ne!(get_pseudo_hash(&a).unwrap(), get_pseudo_hash(&b).unwrap());
        assert!(get_pseudo_hash(&a).unwrap().starts_with("a-"));
    }

    #[test]
    fn test_pseudo_hash_reads_tail_of_large_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.safetensors");
        let mut data = vec![0u8; (PSEUDO_HASH_CHUNK * 3) as usize];
        fs::write(&path, &data).unwrap();
        let before = get_pseudo_hash(&path).unwrap();

        let last = data.len() - 1;
        data[last] = 1;
        fs::write(&path, &data).unwrap();
        assert_ne!(before, get_pseudo_hash(&path).unwrap());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = get_pseudo_hash(Path::new("/no/such/model.ckpt")).unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)));
    }
}
