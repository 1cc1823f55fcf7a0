//! SHA-256 of local files, used as the upload session nonce and by `haul checksum`.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Size and content hash of a file, read in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub size: u64,
    /// Lowercase hex.
    pub sha256: String,
}

pub fn file_digest(path: &Path) -> Result<FileDigest> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    let mut size = 0u64;
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        size += n as u64;
        hasher.update(&buf[..n]);
    }
    Ok(FileDigest {
        size,
        sha256: hex::encode(hasher.finalize()),
    })
}

pub fn sha256_path(path: &Path) -> Result<String> {
    Ok(file_digest(path)?.sha256)
}

/// [`file_digest`] on a blocking worker, for async callers hashing large files.
pub async fn file_digest_blocking(path: &Path) -> Result<FileDigest> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || file_digest(&path))
        .await
        .context("digest task panicked")?
}
