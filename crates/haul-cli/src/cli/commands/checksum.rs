//! Checksum command: SHA-256 and size of a file.

use anyhow::Result;
use haul_core::checksum;
use std::path::Path;

/// Print `sha256  size  path`, hashing on a blocking worker.
pub async fn run_checksum(path: &Path) -> Result<()> {
    let digest = checksum::file_digest_blocking(path).await?;
    println!("{}  {}  {}", digest.sha256, digest.size, path.display());
    Ok(())
}
