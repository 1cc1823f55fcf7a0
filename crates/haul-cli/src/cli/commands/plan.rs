//! `haul plan <path>` – print the part layout without uploading.

use anyhow::{bail, Context, Result};
use haul_core::config::HaulConfig;
use haul_core::upload::plan_parts;
use std::path::Path;

pub fn run_plan(cfg: &HaulConfig, path: &Path, part_size: Option<u64>) -> Result<()> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    let part = part_size.unwrap_or(cfg.max_part_size_bytes);
    if part == 0 {
        bail!("part size must be greater than 0");
    }
    let parts = plan_parts(size, part);
    println!("{}: {} bytes, {} part(s) of up to {} bytes", path.display(), size, parts.len(), part);
    for p in &parts {
        println!("{:<6} {:>12}  {}", p.ordinal, p.len(), p.content_range(size));
    }
    Ok(())
}
