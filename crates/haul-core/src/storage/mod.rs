//! Temp-file lifecycle for fetched data.
//!
//! Data lands in `<dest>.part` through positional writes, is synced, and is
//! renamed onto the destination only once complete.

mod builder;
mod writer;

use std::path::{Path, PathBuf};

pub use builder::StorageWriterBuilder;
pub use writer::StorageWriter;

pub const TEMP_SUFFIX: &str = ".part";

/// `file.iso` → `file.iso.part`.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}
