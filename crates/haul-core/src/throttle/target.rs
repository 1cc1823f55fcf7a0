//! Positional write destination.

use std::io;
use std::sync::Arc;

/// Something bytes can be committed to at an absolute offset.
///
/// Writes do not share a cursor, so sub-chunks of different logical writes may
/// be interleaved without corrupting each other.
pub trait WriteTarget: Send + Sync {
    fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()>;
}

impl<T: WriteTarget + ?Sized> WriteTarget for Arc<T> {
    fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        (**self).write_at(offset, data)
    }
}

impl<T: WriteTarget + ?Sized> WriteTarget for &T {
    fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        (**self).write_at(offset, data)
    }
}
