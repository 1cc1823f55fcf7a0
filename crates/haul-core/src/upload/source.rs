//! Byte sources that parts are read from.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

/// Reads exactly one part's bytes from the underlying source.
#[async_trait]
pub trait PartSource: Send {
    /// Fill `buf` with the bytes starting at absolute offset `start`.
    async fn read_part(&mut self, start: u64, buf: &mut [u8]) -> io::Result<()>;
}

/// Source that supports random access: seeks before every part.
pub struct SeekableSource<R> {
    inner: R,
}

impl<R> SeekableSource<R>
where
    R: AsyncRead + AsyncSeek + Unpin + Send,
{
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl SeekableSource<tokio::fs::File> {
    /// Open a local file for uploading.
    pub async fn open(path: &std::path::Path) -> io::Result<Self> {
        Ok(Self::new(tokio::fs::File::open(path).await?))
    }
}

#[async_trait]
impl<R> PartSource for SeekableSource<R>
where
    R: AsyncRead + AsyncSeek + Unpin + Send,
{
    async fn read_part(&mut self, start: u64, buf: &mut [u8]) -> io::Result<()> {
        self.inner.seek(io::SeekFrom::Start(start)).await?;
        self.inner.read_exact(buf).await?;
        Ok(())
    }
}

/// Forward-only source (pipe, socket). Parts must be requested in order,
/// starting at the position the stream is currently at.
pub struct SequentialSource<R> {
    inner: R,
    position: u64,
}

impl<R> SequentialSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Wrap a stream already positioned at `position` (0 for a fresh stream).
    pub fn new(inner: R, position: u64) -> Self {
        Self { inner, position }
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}

#[async_trait]
impl<R> PartSource for SequentialSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_part(&mut self, start: u64, buf: &mut [u8]) -> io::Result<()> {
        if start != self.position {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "source is not seekable: positioned at {}, part starts at {}",
                    self.position, start
                ),
            ));
        }
        self.inner.read_exact(buf).await?;
        self.position += buf.len() as u64;
        Ok(())
    }
}
