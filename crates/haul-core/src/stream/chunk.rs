//! Owned buffer slice with a read cursor.

/// Bytes from one producer delivery. Tagged with the producer sequence number
/// so the consumer can check it dequeues in order.
#[derive(Debug)]
pub(super) struct Chunk {
    seq: u64,
    data: Vec<u8>,
    cursor: usize,
}

impl Chunk {
    pub(super) fn new(seq: u64, data: Vec<u8>) -> Self {
        Self {
            seq,
            data,
            cursor: 0,
        }
    }

    pub(super) fn seq(&self) -> u64 {
        self.seq
    }

    pub(super) fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    pub(super) fn is_consumed(&self) -> bool {
        self.cursor >= self.data.len()
    }

    /// Copy as much as fits into `out`, advancing the cursor. Returns bytes copied.
    pub(super) fn read_into(&mut self, out: &mut [u8]) -> usize {
        let n = self.remaining().min(out.len());
        out[..n].copy_from_slice(&self.data[self.cursor..self.cursor + n]);
        self.cursor += n;
        n
    }
}
