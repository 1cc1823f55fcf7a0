#![allow(dead_code)]

pub mod memory_server;
pub mod range_server;
pub mod upload_server;

/// Deterministic test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
