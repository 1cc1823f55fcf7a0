//! Upload session state tracked by the coordinator.

use std::fmt;

use super::plan;

/// Opaque server-issued session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        SessionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of one upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Uploading => "uploading",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => SessionStatus::Pending,
            "uploading" => SessionStatus::Uploading,
            "completed" => SessionStatus::Completed,
            "cancelled" => SessionStatus::Cancelled,
            _ => SessionStatus::Failed,
        }
    }

    /// Completed sessions cannot take further parts; every other state can be resumed.
    pub fn is_terminal(self) -> bool {
        self == SessionStatus::Completed
    }
}

/// One logical upload: size, part bound and how many parts the server has accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSession {
    pub id: SessionId,
    pub total_size: u64,
    pub max_part_size: u64,
    /// Parts accepted so far; also the ordinal of the next part to send.
    pub parts_committed: u64,
    pub status: SessionStatus,
}

impl TransferSession {
    pub fn new(id: SessionId, total_size: u64, max_part_size: u64) -> Self {
        Self {
            id,
            total_size,
            max_part_size,
            parts_committed: 0,
            status: SessionStatus::Pending,
        }
    }

    pub fn part_count(&self) -> u64 {
        plan::part_count(self.total_size, self.max_part_size)
    }

    pub fn next_ordinal(&self) -> u64 {
        self.parts_committed
    }

    /// Bytes covered by the committed parts.
    pub fn bytes_committed(&self) -> u64 {
        self.parts_committed
            .saturating_mul(self.max_part_size)
            .min(self.total_size)
    }

    pub fn all_parts_committed(&self) -> bool {
        self.parts_committed >= self.part_count()
    }
}
