//! Session record CRUD.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::path::{Path, PathBuf};

use super::db::{unix_timestamp, SessionStore};
use super::types::{NewSessionRecord, SessionRecord};
use crate::upload::{SessionId, SessionStatus, TransferSession};

const COLUMNS: &str = "session_id, source_path, total_size, nonce, max_part_size, \
                       parts_committed, status, created_at, updated_at";

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn from_i64(v: i64) -> u64 {
    u64::try_from(v).unwrap_or(0)
}

fn record_from_row(row: &SqliteRow) -> SessionRecord {
    let session_id: String = row.get("session_id");
    let source_path: String = row.get("source_path");
    let status: String = row.get("status");
    SessionRecord {
        source_path: PathBuf::from(source_path),
        session_id: SessionId::new(session_id),
        total_size: from_i64(row.get("total_size")),
        nonce: row.get("nonce"),
        max_part_size: from_i64(row.get("max_part_size")),
        parts_committed: from_i64(row.get("parts_committed")),
        status: SessionStatus::from_str(&status),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl SessionStore {
    /// Record a freshly begun session. Re-recording the same server session id
    /// replaces its progress but keeps the original creation time.
    pub async fn insert(&self, new: &NewSessionRecord<'_>) -> Result<()> {
        let now = unix_timestamp();
        let s = new.session;
        sqlx::query(
            r#"
            INSERT INTO upload_sessions (
                session_id, source_path, total_size, nonce, max_part_size,
                parts_committed, status, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ON CONFLICT(session_id) DO UPDATE SET
                source_path = excluded.source_path,
                total_size = excluded.total_size,
                nonce = excluded.nonce,
                max_part_size = excluded.max_part_size,
                parts_committed = excluded.parts_committed,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(s.id.as_str())
        .bind(new.source_path.to_string_lossy().as_ref())
        .bind(to_i64(s.total_size))
        .bind(new.nonce)
        .bind(to_i64(s.max_part_size))
        .bind(to_i64(s.parts_committed))
        .bind(s.status.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("record session {}", s.id))?;
        tracing::debug!(session = %s.id, path = %new.source_path.display(), "session recorded");
        Ok(())
    }

    /// Most recently touched unfinished session for this exact file content.
    pub async fn find_resumable(
        &self,
        source_path: &Path,
        total_size: u64,
        nonce: &str,
    ) -> Result<Option<SessionRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM upload_sessions \
             WHERE source_path = ?1 AND total_size = ?2 AND nonce = ?3 AND status != ?4 \
             ORDER BY updated_at DESC, created_at DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(source_path.to_string_lossy().as_ref())
            .bind(to_i64(total_size))
            .bind(nonce)
            .bind(SessionStatus::Completed.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(record_from_row))
    }

    /// Persist the session's committed count and status. Returns false if the
    /// session was never recorded.
    pub async fn update_progress(&self, session: &TransferSession) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE upload_sessions
            SET parts_committed = ?1,
                status = ?2,
                max_part_size = ?3,
                updated_at = ?4
            WHERE session_id = ?5
            "#,
        )
        .bind(to_i64(session.parts_committed))
        .bind(session.status.as_str())
        .bind(to_i64(session.max_part_size))
        .bind(unix_timestamp())
        .bind(session.id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn get(&self, session_id: &SessionId) -> Result<Option<SessionRecord>> {
        let sql = format!("SELECT {COLUMNS} FROM upload_sessions WHERE session_id = ?1");
        let row = sqlx::query(&sql)
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(record_from_row))
    }

    /// All sessions, newest first.
    pub async fn list(&self) -> Result<Vec<SessionRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM upload_sessions ORDER BY created_at DESC, session_id ASC"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    /// Returns true if a record was deleted.
    pub async fn remove(&self, session_id: &SessionId) -> Result<bool> {
        let res = sqlx::query("DELETE FROM upload_sessions WHERE session_id = ?1")
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
