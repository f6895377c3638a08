//! libSQL backend — async implementation of the session repository and the
//! message log. Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::session::model::{DEFAULT_WORD_LIMIT, Session, SessionPatch};
use crate::session::state::Step;
use crate::store::migrations;
use crate::store::traits::{Direction, LogEntry, MessageLog, SessionRepository};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    default_word_limit: u32,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            default_word_limit: DEFAULT_WORD_LIMIT,
        })
    }

    /// Word limit given to sessions created from now on.
    pub fn with_default_word_limit(mut self, word_limit: u32) -> Self {
        self.default_word_limit = word_limit;
        self
    }

    /// Run all pending schema migrations.
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Convert `Option<u32>` to libsql Value.
fn opt_integer(n: Option<u32>) -> libsql::Value {
    match n {
        Some(n) => libsql::Value::Integer(i64::from(n)),
        None => libsql::Value::Null,
    }
}

fn row_to_session(row: &libsql::Row) -> Result<Session, DatabaseError> {
    let parse = |e: libsql::Error| DatabaseError::Query(format!("session row parse: {e}"));

    let step_str: String = row.get(1).map_err(parse)?;
    let step: Step = step_str
        .parse()
        .map_err(DatabaseError::Serialization)?;
    let word_limit: i64 = row.get(7).map_err(parse)?;
    let created_str: String = row.get(8).map_err(parse)?;
    let updated_str: String = row.get(9).map_err(parse)?;

    Ok(Session {
        sender_id: row.get(0).map_err(parse)?,
        step,
        name: row.get(2).ok(),
        target_program: row.get(3).ok(),
        signature_experience: row.get(4).ok(),
        key_strength: row.get(5).ok(),
        goals: row.get(6).ok(),
        word_limit: u32::try_from(word_limit).unwrap_or(DEFAULT_WORD_LIMIT),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

fn row_to_log_entry(row: &libsql::Row) -> Result<LogEntry, DatabaseError> {
    let parse = |e: libsql::Error| DatabaseError::Query(format!("log row parse: {e}"));

    let id_str: String = row.get(0).map_err(parse)?;
    let direction_str: String = row.get(2).map_err(parse)?;
    let meta_str: Option<String> = row.get(4).ok();
    let created_str: String = row.get(5).map_err(parse)?;

    Ok(LogEntry {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        sender_id: row.get(1).map_err(parse)?,
        direction: direction_str
            .parse()
            .map_err(DatabaseError::Serialization)?,
        text: row.get(3).map_err(parse)?,
        meta: meta_str.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: parse_datetime(&created_str),
    })
}

// ── Trait implementations ───────────────────────────────────────────

const SESSION_COLUMNS: &str = "sender_id, step, name, target_program, signature_experience, key_strength, goals, word_limit, created_at, updated_at";

const LOG_COLUMNS: &str = "id, sender_id, direction, text, meta, created_at";

#[async_trait]
impl SessionRepository for LibSqlBackend {
    async fn get_or_create(&self, sender_id: &str) -> Result<Session, DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let inserted = conn
            .execute(
                "INSERT INTO sessions (sender_id, step, word_limit, created_at, updated_at)
                 VALUES (?1, 'welcome', ?2, ?3, ?3)
                 ON CONFLICT (sender_id) DO NOTHING",
                params![sender_id, i64::from(self.default_word_limit), now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_or_create: {e}")))?;

        if inserted > 0 {
            debug!(sender = sender_id, "Session created");
        }

        self.get(sender_id).await?.ok_or_else(|| {
            DatabaseError::Query(format!("get_or_create: session {sender_id} missing after insert"))
        })
    }

    async fn get(&self, sender_id: &str) -> Result<Option<Session>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE sender_id = ?1"),
                params![sender_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_session(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_session: {e}"))),
        }
    }

    async fn update(&self, sender_id: &str, patch: &SessionPatch) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let step = patch.step.map(|s| s.as_str());

        conn.execute(
            "INSERT INTO sessions (sender_id, step, name, target_program, signature_experience,
                key_strength, goals, word_limit, created_at, updated_at)
             VALUES (?1, COALESCE(?2, 'welcome'), ?3, ?4, ?5, ?6, ?7, COALESCE(?8, ?10), ?9, ?9)
             ON CONFLICT (sender_id) DO UPDATE SET
                step = COALESCE(?2, step),
                name = COALESCE(?3, name),
                target_program = COALESCE(?4, target_program),
                signature_experience = COALESCE(?5, signature_experience),
                key_strength = COALESCE(?6, key_strength),
                goals = COALESCE(?7, goals),
                word_limit = COALESCE(?8, word_limit),
                updated_at = ?9",
            params![
                sender_id,
                opt_text(step),
                opt_text(patch.name.as_deref()),
                opt_text(patch.target_program.as_deref()),
                opt_text(patch.signature_experience.as_deref()),
                opt_text(patch.key_strength.as_deref()),
                opt_text(patch.goals.as_deref()),
                opt_integer(patch.word_limit),
                now,
                i64::from(self.default_word_limit),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("update_session: {e}")))?;

        debug!(sender = sender_id, step = ?patch.step, "Session updated");
        Ok(())
    }
}

#[async_trait]
impl MessageLog for LibSqlBackend {
    async fn append_log(
        &self,
        sender_id: &str,
        direction: Direction,
        text: &str,
        meta: Option<&serde_json::Value>,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let meta_str = meta
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO message_log (id, sender_id, direction, text, meta, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                sender_id,
                direction.as_str(),
                text,
                opt_text(meta_str.as_deref()),
                now,
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("append_log: {e}")))?;

        Ok(())
    }

    async fn recent_log(
        &self,
        sender_id: &str,
        limit: usize,
    ) -> Result<Vec<LogEntry>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {LOG_COLUMNS} FROM message_log WHERE sender_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT ?2"
                ),
                params![sender_id, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("recent_log: {e}")))?;

        let mut entries = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_log_entry(&row) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!("Skipping log row: {e}");
                }
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    // ── Session tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn get_or_create_starts_at_welcome() {
        let db = test_db().await;
        let session = db.get_or_create("15550001").await.unwrap();
        assert_eq!(session.sender_id, "15550001");
        assert_eq!(session.step, Step::Welcome);
        assert_eq!(session.word_limit, DEFAULT_WORD_LIMIT);
        assert!(session.name.is_none());
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let db = test_db().await;
        let first = db.get_or_create("15550001").await.unwrap();
        let second = db.get_or_create("15550001").await.unwrap();
        assert_eq!(first, second);

        let mut rows = db
            .conn()
            .query("SELECT COUNT(*) FROM sessions", ())
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn get_or_create_does_not_reset_progress() {
        let db = test_db().await;
        db.get_or_create("a").await.unwrap();
        db.update("a", &SessionPatch::step(Step::Q2Program).with_name("Dana"))
            .await
            .unwrap();

        let session = db.get_or_create("a").await.unwrap();
        assert_eq!(session.step, Step::Q2Program);
        assert_eq!(session.name.as_deref(), Some("Dana"));
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let db = test_db().await;
        assert!(db.get("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let db = test_db().await;
        db.get_or_create("a").await.unwrap();
        db.update("a", &SessionPatch::step(Step::Q2Program).with_name("Dana"))
            .await
            .unwrap();
        db.update(
            "a",
            &SessionPatch::step(Step::Q3Experience).with_target_program("Technion"),
        )
        .await
        .unwrap();

        let session = db.get("a").await.unwrap().unwrap();
        assert_eq!(session.step, Step::Q3Experience);
        assert_eq!(session.name.as_deref(), Some("Dana"));
        assert_eq!(session.target_program.as_deref(), Some("Technion"));
        assert!(session.signature_experience.is_none());
        assert!(session.updated_at >= session.created_at);
    }

    #[tokio::test]
    async fn update_creates_missing_session() {
        let db = test_db().await;
        db.update("ghost", &SessionPatch::default().with_goals("travel"))
            .await
            .unwrap();

        let session = db.get("ghost").await.unwrap().unwrap();
        assert_eq!(session.step, Step::Welcome);
        assert_eq!(session.goals.as_deref(), Some("travel"));
        assert_eq!(session.word_limit, DEFAULT_WORD_LIMIT);
    }

    #[tokio::test]
    async fn update_word_limit() {
        let db = test_db().await;
        db.get_or_create("a").await.unwrap();
        let patch = SessionPatch {
            word_limit: Some(350),
            ..Default::default()
        };
        db.update("a", &patch).await.unwrap();
        assert_eq!(db.get("a").await.unwrap().unwrap().word_limit, 350);
    }

    #[tokio::test]
    async fn configured_default_word_limit_applies_to_new_sessions() {
        let db = LibSqlBackend::new_memory()
            .await
            .unwrap()
            .with_default_word_limit(450);
        assert_eq!(db.get_or_create("a").await.unwrap().word_limit, 450);
    }

    #[tokio::test]
    async fn unknown_stored_step_is_rejected() {
        let db = test_db().await;
        db.get_or_create("a").await.unwrap();
        db.conn()
            .execute("UPDATE sessions SET step = 'q9_bogus' WHERE sender_id = 'a'", ())
            .await
            .unwrap();

        let result = db.get("a").await;
        assert!(matches!(result, Err(DatabaseError::Serialization(_))));
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_sender() {
        let db = test_db().await;
        db.get_or_create("a").await.unwrap();
        db.get_or_create("b").await.unwrap();
        db.update("a", &SessionPatch::step(Step::Q2Program).with_name("Ann"))
            .await
            .unwrap();

        let b = db.get("b").await.unwrap().unwrap();
        assert_eq!(b.step, Step::Welcome);
        assert!(b.name.is_none());
    }

    #[tokio::test]
    async fn file_backed_database_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("bot.db");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.get_or_create("a").await.unwrap();
            db.update("a", &SessionPatch::step(Step::Q2Program).with_name("Dana"))
                .await
                .unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        let session = db.get("a").await.unwrap().unwrap();
        assert_eq!(session.step, Step::Q2Program);
        assert_eq!(session.name.as_deref(), Some("Dana"));
    }

    // ── Message log tests ───────────────────────────────────────────

    #[tokio::test]
    async fn append_and_read_log_newest_first() {
        let db = test_db().await;
        db.append_log("a", Direction::Inbound, "hello", None)
            .await
            .unwrap();
        db.append_log(
            "a",
            Direction::Outbound,
            "Hi! I'm EVA.",
            Some(&serde_json::json!({"step": "welcome"})),
        )
        .await
        .unwrap();
        db.append_log("b", Direction::Inbound, "other sender", None)
            .await
            .unwrap();

        let entries = db.recent_log("a", 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].direction, Direction::Outbound);
        assert_eq!(entries[0].text, "Hi! I'm EVA.");
        assert_eq!(entries[0].meta, Some(serde_json::json!({"step": "welcome"})));
        assert_eq!(entries[1].direction, Direction::Inbound);
        assert!(entries[1].meta.is_none());
    }

    #[tokio::test]
    async fn recent_log_respects_limit() {
        let db = test_db().await;
        for i in 0..5 {
            db.append_log("a", Direction::Inbound, &format!("m{i}"), None)
                .await
                .unwrap();
        }
        assert_eq!(db.recent_log("a", 3).await.unwrap().len(), 3);
    }
}
