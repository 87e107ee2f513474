//! Application state shared by every request handler.
//!
//! `CoreState` is built once at startup, wrapped in `Arc`, and handed to
//! the axum router. It owns configuration, the JWT signing keys, the media
//! store and the buffered audit logger. Database connections are opened
//! per request via [`CoreState::open_db`].

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::{AppConfig, ConfigError};
use crate::crypto::{self, CryptoError, JwtKeys, TokenTtl};
use crate::db;
use crate::db::repository::{fmt_timestamp, AuditRecord};
use crate::storage::MediaStore;

/// Maximum audit buffer size before flush.
const AUDIT_BUFFER_CAPACITY: usize = 100;

/// Audit rows older than this are pruned on flush.
const AUDIT_RETENTION_DAYS: i64 = 90;

pub struct CoreState {
    pub config: AppConfig,
    keys: JwtKeys,
    ttl: TokenTtl,
    media: MediaStore,
    /// Audit log for all data access events.
    audit: AuditLogger,
}

impl CoreState {
    /// Prepare directories, signing keys and the database schema.
    pub fn new(config: AppConfig) -> Result<Self, CoreError> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&config.media_dir)?;

        let secret = match &config.jwt_secret {
            Some(secret) => secret.clone(),
            None => {
                tracing::warn!(
                    "PRESCRIPTO_JWT_SECRET not set; using a random secret, tokens will not survive a restart"
                );
                crypto::generate_secret()
            }
        };
        let keys = JwtKeys::from_secret(secret.as_bytes())?;

        let ttl = config.token_ttl()?;
        let media = MediaStore::new(&config.media_dir, config.max_upload_bytes);

        // Apply migrations up front so the first request does not pay for it.
        db::open_database(&config.db_path)?;
        tracing::info!(db = %config.db_path.display(), media = %config.media_dir.display(), "Core state ready");

        Ok(Self {
            config,
            keys,
            ttl,
            media,
            audit: AuditLogger::new(),
        })
    }

    /// Open a database connection. One per request.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.config.db_path).map_err(CoreError::Database)
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub fn ttl(&self) -> &TokenTtl {
        &self.ttl
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    // ── Audit logging ───────────────────────────────────────

    /// Log an access event. Auto-flushes to DB when buffer is full.
    pub fn log_access(&self, user_id: Option<Uuid>, action: &str, entity: &str) {
        let needs_flush = self.audit.log(user_id, action, entity);
        if needs_flush {
            if let Err(e) = self.flush_audit() {
                tracing::warn!("Auto-flush audit failed: {e}");
            }
        }
    }

    /// Get the current audit buffer contents.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }

    /// Flush audit buffer to DB and prune old entries.
    pub fn flush_audit(&self) -> Result<usize, CoreError> {
        let conn = self.open_db()?;
        let flushed = self.audit.flush_to_db(&conn)?;
        if let Err(e) = db::repository::prune_audit_log(&conn, AUDIT_RETENTION_DAYS, &Utc::now()) {
            tracing::warn!("Failed to prune audit log: {e}");
        }
        Ok(flushed)
    }
}

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Key setup failed: {0}")]
    Crypto(#[from] CryptoError),
    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// In-memory audit log buffer. Entries are flushed to SQLite
/// when the buffer reaches capacity or on explicit flush.
pub struct AuditLogger {
    buffer: Mutex<Vec<AuditEntry>>,
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    /// `None` for unauthenticated calls.
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity: String,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    /// Returns `true` if the buffer has reached flush threshold.
    pub fn log(&self, user_id: Option<Uuid>, action: &str, entity: &str) -> bool {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(AuditEntry {
                timestamp: Utc::now(),
                user_id,
                action: action.to_string(),
                entity: entity.to_string(),
            });
            buf.len() >= AUDIT_BUFFER_CAPACITY
        } else {
            false
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    pub fn flush_to_db(&self, conn: &rusqlite::Connection) -> Result<usize, CoreError> {
        let entries = self.drain();
        if entries.is_empty() {
            return Ok(0);
        }

        let records: Vec<AuditRecord> = entries
            .iter()
            .map(|e| AuditRecord {
                timestamp: fmt_timestamp(&e.timestamp),
                user_id: e.user_id.map(|id| id.to_string()),
                action: e.action.clone(),
                entity: e.entity.clone(),
            })
            .collect();

        let count = records.len();
        db::repository::insert_audit_entries(conn, &records)?;

        tracing::debug!(count, "Flushed audit entries to database");
        Ok(count)
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}
