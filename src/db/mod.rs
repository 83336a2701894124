mod schema;
pub mod artworks;
pub mod messages;
pub mod sessions;

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

pub use artworks::{Artwork, NewArtwork};
pub use messages::{Message, NewMessage, Role};
pub use schema::{MIGRATIONS, SCHEMA, SCHEMA_VERSION};
pub use sessions::Session;

/// Generate a record id: entity prefix plus a random UUID.
///
/// The prefix keeps ids greppable in logs; the UUID makes rapid insertion
/// collision-safe, which a bare timestamp is not.
pub(crate) fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// Current time in unix milliseconds, strictly increasing within a process.
///
/// Creation timestamps double as the ordering key, so two inserts in the
/// same millisecond must not tie.
pub(crate) fn next_created_at() -> i64 {
    static LAST: AtomicI64 = AtomicI64::new(0);
    let now = Utc::now().timestamp_millis();
    let prev = LAST
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(if now > last { now } else { last + 1 })
        })
        .unwrap_or_else(|v| v);
    if now > prev {
        now
    } else {
        prev + 1
    }
}

pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Create missing tables and bring an older file up to the current
    /// schema version. Safe to call on every startup; the whole step runs
    /// in one transaction.
    pub fn initialize(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(SCHEMA)?;

        let stored: Option<i32> = tx
            .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
            .optional()?;

        match stored {
            None => {
                // Fresh file: the baseline already has the latest layout.
                tx.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    [SCHEMA_VERSION],
                )?;
            }
            Some(version) if version < SCHEMA_VERSION => {
                for (target, sql) in MIGRATIONS {
                    if *target > version {
                        tracing::info!(from = version, to = target, "applying schema migration");
                        tx.execute_batch(sql)?;
                    }
                }
                tx.execute("UPDATE schema_version SET version = ?", [SCHEMA_VERSION])?;
            }
            Some(_) => {}
        }

        tx.commit()?;
        Ok(())
    }
}
