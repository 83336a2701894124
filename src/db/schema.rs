//! Schema definition and versioned migrations.
//!
//! The baseline schema is created with `CREATE TABLE IF NOT EXISTS` so
//! startup is idempotent, but column changes never go through the baseline:
//! an already-existing table ignores additions there. Every layout change
//! after version 1 gets an explicit migration step, applied in order when
//! the stored `schema_version` is older than [`SCHEMA_VERSION`].

/// Version the code expects. Bump together with a new [`MIGRATIONS`] entry.
pub const SCHEMA_VERSION: i32 = 2;

pub const SCHEMA: &str = r#"
-- Single-row version marker for migrations
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

-- Artworks: one recognized piece plus its recognition result
CREATE TABLE IF NOT EXISTS artworks (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL DEFAULT 'artwork',
    museum_name TEXT NOT NULL,
    title TEXT NOT NULL,
    artist TEXT NOT NULL,
    image_uri TEXT,           -- private copy under the media store, not the capture URI
    description TEXT,
    created_at INTEGER NOT NULL,  -- unix millis
    session_id TEXT NOT NULL,     -- server-assigned conversation id
    audio_url TEXT,               -- backfilled once audio synthesis completes
    liked INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_artworks_created_at ON artworks(created_at);
CREATE INDEX IF NOT EXISTS idx_artworks_museum ON artworks(museum_name);

-- Sessions: one conversational thread per artwork
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL DEFAULT 'session',
    created_at INTEGER NOT NULL,
    artwork_id TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_artwork ON sessions(artwork_id);

-- Messages: one turn within a session, keyed by session_id only
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL DEFAULT 'message',
    session_id TEXT NOT NULL,
    role TEXT NOT NULL,       -- 'user' or 'assistant'
    text TEXT NOT NULL,
    audio_path TEXT,          -- local copy of synthesized speech, if any
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id);
CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages(created_at);
"#;

/// Ordered migration steps, `(target_version, sql)`.
pub const MIGRATIONS: &[(i32, &str)] = &[
    // v2: liked flag on artworks
    (
        2,
        "ALTER TABLE artworks ADD COLUMN liked INTEGER NOT NULL DEFAULT 0;",
    ),
];
