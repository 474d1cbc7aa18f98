//! Database schema for the session store

/// SQL schema for the session database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl session, scoped to its owner
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    start_url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    max_pages INTEGER NOT NULL,
    status TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT,
    pages_visited INTEGER NOT NULL DEFAULT 0,
    total_contacts INTEGER NOT NULL DEFAULT 0,
    unique_contacts INTEGER NOT NULL DEFAULT 0,
    UNIQUE(owner_id, session_id)
);

CREATE INDEX IF NOT EXISTS idx_sessions_owner ON sessions(owner_id);
CREATE INDEX IF NOT EXISTS idx_sessions_start_time ON sessions(start_time);

-- Raw extracted contacts, in append order
CREATE TABLE IF NOT EXISTS session_contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_rowid INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    email TEXT,
    phone TEXT,
    role TEXT,
    source TEXT NOT NULL,
    UNIQUE(session_rowid, position)
);

CREATE INDEX IF NOT EXISTS idx_contacts_session ON session_contacts(session_rowid);

-- Log lines keyed by a strictly increasing ordinal starting at 1
CREATE TABLE IF NOT EXISTS session_logs (
    session_rowid INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    ordinal INTEGER NOT NULL,
    message TEXT NOT NULL,
    UNIQUE(session_rowid, ordinal)
);

CREATE INDEX IF NOT EXISTS idx_logs_session ON session_logs(session_rowid);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
