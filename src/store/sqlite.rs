//! SQLite implementation of the session store

use crate::session::{ContactRecord, CrawlSession, SessionProgress, SessionStatus};
use crate::store::schema::initialize_schema;
use crate::store::traits::{SessionStore, SessionUpdate, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::BTreeMap;
use std::path::Path;

/// SQLite session store backend
pub struct SqliteSessionStore {
    conn: Connection,
}

impl SqliteSessionStore {
    /// Opens (or creates) the session database at the given path
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn session_rowid(&self, owner_id: &str, session_id: &str) -> StoreResult<Option<i64>> {
        let rowid = self
            .conn
            .query_row(
                "SELECT id FROM sessions WHERE owner_id = ?1 AND session_id = ?2",
                params![owner_id, session_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(rowid)
    }

    fn load_session(&self, rowid: i64) -> StoreResult<CrawlSession> {
        let raw = self.conn.query_row(
            "SELECT owner_id, session_id, start_url, depth, max_pages, status,
             start_time, end_time, pages_visited, total_contacts, unique_contacts
             FROM sessions WHERE id = ?1",
            params![rowid],
            |row| {
                Ok(RawSessionRow {
                    owner_id: row.get(0)?,
                    session_id: row.get(1)?,
                    start_url: row.get(2)?,
                    depth: row.get(3)?,
                    max_pages: row.get(4)?,
                    status: row.get(5)?,
                    start_time: row.get(6)?,
                    end_time: row.get(7)?,
                    pages_visited: row.get(8)?,
                    total_contacts: row.get(9)?,
                    unique_contacts: row.get(10)?,
                })
            },
        )?;

        let status = SessionStatus::from_db_string(&raw.status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown status '{}'", raw.status)))?;

        let start_time = parse_timestamp(&raw.start_time)?;
        let end_time = raw.end_time.as_deref().map(parse_timestamp).transpose()?;

        Ok(CrawlSession {
            session_id: raw.session_id,
            owner_id: raw.owner_id,
            start_url: raw.start_url,
            depth: raw.depth,
            max_pages: raw.max_pages,
            status,
            start_time,
            end_time,
            progress: SessionProgress {
                pages_visited: raw.pages_visited,
                total_contacts: raw.total_contacts,
                unique_contacts: raw.unique_contacts,
            },
            contacts: self.load_contacts(rowid)?,
            logs: self.load_logs(rowid)?,
        })
    }

    fn load_contacts(&self, rowid: i64) -> StoreResult<Vec<ContactRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, email, phone, role, source FROM session_contacts
             WHERE session_rowid = ?1 ORDER BY position ASC",
        )?;

        let contacts = stmt
            .query_map(params![rowid], |row| {
                Ok(ContactRecord {
                    name: row.get(0)?,
                    email: row.get(1)?,
                    phone: row.get(2)?,
                    role: row.get(3)?,
                    source: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(contacts)
    }

    fn load_logs(&self, rowid: i64) -> StoreResult<BTreeMap<u32, String>> {
        let mut stmt = self.conn.prepare(
            "SELECT ordinal, message FROM session_logs
             WHERE session_rowid = ?1 ORDER BY ordinal ASC",
        )?;

        let logs = stmt
            .query_map(params![rowid], |row| {
                Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(logs)
    }
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{raw}': {e}")))
}

fn replace_contacts(tx: &Transaction<'_>, rowid: i64, contacts: &[ContactRecord]) -> StoreResult<()> {
    tx.execute(
        "DELETE FROM session_contacts WHERE session_rowid = ?1",
        params![rowid],
    )?;

    let mut stmt = tx.prepare(
        "INSERT INTO session_contacts (session_rowid, position, name, email, phone, role, source)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;

    for (position, contact) in contacts.iter().enumerate() {
        stmt.execute(params![
            rowid,
            position as i64,
            contact.name,
            contact.email,
            contact.phone,
            contact.role,
            contact.source,
        ])?;
    }

    Ok(())
}

fn replace_logs(tx: &Transaction<'_>, rowid: i64, logs: &BTreeMap<u32, String>) -> StoreResult<()> {
    tx.execute(
        "DELETE FROM session_logs WHERE session_rowid = ?1",
        params![rowid],
    )?;

    let mut stmt = tx.prepare(
        "INSERT INTO session_logs (session_rowid, ordinal, message) VALUES (?1, ?2, ?3)",
    )?;

    for (ordinal, message) in logs {
        stmt.execute(params![rowid, ordinal, message])?;
    }

    Ok(())
}

struct RawSessionRow {
    owner_id: String,
    session_id: String,
    start_url: String,
    depth: u32,
    max_pages: u32,
    status: String,
    start_time: String,
    end_time: Option<String>,
    pages_visited: u32,
    total_contacts: u32,
    unique_contacts: u32,
}

impl SessionStore for SqliteSessionStore {
    fn create_session(&mut self, session: &CrawlSession) -> StoreResult<()> {
        if self
            .session_rowid(&session.owner_id, &session.session_id)?
            .is_some()
        {
            return Err(StoreError::DuplicateSession {
                owner_id: session.owner_id.clone(),
                session_id: session.session_id.clone(),
            });
        }

        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO sessions (owner_id, session_id, start_url, depth, max_pages, status,
             start_time, end_time, pages_visited, total_contacts, unique_contacts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                session.owner_id,
                session.session_id,
                session.start_url,
                session.depth,
                session.max_pages,
                session.status.to_db_string(),
                session.start_time.to_rfc3339(),
                session.end_time.map(|t| t.to_rfc3339()),
                session.progress.pages_visited,
                session.progress.total_contacts,
                session.progress.unique_contacts,
            ],
        )?;

        let rowid = tx.last_insert_rowid();
        replace_contacts(&tx, rowid, &session.contacts)?;
        replace_logs(&tx, rowid, &session.logs)?;

        tx.commit()?;
        Ok(())
    }

    fn get_session(&self, owner_id: &str, session_id: &str) -> StoreResult<Option<CrawlSession>> {
        match self.session_rowid(owner_id, session_id)? {
            Some(rowid) => Ok(Some(self.load_session(rowid)?)),
            None => Ok(None),
        }
    }

    fn list_sessions(&self, owner_id: &str) -> StoreResult<Vec<CrawlSession>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM sessions WHERE owner_id = ?1 ORDER BY id ASC")?;

        let rowids = stmt
            .query_map(params![owner_id], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        rowids
            .into_iter()
            .map(|rowid| self.load_session(rowid))
            .collect()
    }

    fn update_session(
        &mut self,
        owner_id: &str,
        session_id: &str,
        update: &SessionUpdate,
    ) -> StoreResult<bool> {
        let Some(rowid) = self.session_rowid(owner_id, session_id)? else {
            return Ok(false);
        };

        let tx = self.conn.transaction()?;

        if let Some(status) = update.status {
            tx.execute(
                "UPDATE sessions SET status = ?1 WHERE id = ?2",
                params![status.to_db_string(), rowid],
            )?;
        }

        if let Some(end_time) = update.end_time {
            tx.execute(
                "UPDATE sessions SET end_time = ?1 WHERE id = ?2",
                params![end_time.to_rfc3339(), rowid],
            )?;
        }

        if let Some(progress) = update.progress {
            tx.execute(
                "UPDATE sessions SET pages_visited = ?1, total_contacts = ?2, unique_contacts = ?3
                 WHERE id = ?4",
                params![
                    progress.pages_visited,
                    progress.total_contacts,
                    progress.unique_contacts,
                    rowid
                ],
            )?;
        }

        if let Some(contacts) = &update.contacts {
            replace_contacts(&tx, rowid, contacts)?;
        }

        if let Some(logs) = &update.logs {
            replace_logs(&tx, rowid, logs)?;
        }

        tx.commit()?;
        Ok(true)
    }

    fn append_log(
        &mut self,
        owner_id: &str,
        session_id: &str,
        ordinal: u32,
        message: &str,
    ) -> StoreResult<bool> {
        let Some(rowid) = self.session_rowid(owner_id, session_id)? else {
            return Ok(false);
        };

        self.conn.execute(
            "INSERT INTO session_logs (session_rowid, ordinal, message) VALUES (?1, ?2, ?3)",
            params![rowid, ordinal, message],
        )?;
        Ok(true)
    }

    fn update_progress(
        &mut self,
        owner_id: &str,
        session_id: &str,
        progress: &SessionProgress,
    ) -> StoreResult<bool> {
        let Some(rowid) = self.session_rowid(owner_id, session_id)? else {
            return Ok(false);
        };

        self.conn.execute(
            "UPDATE sessions SET pages_visited = ?1, total_contacts = ?2, unique_contacts = ?3
             WHERE id = ?4",
            params![
                progress.pages_visited,
                progress.total_contacts,
                progress.unique_contacts,
                rowid
            ],
        )?;
        Ok(true)
    }

    fn update_contacts(
        &mut self,
        owner_id: &str,
        session_id: &str,
        contacts: &[ContactRecord],
    ) -> StoreResult<bool> {
        let Some(rowid) = self.session_rowid(owner_id, session_id)? else {
            return Ok(false);
        };

        let tx = self.conn.transaction()?;
        replace_contacts(&tx, rowid, contacts)?;
        tx.commit()?;
        Ok(true)
    }

    fn delete_session(&mut self, owner_id: &str, session_id: &str) -> StoreResult<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM sessions WHERE owner_id = ?1 AND session_id = ?2",
            params![owner_id, session_id],
        )?;
        Ok(deleted > 0)
    }
}
