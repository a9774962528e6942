//! SQLite-backed record store.
//!
//! Tables:
//! - `users`: id, email (unique, case-insensitive), password_hash, created_at
//! - `libraries`: id, user_id, name, created_at
//! - `cards`: id, library_id, name, set_name, condition, foil, collector_number, usd_price, qty

use super::{Card, Library, NewCard, RecordStore, StoreError, StoreResult, User};
use crate::auth::UserId;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        password_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS libraries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_libraries_user ON libraries(user_id);

    CREATE TABLE IF NOT EXISTS cards (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        library_id INTEGER NOT NULL REFERENCES libraries(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        set_name TEXT NOT NULL DEFAULT '',
        condition TEXT NOT NULL DEFAULT '',
        foil INTEGER NOT NULL DEFAULT 0,
        collector_number TEXT NOT NULL DEFAULT '',
        usd_price INTEGER NOT NULL DEFAULT 0,
        qty INTEGER NOT NULL DEFAULT 1
    );
    CREATE INDEX IF NOT EXISTS idx_cards_library ON cards(library_id);";

const CARD_COLUMNS: &str =
    "id, library_id, name, set_name, condition, foil, collector_number, usd_price, qty";

/// Single connection behind a mutex; statements are short and never
/// held across an await point.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path.
    pub fn open(db_path: &Path) -> StoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Corrupt(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }
        let conn = Connection::open(db_path)?;
        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn library_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Library> {
    Ok(Library {
        id: row.get(0)?,
        owner: UserId(row.get(1)?),
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn card_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        library_id: row.get(1)?,
        name: row.get(2)?,
        set_name: row.get(3)?,
        condition: row.get(4)?,
        foil: row.get(5)?,
        collector_number: row.get(6)?,
        usd_price: row.get(7)?,
        qty: row.get(8)?,
    })
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        email: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn create_user(&self, email: &str, password_hash: &str) -> StoreResult<User> {
        let email = email.trim();
        let now = epoch_secs();
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (email, password_hash, created_at) VALUES (?1, ?2, ?3)",
            params![email, password_hash, now],
        );

        match result {
            Ok(_) => Ok(User {
                id: UserId(conn.last_insert_rowid()),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                created_at: now,
            }),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Conflict(format!("email '{email}' is already registered")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT id, email, password_hash, created_at FROM users
                 WHERE email = ?1 COLLATE NOCASE",
                params![email.trim()],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn create_library(&self, owner: UserId, name: &str) -> StoreResult<Library> {
        let now = epoch_secs();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO libraries (user_id, name, created_at) VALUES (?1, ?2, ?3)",
            params![owner.get(), name, now],
        )?;
        Ok(Library {
            id: conn.last_insert_rowid(),
            owner,
            name: name.to_string(),
            created_at: now,
        })
    }

    async fn list_libraries(&self, owner: UserId) -> StoreResult<Vec<Library>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, created_at FROM libraries
             WHERE user_id = ?1 ORDER BY id",
        )?;
        let libraries = stmt
            .query_map(params![owner.get()], library_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(libraries)
    }

    async fn get_library(&self, id: i64, owner: UserId) -> StoreResult<Option<Library>> {
        let conn = self.conn.lock();
        let library = conn
            .query_row(
                "SELECT id, user_id, name, created_at FROM libraries
                 WHERE id = ?1 AND user_id = ?2",
                params![id, owner.get()],
                library_from_row,
            )
            .optional()?;
        Ok(library)
    }

    async fn library_exists(&self, id: i64) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM libraries WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn delete_library(&self, id: i64, owner: UserId) -> StoreResult<bool> {
        let conn = self.conn.lock();
        // cards go with it via ON DELETE CASCADE
        let deleted = conn.execute(
            "DELETE FROM libraries WHERE id = ?1 AND user_id = ?2",
            params![id, owner.get()],
        )?;
        Ok(deleted > 0)
    }

    async fn create_card(&self, library_id: i64, card: &NewCard) -> StoreResult<Card> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO cards (library_id, name, set_name, condition, foil, collector_number, usd_price, qty)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                library_id,
                card.name,
                card.set_name,
                card.condition,
                card.foil,
                card.collector_number,
                card.usd_price,
                card.qty,
            ],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1"),
            params![id],
            card_from_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::Corrupt(format!("card {id} vanished after insert")))
    }

    async fn list_cards(&self, library_id: i64) -> StoreResult<Vec<Card>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE library_id = ?1 ORDER BY id"
        ))?;
        let cards = stmt
            .query_map(params![library_id], card_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    async fn get_card(&self, id: i64) -> StoreResult<Option<Card>> {
        let conn = self.conn.lock();
        let card = conn
            .query_row(
                &format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1"),
                params![id],
                card_from_row,
            )
            .optional()?;
        Ok(card)
    }

    async fn move_card(&self, card_id: i64, from: i64, to: i64) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let moved = conn.execute(
            "UPDATE cards SET library_id = ?3 WHERE id = ?1 AND library_id = ?2",
            params![card_id, from, to],
        )?;
        Ok(moved > 0)
    }

    async fn delete_card(&self, card_id: i64, library_id: i64) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM cards WHERE id = ?1 AND library_id = ?2",
            params![card_id, library_id],
        )?;
        Ok(deleted > 0)
    }
}

/// Current Unix epoch in seconds.
fn epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
