// Client registry and pending-message queue backed by SQLite

use crate::relay::error::StoreError;
use crate::relay::protocol::{ClientId, MessageType, PublicKey, UserEntry};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::{Duration, SystemTime};

pub type Result<T> = std::result::Result<T, StoreError>;

/// A registered client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub id: ClientId,
    pub name: String,
    pub public_key: PublicKey,
    pub last_seen: SystemTime,
}

/// A message about to be queued; the store assigns its id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub to: ClientId,
    pub from: ClientId,
    pub kind: MessageType,
    pub content: Vec<u8>,
}

/// A queued message waiting for its recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub id: u32,
    pub to: ClientId,
    pub from: ClientId,
    pub kind: MessageType,
    pub content: Vec<u8>,
}

/// Persistence operations the request handlers depend on.
///
/// Each call is atomic on its own. Failures are returned, never swallowed.
pub trait RelayStore {
    fn username_exists(&self, name: &str) -> Result<bool>;

    fn client_exists(&self, id: &ClientId) -> Result<bool>;

    /// Insert a new client. Fails if the id or the name is already taken.
    fn create_client(&self, record: &ClientRecord) -> Result<()>;

    /// Every registered client as (id, name)
    fn client_list(&self) -> Result<Vec<UserEntry>>;

    fn public_key(&self, id: &ClientId) -> Result<Option<PublicKey>>;

    /// Returns false when no such client exists
    fn touch_last_seen(&self, id: &ClientId, at: SystemTime) -> Result<bool>;

    /// Queue a message and return its new id
    fn enqueue_message(&self, message: &NewMessage) -> Result<u32>;

    /// Messages addressed to `id`, oldest first
    fn pending_messages(&self, id: &ClientId) -> Result<Vec<PendingMessage>>;

    /// Returns false when the message was already gone
    fn delete_message(&self, id: u32) -> Result<bool>;
}

fn to_unix_secs(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn from_unix_secs(secs: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

fn client_id_column(bytes: &[u8]) -> Result<ClientId> {
    ClientId::from_slice(bytes)
        .map_err(|_| StoreError::Corrupt(format!("client id of {} bytes", bytes.len())))
}

/// SQLite implementation of [`RelayStore`]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self {
            conn: Connection::open(path)?,
        };
        store.initialize_db()?;

        tracing::info!("Opened relay database at {:?}", path);
        Ok(store)
    }

    /// Throwaway database, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.initialize_db()?;
        Ok(store)
    }

    /// Initialize database schema
    fn initialize_db(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        // Clients table
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS clients (
                id BLOB PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                public_key BLOB NOT NULL,
                last_seen INTEGER NOT NULL
            )",
            [],
        )?;

        // Messages table; AUTOINCREMENT keeps ids strictly increasing
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                to_client BLOB NOT NULL,
                from_client BLOB NOT NULL,
                type INTEGER NOT NULL,
                content BLOB NOT NULL,
                FOREIGN KEY (to_client) REFERENCES clients(id),
                FOREIGN KEY (from_client) REFERENCES clients(id)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_to_client ON messages(to_client)",
            [],
        )?;

        Ok(())
    }

    /// Look up a full client record
    pub fn get_client(&self, id: &ClientId) -> Result<Option<ClientRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT name, public_key, last_seen FROM clients WHERE id = ?1",
                params![&id.as_bytes()[..]],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(name, key, last_seen)| {
            let public_key = PublicKey::from_slice(&key)
                .map_err(|_| StoreError::Corrupt(format!("public key of {} bytes", key.len())))?;
            Ok(ClientRecord {
                id: *id,
                name,
                public_key,
                last_seen: from_unix_secs(last_seen),
            })
        })
        .transpose()
    }
}

impl RelayStore for SqliteStore {
    fn username_exists(&self, name: &str) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM clients WHERE name = ?1)",
            params![name],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }

    fn client_exists(&self, id: &ClientId) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM clients WHERE id = ?1)",
            params![&id.as_bytes()[..]],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }

    fn create_client(&self, record: &ClientRecord) -> Result<()> {
        if self.client_exists(&record.id)? {
            return Err(StoreError::DuplicateClientId(record.id.to_string()));
        }

        self.conn.execute(
            "INSERT INTO clients (id, name, public_key, last_seen) VALUES (?1, ?2, ?3, ?4)",
            params![
                &record.id.as_bytes()[..],
                record.name,
                &record.public_key.as_bytes()[..],
                to_unix_secs(record.last_seen),
            ],
        )?;

        Ok(())
    }

    fn client_list(&self) -> Result<Vec<UserEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM clients ORDER BY rowid")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, name)| -> Result<UserEntry> {
                Ok(UserEntry {
                    id: client_id_column(&id)?,
                    name,
                })
            })
            .collect()
    }

    fn public_key(&self, id: &ClientId) -> Result<Option<PublicKey>> {
        Ok(self.get_client(id)?.map(|record| record.public_key))
    }

    fn touch_last_seen(&self, id: &ClientId, at: SystemTime) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE clients SET last_seen = ?1 WHERE id = ?2",
            params![to_unix_secs(at), &id.as_bytes()[..]],
        )?;
        Ok(updated > 0)
    }

    fn enqueue_message(&self, message: &NewMessage) -> Result<u32> {
        self.conn.execute(
            "INSERT INTO messages (to_client, from_client, type, content) VALUES (?1, ?2, ?3, ?4)",
            params![
                &message.to.as_bytes()[..],
                &message.from.as_bytes()[..],
                u8::from(message.kind),
                message.content,
            ],
        )?;

        let rowid = self.conn.last_insert_rowid();
        u32::try_from(rowid).map_err(|_| StoreError::MessageIdOverflow(rowid))
    }

    fn pending_messages(&self, id: &ClientId) -> Result<Vec<PendingMessage>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, from_client, type, content FROM messages
             WHERE to_client = ?1 ORDER BY id ASC",
        )?;

        let rows = stmt
            .query_map(params![&id.as_bytes()[..]], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, u8>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(message_id, from, kind, content)| -> Result<PendingMessage> {
                Ok(PendingMessage {
                    id: u32::try_from(message_id)
                        .map_err(|_| StoreError::MessageIdOverflow(message_id))?,
                    to: *id,
                    from: client_id_column(&from)?,
                    kind: MessageType::try_from(kind)
                        .map_err(|_| StoreError::Corrupt(format!("message type {}", kind)))?,
                    content,
                })
            })
            .collect()
    }

    fn delete_message(&self, id: u32) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM messages WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}
