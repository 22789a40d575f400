//! Durable storage over SQLite.
//!
//! Each [`SqliteStorage`] serves one partition of the `entries` table. Reads
//! come from an in-memory snapshot loaded by `initialize`; writes update the
//! snapshot immediately and are applied to the database, in order, by a
//! single background writer task.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio_rusqlite::{Connection, params};

use super::{StorageBackend, migrations};
use crate::Error;

/// Area of the `entries` table a backend reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Shared by every session.
    Local,
    /// Private to one session id.
    Session(String),
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Local => f.write_str("local"),
            Partition::Session(id) => write!(f, "session:{id}"),
        }
    }
}

type Ack = oneshot::Sender<Result<(), Error>>;

enum WriteOp {
    Set { key: String, value: String, ack: Option<Ack> },
    Remove { key: String },
    Clear,
    Flush { ack: Ack },
}

/// SQLite-backed key/value store for one partition.
pub struct SqliteStorage {
    partition: Partition,
    snapshot: RwLock<HashMap<String, String>>,
    initialized: AtomicBool,
    conn: Connection,
    writer: mpsc::UnboundedSender<WriteOp>,
}

impl SqliteStorage {
    /// Open a database at `path` and serve `partition` from it.
    ///
    /// Creates the file if it doesn't exist, applies pragmas, runs pending
    /// migrations and starts the writer task. Call
    /// [`StorageBackend::initialize`] before use.
    pub async fn open(path: impl AsRef<Path>, partition: Partition) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::from_connection(conn, partition).await
    }

    /// Open a private in-memory database, for tests.
    pub async fn open_in_memory(partition: Partition) -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::from_connection(conn, partition).await
    }

    async fn from_connection(conn: Connection, partition: Partition) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;
                 PRAGMA temp_store=MEMORY;
                 PRAGMA busy_timeout=5000;",
            )?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        let (writer, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(conn.clone(), partition.to_string(), rx));

        Ok(Self {
            partition,
            snapshot: RwLock::new(HashMap::new()),
            initialized: AtomicBool::new(false),
            conn,
            writer,
        })
    }

    fn ensure_initialized(&self) -> Result<(), Error> {
        if self.initialized.load(Ordering::Acquire) { Ok(()) } else { Err(Error::NotInitialized) }
    }

    fn enqueue(&self, op: WriteOp) -> Result<(), Error> {
        self.writer.send(op).map_err(|_| Error::WriterClosed)
    }
}

#[async_trait]
impl StorageBackend for SqliteStorage {
    async fn initialize(&self) -> Result<(), Error> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        let partition = self.partition.to_string();
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<(String, String)>, Error> {
                let mut stmt = conn.prepare("SELECT key, value FROM entries WHERE partition = ?1")?;
                let rows = stmt
                    .query_map(params![partition], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        let loaded = rows.len();
        self.snapshot.write().extend(rows);
        self.initialized.store(true, Ordering::Release);
        tracing::debug!(partition = %self.partition, loaded, "storage snapshot loaded");
        Ok(())
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.snapshot.read().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.snapshot.write().insert(key.to_string(), value.to_string());
        self.enqueue(WriteOp::Set { key: key.to_string(), value: value.to_string(), ack: None })
    }

    async fn set_user_data(&self, key: &str, value: &str) -> Result<(), Error> {
        self.ensure_initialized()?;
        let previous = self.snapshot.write().insert(key.to_string(), value.to_string());

        let (ack, done) = oneshot::channel();
        let result = match self.enqueue(WriteOp::Set { key: key.to_string(), value: value.to_string(), ack: Some(ack) })
        {
            Ok(()) => done.await.unwrap_or_else(|_| Err(Error::WriterClosed)),
            Err(err) => Err(err),
        };

        if result.is_err() {
            let mut snapshot = self.snapshot.write();
            match previous {
                Some(old) => snapshot.insert(key.to_string(), old),
                None => snapshot.remove(key),
            };
        }
        result
    }

    fn remove_item(&self, key: &str) {
        if self.snapshot.write().remove(key).is_none() {
            return;
        }
        if let Err(err) = self.enqueue(WriteOp::Remove { key: key.to_string() }) {
            tracing::warn!(key, error = %err, "failed to queue removal");
        }
    }

    fn keys(&self) -> Vec<String> {
        self.snapshot.read().keys().cloned().collect()
    }

    fn contains_key(&self, key: &str) -> bool {
        self.snapshot.read().contains_key(key)
    }

    fn clear(&self) {
        self.snapshot.write().clear();
        if let Err(err) = self.enqueue(WriteOp::Clear) {
            tracing::warn!(partition = %self.partition, error = %err, "failed to queue clear");
        }
    }

    async fn flush(&self) -> Result<(), Error> {
        let (ack, done) = oneshot::channel();
        self.enqueue(WriteOp::Flush { ack })?;
        done.await.unwrap_or_else(|_| Err(Error::WriterClosed))
    }
}

/// Apply queued writes in arrival order until every sender is dropped.
async fn run_writer(conn: Connection, partition: String, mut rx: mpsc::UnboundedReceiver<WriteOp>) {
    while let Some(op) = rx.recv().await {
        match op {
            WriteOp::Set { key, value, ack } => {
                let result = upsert(&conn, partition.clone(), key.clone(), value).await;
                match ack {
                    Some(ack) => {
                        let _ = ack.send(result);
                    }
                    None => {
                        if let Err(err) = result {
                            tracing::warn!(%partition, key = %key, error = %err, "queued write failed");
                        }
                    }
                }
            }
            WriteOp::Remove { key } => {
                if let Err(err) = delete(&conn, partition.clone(), Some(key.clone())).await {
                    tracing::warn!(%partition, key = %key, error = %err, "queued removal failed");
                }
            }
            WriteOp::Clear => {
                if let Err(err) = delete(&conn, partition.clone(), None).await {
                    tracing::warn!(%partition, error = %err, "queued clear failed");
                }
            }
            WriteOp::Flush { ack } => {
                let _ = ack.send(Ok(()));
            }
        }
    }
}

async fn upsert(conn: &Connection, partition: String, key: String, value: String) -> Result<(), Error> {
    conn.call(move |conn| -> Result<(), Error> {
        conn.execute(
            "INSERT INTO entries (partition, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(partition, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![partition, key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    })
    .await
    .map_err(Error::from)
}

async fn delete(conn: &Connection, partition: String, key: Option<String>) -> Result<(), Error> {
    conn.call(move |conn| -> Result<(), Error> {
        match key {
            Some(key) => conn.execute("DELETE FROM entries WHERE partition = ?1 AND key = ?2", params![partition, key])?,
            None => conn.execute("DELETE FROM entries WHERE partition = ?1", params![partition])?,
        };
        Ok(())
    })
    .await
    .map_err(Error::from)
}
