//! [`SqliteStore`], the SQLite implementation of [`DocumentStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use tokio::sync::broadcast;
use tracing::debug;

use hype_core::store::{
  Change, ChangeKind, CollectionPath, DocPath, Document, DocumentStore, Patch, Watch, WriteBatch,
  WriteOp,
};

use crate::{Error, Result, schema::SCHEMA};

/// Changes buffered per watcher before it is reported as lagged.
const CHANGE_BUFFER: usize = 1024;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A document store backed by a single SQLite file.
///
/// Cloning is cheap; clones share the connection and the change channel.
/// Changes are broadcast from the connection thread right after each write
/// commits, so watchers see them in commit order.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  changes: broadcast::Sender<Change>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    let (changes, _) = broadcast::channel(CHANGE_BUFFER);
    Ok(Self { conn, changes })
  }
}

/// Broadcast `change`. No receivers is fine: nobody is watching.
fn notify(changes: &broadcast::Sender<Change>, change: Change) { let _ = changes.send(change); }

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn other(e: serde_json::Error) -> tokio_rusqlite::Error { tokio_rusqlite::Error::Other(Box::new(e)) }

fn encode(doc: &Document) -> tokio_rusqlite::Result<String> { serde_json::to_string(doc).map_err(other) }

fn read_row(conn: &rusqlite::Connection, path: &DocPath) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT body FROM documents WHERE collection = ?1 AND key = ?2",
      rusqlite::params![path.collection.as_str(), path.key],
      |r| r.get(0),
    )
    .optional()
}

fn write_row(conn: &rusqlite::Connection, path: &DocPath, body: &str) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO documents (collection, key, body) VALUES (?1, ?2, ?3)
     ON CONFLICT (collection, key) DO UPDATE SET body = excluded.body",
    rusqlite::params![path.collection.as_str(), path.key, body],
  )?;
  Ok(())
}

/// Returns `true` if a row was removed.
fn delete_row(conn: &rusqlite::Connection, path: &DocPath) -> rusqlite::Result<bool> {
  let n = conn.execute(
    "DELETE FROM documents WHERE collection = ?1 AND key = ?2",
    rusqlite::params![path.collection.as_str(), path.key],
  )?;
  Ok(n > 0)
}

/// Read-modify-write one document. `None` if it does not exist.
fn patch_row(
  conn: &rusqlite::Connection,
  path: &DocPath,
  patch: &Patch,
) -> tokio_rusqlite::Result<Option<Document>> {
  let Some(body) = read_row(conn, path)? else {
    return Ok(None);
  };
  let mut doc: Document = serde_json::from_str(&body).map_err(other)?;
  patch.apply(&mut doc);
  write_row(conn, path, &encode(&doc)?)?;
  Ok(Some(doc))
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for SqliteStore {
  type Error = Error;

  async fn get(&self, path: &DocPath) -> Result<Option<Document>> {
    let p = path.clone();
    let body = self.conn.call(move |conn| Ok(read_row(conn, &p)?)).await?;
    Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
  }

  async fn put(&self, path: &DocPath, doc: Document) -> Result<()> {
    let p = path.clone();
    let body = serde_json::to_string(&doc)?;
    let changes = self.changes.clone();
    self
      .conn
      .call(move |conn| {
        write_row(conn, &p, &body)?;
        notify(&changes, Change {
          path: p,
          kind: ChangeKind::Upserted(doc),
        });
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn update(&self, path: &DocPath, patch: Patch) -> Result<()> {
    let p = path.clone();
    let changes = self.changes.clone();
    let found = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(doc) = patch_row(&tx, &p, &patch)? else {
          return Ok(false);
        };
        tx.commit()?;
        notify(&changes, Change {
          path: p,
          kind: ChangeKind::Upserted(doc),
        });
        Ok(true)
      })
      .await?;

    if !found {
      return Err(Error::NotFound(path.to_string()));
    }
    Ok(())
  }

  async fn delete(&self, path: &DocPath) -> Result<()> {
    let p = path.clone();
    let changes = self.changes.clone();
    self
      .conn
      .call(move |conn| {
        if delete_row(conn, &p)? {
          notify(&changes, Change {
            path: p,
            kind: ChangeKind::Deleted,
          });
        }
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list(&self, collection: &CollectionPath) -> Result<Vec<(String, Document)>> {
    let c = collection.as_str().to_owned();
    let rows: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT key, body FROM documents WHERE collection = ?1 ORDER BY key")?;
        let rows = stmt
          .query_map(rusqlite::params![c], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(key, body)| Ok((key, serde_json::from_str(&body)?)))
      .collect()
  }

  fn watch(&self, collection: &CollectionPath) -> Watch {
    Watch::new(collection.clone(), self.changes.subscribe())
  }

  async fn commit(&self, batch: WriteBatch) -> Result<()> {
    if batch.is_empty() {
      return Ok(());
    }
    let ops = batch.into_ops();
    let count = ops.len();
    let notifier = self.changes.clone();

    // The inner `Err` names the document an update could not find; the
    // transaction is dropped uncommitted in that case.
    let outcome: std::result::Result<usize, DocPath> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut changes = Vec::with_capacity(ops.len());
        for op in ops {
          match op {
            WriteOp::Put(path, doc) => {
              write_row(&tx, &path, &encode(&doc)?)?;
              changes.push(Change {
                path,
                kind: ChangeKind::Upserted(doc),
              });
            }
            WriteOp::Update(path, patch) => match patch_row(&tx, &path, &patch)? {
              Some(doc) => changes.push(Change {
                path,
                kind: ChangeKind::Upserted(doc),
              }),
              None => return Ok(Err(path)),
            },
            WriteOp::Delete(path) => {
              if delete_row(&tx, &path)? {
                changes.push(Change {
                  path,
                  kind: ChangeKind::Deleted,
                });
              }
            }
          }
        }
        tx.commit()?;
        let changed = changes.len();
        for change in changes {
          notify(&notifier, change);
        }
        Ok(Ok(changed))
      })
      .await?;

    let changed = outcome.map_err(|path| Error::NotFound(path.to_string()))?;
    debug!(ops = count, changed, "committed batch");
    Ok(())
  }
}
