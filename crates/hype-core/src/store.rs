//! The `DocumentStore` trait and supporting path, patch, batch and change
//! types.
//!
//! The trait is implemented by storage backends (e.g. `hype-store-sqlite`).
//! The reconciliation engine depends on this abstraction, not on any concrete
//! backend.

use std::{fmt, future::Future};

use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::{Error, Result};

/// A stored record: a JSON object.
pub type Document = Map<String, Value>;

/// Most operations a single [`WriteBatch`] may hold.
pub const MAX_BATCH_OPS: usize = 500;

// ─── Paths ───────────────────────────────────────────────────────────────────

/// A stable user identity, supplied by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// A slash-separated collection path such as `users/<uid>/games`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
  pub fn new(path: impl Into<String>) -> Self { Self(path.into()) }

  /// A user's game collection.
  pub fn games(user: &UserId) -> Self { Self(format!("users/{user}/games")) }

  /// A user's settings documents (the profile lives here).
  pub fn settings(user: &UserId) -> Self { Self(format!("users/{user}/settings")) }

  /// The global username reservation table.
  pub fn usernames() -> Self { Self("usernames".to_string()) }

  pub fn doc(&self, key: impl Into<String>) -> DocPath {
    DocPath {
      collection: self.clone(),
      key:        key.into(),
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CollectionPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// The address of one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
  pub collection: CollectionPath,
  pub key:        String,
}

impl fmt::Display for DocPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.collection, self.key)
  }
}

// ─── Patches ─────────────────────────────────────────────────────────────────

/// One field-level change in a [`Patch`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
  /// Replace the field's value.
  Set(Value),
  /// Append each value not already present in the array.
  ArrayUnion(Vec<Value>),
  /// Remove every element equal to one of the values.
  ArrayRemove(Vec<Value>),
}

/// A merge-patch: fields it does not name are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
  ops: Vec<(String, FieldOp)>,
}

impl Patch {
  pub fn new() -> Self { Self::default() }

  pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
    self.ops.push((field.into(), FieldOp::Set(value.into())));
    self
  }

  pub fn array_union(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
    self.ops.push((field.into(), FieldOp::ArrayUnion(values)));
    self
  }

  pub fn array_remove(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
    self.ops.push((field.into(), FieldOp::ArrayRemove(values)));
    self
  }

  /// A patch setting exactly `fields` to their values in `source`. Fields
  /// absent from `source` are skipped.
  pub fn pick(source: &Document, fields: &[&str]) -> Self {
    let ops = fields
      .iter()
      .filter_map(|&f| {
        source
          .get(f)
          .map(|v| (f.to_string(), FieldOp::Set(v.clone())))
      })
      .collect();
    Self { ops }
  }

  pub fn fields(&self) -> impl Iterator<Item = &str> {
    self.ops.iter().map(|(f, _)| f.as_str())
  }

  pub fn is_empty(&self) -> bool { self.ops.is_empty() }

  /// Apply the patch to `doc` in order.
  pub fn apply(&self, doc: &mut Document) {
    for (field, op) in &self.ops {
      match op {
        FieldOp::Set(v) => {
          doc.insert(field.clone(), v.clone());
        }
        FieldOp::ArrayUnion(values) => {
          let slot = doc
            .entry(field.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
          if !slot.is_array() {
            *slot = Value::Array(Vec::new());
          }
          if let Value::Array(arr) = slot {
            for v in values {
              if !arr.contains(v) {
                arr.push(v.clone());
              }
            }
          }
        }
        FieldOp::ArrayRemove(values) => {
          if let Some(Value::Array(arr)) = doc.get_mut(field) {
            arr.retain(|v| !values.contains(v));
          }
        }
      }
    }
  }
}

// ─── Batches ─────────────────────────────────────────────────────────────────

/// A write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
  Put(DocPath, Document),
  Update(DocPath, Patch),
  Delete(DocPath),
}

/// Up to [`MAX_BATCH_OPS`] writes committed atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
  ops: Vec<WriteOp>,
}

impl WriteBatch {
  pub fn new() -> Self { Self::default() }

  /// Queue `op`. Fails once the batch holds [`MAX_BATCH_OPS`] operations.
  pub fn push(&mut self, op: WriteOp) -> Result<()> {
    if self.is_full() {
      return Err(Error::BatchFull(MAX_BATCH_OPS));
    }
    self.ops.push(op);
    Ok(())
  }

  pub fn delete(&mut self, path: DocPath) -> Result<()> { self.push(WriteOp::Delete(path)) }

  pub fn len(&self) -> usize { self.ops.len() }

  pub fn is_empty(&self) -> bool { self.ops.is_empty() }

  pub fn is_full(&self) -> bool { self.ops.len() >= MAX_BATCH_OPS }

  pub fn ops(&self) -> &[WriteOp] { &self.ops }

  pub fn into_ops(self) -> Vec<WriteOp> { self.ops }
}

// ─── Change notification ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
  /// Created or modified; carries the document as written.
  Upserted(Document),
  Deleted,
}

/// A single document change pushed to watchers.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
  pub path: DocPath,
  pub kind: ChangeKind,
}

/// Why a [`Watch`] could not deliver a change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
  /// The watcher fell behind and `0` changes were dropped; re-list to
  /// resynchronise.
  #[error("watcher lagged; {0} changes dropped")]
  Lagged(u64),
}

/// A push-based stream of changes to one collection.
///
/// Built over a [`broadcast`] channel shared by all watchers of a backend;
/// changes to other collections are filtered out. Dropping the `Watch`
/// unsubscribes.
pub struct Watch {
  collection: CollectionPath,
  rx:         broadcast::Receiver<Change>,
}

impl Watch {
  pub fn new(collection: CollectionPath, rx: broadcast::Receiver<Change>) -> Self {
    Self { collection, rx }
  }

  pub fn collection(&self) -> &CollectionPath { &self.collection }

  /// Wait for the next change. `None` once the backend has shut down.
  pub async fn next(&mut self) -> Option<Result<Change, WatchError>> {
    loop {
      match self.rx.recv().await {
        Ok(change) if change.path.collection == self.collection => {
          return Some(Ok(change));
        }
        Ok(_) => continue,
        Err(broadcast::error::RecvError::Lagged(n)) => {
          return Some(Err(WatchError::Lagged(n)));
        }
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a per-user document store.
///
/// Every write targets one document key, so callers need no in-process
/// locking; the backend is responsible for its own synchronisation.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes.
pub trait DocumentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Fetch one document. Returns `None` if it does not exist.
  fn get<'a>(
    &'a self,
    path: &'a DocPath,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + 'a;

  /// Create or wholly replace a document.
  fn put<'a>(
    &'a self,
    path: &'a DocPath,
    doc: Document,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Merge `patch` into an existing document. Fields the patch does not name
  /// are preserved. Fails if the document does not exist.
  fn update<'a>(
    &'a self,
    path: &'a DocPath,
    patch: Patch,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Delete a document. Deleting a missing document is not an error.
  fn delete<'a>(
    &'a self,
    path: &'a DocPath,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// All documents in a collection as `(key, document)` pairs, ordered by key.
  fn list<'a>(
    &'a self,
    collection: &'a CollectionPath,
  ) -> impl Future<Output = Result<Vec<(String, Document)>, Self::Error>> + Send + 'a;

  /// Subscribe to changes in `collection`.
  fn watch(&self, collection: &CollectionPath) -> Watch;

  /// Commit every operation in `batch` atomically.
  fn commit(
    &self,
    batch: WriteBatch,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
