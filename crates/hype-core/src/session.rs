//! The signed-in session and its live view of the user's collection.
//!
//! A [`Session`] is created when a user signs in and dropped (or
//! [`Session::close`]d) when they sign out. It owns the only in-process copy
//! of the collection; nothing here is global.

use std::{
  collections::BTreeMap,
  sync::{Arc, PoisonError, RwLock},
};

use tokio::{sync::watch as revision, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
  entry::CollectionEntry,
  store::{Change, ChangeKind, CollectionPath, DocumentStore, UserId, WatchError},
};

// ─── Session ─────────────────────────────────────────────────────────────────

/// Per-user context handed to the reconciliation engine and read paths.
pub struct Session<S> {
  user:  UserId,
  store: Arc<S>,
  live:  LiveCollection,
}

impl<S> Session<S>
where
  S: DocumentStore + 'static,
{
  /// Sign in: start mirroring `users/<user>/games`. Must be called from
  /// within a tokio runtime.
  pub fn open(user: UserId, store: Arc<S>) -> Self {
    let live = LiveCollection::spawn(store.clone(), CollectionPath::games(&user));
    Self { user, store, live }
  }

  pub fn user(&self) -> &UserId { &self.user }

  pub fn store(&self) -> &S { &self.store }

  pub fn store_handle(&self) -> Arc<S> { self.store.clone() }

  /// The collection path of this user's games.
  pub fn games(&self) -> CollectionPath { CollectionPath::games(&self.user) }

  pub fn live(&self) -> &LiveCollection { &self.live }

  /// Sign out. Stops the change subscription and discards the snapshot.
  pub fn close(self) { drop(self) }
}

// ─── Live collection ─────────────────────────────────────────────────────────

#[derive(Default)]
struct LiveState {
  entries:    BTreeMap<String, CollectionEntry>,
  loading:    bool,
  last_error: Option<String>,
}

/// An eventually-consistent snapshot of one collection, kept current by a
/// background task that follows the store's change stream.
///
/// Reads are synchronous. [`LiveCollection::subscribe`] yields a receiver
/// whose value (a revision counter) changes after every applied change.
pub struct LiveCollection {
  state:    Arc<RwLock<LiveState>>,
  revision: revision::Receiver<u64>,
  task:     JoinHandle<()>,
}

impl LiveCollection {
  pub fn spawn<S>(store: Arc<S>, collection: CollectionPath) -> Self
  where
    S: DocumentStore + 'static,
  {
    let state = Arc::new(RwLock::new(LiveState {
      loading: true,
      ..Default::default()
    }));
    let (tx, rx) = revision::channel(0);
    let task = tokio::spawn(follow(store, collection, state.clone(), tx));
    Self {
      state,
      revision: rx,
      task,
    }
  }

  /// Every entry, ordered by document key.
  pub fn snapshot(&self) -> Vec<CollectionEntry> {
    self.read(|s| s.entries.values().cloned().collect())
  }

  pub fn get(&self, id: u32) -> Option<CollectionEntry> {
    self.read(|s| s.entries.get(&id.to_string()).cloned())
  }

  pub fn contains(&self, id: u32) -> bool {
    self.read(|s| s.entries.contains_key(&id.to_string()))
  }

  pub fn len(&self) -> usize { self.read(|s| s.entries.len()) }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// `true` until the first full listing has been applied.
  pub fn is_loading(&self) -> bool { self.read(|s| s.loading) }

  /// The most recent subscription or decode error, if any.
  pub fn last_error(&self) -> Option<String> { self.read(|s| s.last_error.clone()) }

  /// A change notification handle. Dropping it unsubscribes.
  pub fn subscribe(&self) -> revision::Receiver<u64> { self.revision.clone() }

  /// Wait until the snapshot reflects at least revision `rev`.
  pub async fn wait_for_revision(&self, rev: u64) {
    let mut rx = self.revision.clone();
    // Only fails if the task ended, in which case there is nothing to wait for.
    let _ = rx.wait_for(|&r| r >= rev).await;
  }

  /// Wait for the initial listing.
  pub async fn loaded(&self) { self.wait_for_revision(1).await }

  fn read<T>(&self, f: impl FnOnce(&LiveState) -> T) -> T {
    let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
    f(&guard)
  }
}

impl Drop for LiveCollection {
  fn drop(&mut self) { self.task.abort(); }
}

fn write_state(state: &RwLock<LiveState>, f: impl FnOnce(&mut LiveState)) {
  let mut guard = state.write().unwrap_or_else(PoisonError::into_inner);
  f(&mut guard);
}

async fn follow<S>(
  store: Arc<S>,
  collection: CollectionPath,
  state: Arc<RwLock<LiveState>>,
  tx: revision::Sender<u64>,
) where
  S: DocumentStore,
{
  // Subscribe before listing so no change falls between the two.
  let mut watch = store.watch(&collection);
  resync(&*store, &collection, &state).await;
  tx.send_modify(|r| *r += 1);

  while let Some(next) = watch.next().await {
    match next {
      Ok(change) => apply(&state, change),
      Err(WatchError::Lagged(n)) => {
        warn!(%collection, dropped = n, "live collection lagged; re-listing");
        resync(&*store, &collection, &state).await;
      }
    }
    tx.send_modify(|r| *r += 1);
  }
  debug!(%collection, "change stream closed");
}

async fn resync<S>(store: &S, collection: &CollectionPath, state: &RwLock<LiveState>)
where
  S: DocumentStore,
{
  match store.list(collection).await {
    Ok(docs) => {
      let mut entries = BTreeMap::new();
      let mut last_error = None;
      for (key, doc) in docs {
        match CollectionEntry::from_document(&doc) {
          Ok(entry) => {
            entries.insert(key, entry);
          }
          Err(e) => {
            warn!(%collection, %key, error = %e, "skipping undecodable entry");
            last_error = Some(e.to_string());
          }
        }
      }
      write_state(state, |s| {
        s.entries = entries;
        s.loading = false;
        s.last_error = last_error;
      });
    }
    Err(e) => {
      warn!(%collection, error = %e, "collection subscription error");
      write_state(state, |s| {
        s.loading = false;
        s.last_error = Some(e.to_string());
      });
    }
  }
}

fn apply(state: &RwLock<LiveState>, change: Change) {
  let key = change.path.key;
  match change.kind {
    ChangeKind::Upserted(doc) => match CollectionEntry::from_document(&doc) {
      Ok(entry) => write_state(state, |s| {
        s.entries.insert(key, entry);
      }),
      Err(e) => {
        warn!(%key, error = %e, "skipping undecodable change");
        write_state(state, |s| s.last_error = Some(e.to_string()));
      }
    },
    ChangeKind::Deleted => write_state(state, |s| {
      s.entries.remove(&key);
    }),
  }
}
