//! The reconciliation engine: the only code that decides which fields of a
//! collection entry a catalog refresh may overwrite.
//!
//! Field ownership:
//!
//! - catalog-owned fields (everything in [`CanonicalGame`]) are rewritten by
//!   import, refresh, enrichment and re-adding a game;
//! - user-owned fields (labels, play dates, note, hype log, `addedAt`,
//!   `hidden`) are written only by the explicit actions in
//!   [`actions`](crate::actions).

use std::{
  sync::atomic::{AtomicUsize, Ordering},
  time::Duration,
};

use futures::future::join_all;
use hype_catalog::RetryPolicy;
use hype_core::{
  entry::CollectionEntry,
  game::CanonicalGame,
  hype,
  session::Session,
  store::{Document, DocumentStore, Patch, WriteBatch},
};
use tracing::{debug, info, warn};

use crate::{Error, Result, source::GameSource};

/// Catalog-owned fields an import overwrites on an existing entry.
pub const IMPORT_FIELDS: &[&str] = &[
  "name",
  "bggScore",
  "weight",
  "minPlayers",
  "maxPlayers",
  "bestPlayerCount",
  "recommendedPlayerCount",
  "playingTime",
  "yearPublished",
];

/// Catalog-owned fields enrichment backfills from the item page.
pub const ENRICH_FIELDS: &[&str] = &[
  "thumbnail",
  "image",
  "description",
  "bggType",
  "categories",
  "mechanics",
  "bggScore",
  "weight",
  "bestPlayerCount",
  "recommendedPlayerCount",
];

/// Concurrent item-page fetches per enrichment wave.
pub const ENRICH_WAVE: usize = 3;

/// Pause between enrichment waves.
pub const ENRICH_PAUSE: Duration = Duration::from_millis(500);

// ─── Progress ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Importing,
  Enriching,
  Done,
}

/// A snapshot of a long-running operation, reported as it advances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportProgress {
  pub total:   usize,
  pub done:    usize,
  pub phase:   Phase,
  /// Name of the item being worked on, if any.
  pub current: Option<String>,
}

impl ImportProgress {
  fn new(total: usize, done: usize, phase: Phase) -> Self {
    Self {
      total,
      done,
      phase,
      current: None,
    }
  }

  fn working_on(mut self, name: &str) -> Self {
    self.current = Some(name.to_string());
    self
  }
}

/// Outcome counts of an import or refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
  pub created: usize,
  pub updated: usize,
  pub failed:  usize,
}

/// Outcome counts of an enrichment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
  pub total:    usize,
  pub enriched: usize,
  pub failed:   usize,
}

// ─── Reconciler ──────────────────────────────────────────────────────────────

/// Merges catalog data into one user's collection.
pub struct Reconciler<'a, S, C> {
  pub(crate) session: &'a Session<S>,
  pub(crate) source:  &'a C,
  pub(crate) clock:   fn() -> i64,
}

impl<'a, S, C> Reconciler<'a, S, C>
where
  S: DocumentStore + 'static,
{
  pub fn new(session: &'a Session<S>, source: &'a C) -> Self {
    Self {
      session,
      source,
      clock: hype::now_ms,
    }
  }

  /// Replace the wall clock used to timestamp new entries and hype events.
  pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
    self.clock = clock;
    self
  }

  pub fn session(&self) -> &Session<S> { self.session }

  pub(crate) fn now(&self) -> i64 { (self.clock)() }

  pub(crate) async fn existing(&self, id: u32) -> Result<Option<Document>> {
    let path = self.session.games().doc(id.to_string());
    self.session.store().get(&path).await.map_err(Error::store)
  }

  // ── Add ───────────────────────────────────────────────────────────────────

  /// Add `game` to the collection with a single creation hype event. If it
  /// is already there, only its catalog-owned fields are refreshed.
  ///
  /// Returns `true` if a new entry was created.
  pub async fn add_game(&self, game: CanonicalGame) -> Result<bool> {
    self.upsert(game, None).await
  }

  /// Create-or-merge. `fields` limits which catalog fields an existing entry
  /// receives; `None` means all of them.
  async fn upsert(&self, game: CanonicalGame, fields: Option<&[&str]>) -> Result<bool> {
    let path = self.session.games().doc(game.key());
    let store = self.session.store();

    if self.existing(game.id).await?.is_some() {
      let doc = game.to_document()?;
      let patch = match fields {
        Some(fields) => Patch::pick(&doc, fields),
        None => {
          let all: Vec<&str> = doc.keys().map(String::as_str).collect();
          Patch::pick(&doc, &all)
        }
      };
      store.update(&path, patch).await.map_err(Error::store)?;
      debug!(id = game.id, "refreshed catalog fields");
      Ok(false)
    } else {
      let entry = CollectionEntry::create(game, self.now());
      store
        .put(&path, entry.to_document()?)
        .await
        .map_err(Error::store)?;
      debug!(id = entry.id(), "created entry");
      Ok(true)
    }
  }

  // ── Import ────────────────────────────────────────────────────────────────

  /// Merge `games` into the collection one at a time.
  ///
  /// Existing entries receive only [`IMPORT_FIELDS`]; new ones are created.
  /// A failing record is logged and counted, and the import carries on.
  pub async fn import(
    &self,
    games: Vec<CanonicalGame>,
    progress: impl Fn(ImportProgress) + Send + Sync,
  ) -> ImportSummary {
    let total = games.len();
    let mut summary = ImportSummary::default();
    info!(user = %self.session.user(), total, "import started");

    for (done, game) in games.into_iter().enumerate() {
      progress(ImportProgress::new(total, done, Phase::Importing).working_on(&game.name));

      let (id, name) = (game.id, game.name.clone());
      match self.upsert(game, Some(IMPORT_FIELDS)).await {
        Ok(true) => summary.created += 1,
        Ok(false) => summary.updated += 1,
        Err(e) => {
          warn!(id, %name, error = %e, "failed to import game; skipping");
          summary.failed += 1;
        }
      }
    }

    progress(ImportProgress::new(total, total, Phase::Done));
    info!(
      created = summary.created,
      updated = summary.updated,
      failed = summary.failed,
      "import finished"
    );
    summary
  }

  // ── Clear ─────────────────────────────────────────────────────────────────

  /// Delete every entry, committing in batches of at most
  /// [`MAX_BATCH_OPS`](hype_core::store::MAX_BATCH_OPS). Returns the number
  /// of entries deleted.
  pub async fn clear(&self) -> Result<usize> {
    let games = self.session.games();
    let store = self.session.store();
    let docs = store.list(&games).await.map_err(Error::store)?;
    let count = docs.len();

    let mut batch = WriteBatch::new();
    for (key, _) in docs {
      if batch.is_full() {
        store
          .commit(std::mem::take(&mut batch))
          .await
          .map_err(Error::store)?;
      }
      batch.delete(games.doc(key))?;
    }
    if !batch.is_empty() {
      store.commit(batch).await.map_err(Error::store)?;
    }

    info!(user = %self.session.user(), deleted = count, "collection cleared");
    Ok(count)
  }
}

impl<S, C> Reconciler<'_, S, C>
where
  S: DocumentStore + 'static,
  C: GameSource,
{
  // ── Catalog reads ─────────────────────────────────────────────────────────

  /// Fetch `username`'s owned games from the catalog and import them.
  pub async fn refresh_owned(
    &self,
    username: &str,
    progress: impl Fn(ImportProgress) + Send + Sync,
  ) -> Result<ImportSummary> {
    let games = self
      .source
      .owned_collection(username, RetryPolicy::CALLER)
      .await?;
    Ok(self.import(games, progress).await)
  }

  // ── Enrichment ────────────────────────────────────────────────────────────

  /// Backfill entries missing a thumbnail or type tags from their item pages.
  ///
  /// Runs [`ENRICH_WAVE`] fetches at a time, waits for the whole wave, then
  /// pauses [`ENRICH_PAUSE`] before the next. A failing item is logged and
  /// skipped; it never aborts its siblings.
  pub async fn enrich(
    &self,
    progress: impl Fn(ImportProgress) + Send + Sync,
  ) -> Result<EnrichSummary> {
    let targets: Vec<CollectionEntry> = self
      .session
      .store()
      .list(&self.session.games())
      .await
      .map_err(Error::store)?
      .into_iter()
      .filter_map(|(key, doc)| match CollectionEntry::from_document(&doc) {
        Ok(entry) => Some(entry),
        Err(e) => {
          warn!(%key, error = %e, "skipping undecodable entry");
          None
        }
      })
      .filter(needs_enrichment)
      .collect();

    let total = targets.len();
    let done = AtomicUsize::new(0);
    let enriched = AtomicUsize::new(0);
    info!(user = %self.session.user(), total, "enrichment started");
    progress(ImportProgress::new(total, 0, Phase::Enriching));

    let (done, enriched, progress) = (&done, &enriched, &progress);
    let mut waves = targets.chunks(ENRICH_WAVE).peekable();
    while let Some(wave) = waves.next() {
      join_all(wave.iter().map(|entry| async move {
        progress(
          ImportProgress::new(total, done.load(Ordering::SeqCst), Phase::Enriching)
            .working_on(&entry.game.name),
        );

        match self.enrich_one(entry.id()).await {
          Ok(()) => {
            enriched.fetch_add(1, Ordering::SeqCst);
          }
          Err(e) => warn!(
            id = entry.id(),
            name = %entry.game.name,
            error = %e,
            "failed to enrich; skipping"
          ),
        }

        let now_done = done.fetch_add(1, Ordering::SeqCst) + 1;
        let phase = if now_done >= total { Phase::Done } else { Phase::Enriching };
        progress(ImportProgress::new(total, now_done, phase));
      }))
      .await;

      if waves.peek().is_some() {
        tokio::time::sleep(ENRICH_PAUSE).await;
      }
    }

    progress(ImportProgress::new(total, total, Phase::Done));
    let enriched = enriched.load(Ordering::SeqCst);
    let summary = EnrichSummary {
      total,
      enriched,
      failed: total - enriched,
    };
    info!(enriched = summary.enriched, failed = summary.failed, "enrichment finished");
    Ok(summary)
  }

  async fn enrich_one(&self, id: u32) -> Result<()> {
    let game = self.source.item_page(id).await?;
    let patch = Patch::pick(&game.to_document()?, ENRICH_FIELDS);
    let path = self.session.games().doc(id.to_string());
    self
      .session
      .store()
      .update(&path, patch)
      .await
      .map_err(Error::store)
  }
}

/// An entry is incomplete without a thumbnail or any type tag.
pub fn needs_enrichment(entry: &CollectionEntry) -> bool {
  entry.game.thumbnail.is_empty() || entry.game.bgg_type.is_empty()
}
