//! Engine tests against an in-memory SQLite store and a canned catalog.

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use hype_catalog::RetryPolicy;
use hype_core::{
  entry::{CollectionEntry, HypeDirection, HypeEvent},
  game::CanonicalGame,
  session::Session,
  store::{
    CollectionPath, DocPath, Document, DocumentStore, Patch, UserId, Watch, WriteBatch, WriteOp,
  },
};
use hype_store_sqlite::SqliteStore;
use serde_json::json;

use crate::{
  Error, GameSource, ImportProgress, Phase, Reconciler,
  profile::{
    is_username_available, profile, public_collection, resolve_username, save_profile, set_public,
  },
};

const NOW: i64 = 1_700_000_000_000;

fn clock() -> i64 { NOW }

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// A catalog that serves fixed item pages and tracks fetch concurrency.
#[derive(Default)]
struct FakeCatalog {
  pages:     HashMap<u32, CanonicalGame>,
  owned:     Vec<CanonicalGame>,
  fetched:   Mutex<Vec<u32>>,
  in_flight: AtomicUsize,
  peak:      AtomicUsize,
}

impl FakeCatalog {
  fn with_pages(pages: Vec<CanonicalGame>) -> Self {
    Self {
      pages: pages.into_iter().map(|g| (g.id, g)).collect(),
      ..Default::default()
    }
  }

  fn fetched(&self) -> HashSet<u32> { self.fetched.lock().unwrap().iter().copied().collect() }
}

impl GameSource for FakeCatalog {
  async fn item_page(&self, id: u32) -> hype_catalog::Result<CanonicalGame> {
    self.fetched.lock().unwrap().push(id);
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    self.in_flight.fetch_sub(1, Ordering::SeqCst);

    self
      .pages
      .get(&id)
      .cloned()
      .ok_or_else(|| hype_catalog::Error::NotFound(format!("item {id}")))
  }

  async fn owned_collection(
    &self,
    username: &str,
    policy: RetryPolicy,
  ) -> hype_catalog::Result<Vec<CanonicalGame>> {
    assert_eq!(policy, RetryPolicy::CALLER);
    if username == "slow" {
      return Err(hype_catalog::Error::NotReady);
    }
    Ok(self.owned.clone())
  }
}

/// Delegates to SQLite and records the size of every committed batch.
struct CountingStore {
  inner:   SqliteStore,
  commits: Mutex<Vec<usize>>,
}

impl DocumentStore for CountingStore {
  type Error = hype_store_sqlite::Error;

  async fn get(&self, path: &DocPath) -> Result<Option<Document>, Self::Error> {
    self.inner.get(path).await
  }

  async fn put(&self, path: &DocPath, doc: Document) -> Result<(), Self::Error> {
    self.inner.put(path, doc).await
  }

  async fn update(&self, path: &DocPath, patch: Patch) -> Result<(), Self::Error> {
    self.inner.update(path, patch).await
  }

  async fn delete(&self, path: &DocPath) -> Result<(), Self::Error> { self.inner.delete(path).await }

  async fn list(&self, collection: &CollectionPath) -> Result<Vec<(String, Document)>, Self::Error> {
    self.inner.list(collection).await
  }

  fn watch(&self, collection: &CollectionPath) -> Watch { self.inner.watch(collection) }

  async fn commit(&self, batch: WriteBatch) -> Result<(), Self::Error> {
    self.commits.lock().unwrap().push(batch.len());
    self.inner.commit(batch).await
  }
}

fn game(id: u32, name: &str) -> CanonicalGame {
  CanonicalGame {
    id,
    name: name.to_string(),
    ..Default::default()
  }
}

async fn session(user: &str) -> Session<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  Session::open(UserId::new(user), Arc::new(store))
}

async fn entry<S: DocumentStore + 'static>(session: &Session<S>, id: u32) -> CollectionEntry {
  let doc = session
    .store()
    .get(&session.games().doc(id.to_string()))
    .await
    .unwrap()
    .expect("entry exists");
  CollectionEntry::from_document(&doc).unwrap()
}

async fn seed<S: DocumentStore + 'static>(session: &Session<S>, entry: &CollectionEntry) {
  session
    .store()
    .put(&session.games().doc(entry.key()), entry.to_document().unwrap())
    .await
    .unwrap();
}

fn recorder() -> (Arc<Mutex<Vec<ImportProgress>>>, impl Fn(ImportProgress) + Send + Sync) {
  let seen = Arc::new(Mutex::new(Vec::new()));
  let sink = seen.clone();
  (seen, move |p| sink.lock().unwrap().push(p))
}

// ─── Import ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn import_preserves_user_fields() {
  let s = session("u1").await;
  let catalog = FakeCatalog::default();
  let engine = Reconciler::new(&s, &catalog).with_clock(clock);

  let mut existing = CollectionEntry::create(
    CanonicalGame {
      bgg_score: 7.0,
      weight: 2.0,
      year_published: 2000,
      thumbnail: "https://img/thumb.png".into(),
      bgg_type: vec!["Strategy".into()],
      ..game(224517, "Brass")
    },
    NOW - 10_000,
  );
  existing.personal_note = "x".into();
  existing.labels = vec!["fun".into()];
  seed(&s, &existing).await;

  let summary = engine
    .import(
      vec![CanonicalGame {
        bgg_score: 8.59,
        weight: 3.87,
        year_published: 2018,
        ..game(224517, "Brass: Birmingham")
      }],
      |_| {},
    )
    .await;
  assert_eq!(summary.updated, 1);
  assert_eq!(summary.created, 0);

  let after = entry(&s, 224517).await;
  assert_eq!(after.personal_note, "x");
  assert_eq!(after.labels, vec!["fun"]);
  assert_eq!(after.hype_events, existing.hype_events);
  assert_eq!(after.added_at, NOW - 10_000);
  assert_eq!(after.game.name, "Brass: Birmingham");
  assert_eq!(after.game.bgg_score, 8.59);
  assert_eq!(after.game.weight, 3.87);
  assert_eq!(after.game.year_published, 2018);
  // Not an import field: the CSV export carries no images or tags.
  assert_eq!(after.game.thumbnail, "https://img/thumb.png");
  assert_eq!(after.game.bgg_type, vec!["Strategy"]);
}

#[tokio::test]
async fn import_creates_with_single_hype_event_and_reports_progress() {
  let s = session("u1").await;
  let catalog = FakeCatalog::default();
  let engine = Reconciler::new(&s, &catalog).with_clock(clock);
  let (seen, progress) = recorder();

  let summary = engine
    .import(vec![game(1, "Azul"), game(2, "Go")], progress)
    .await;
  assert_eq!(summary.created, 2);

  let azul = entry(&s, 1).await;
  assert_eq!(azul.hype_events, vec![HypeEvent::up(NOW)]);
  assert_eq!(azul.added_at, NOW);
  assert!(!azul.hidden);

  let seen = seen.lock().unwrap();
  assert_eq!(seen.len(), 3);
  assert_eq!(seen[0].phase, Phase::Importing);
  assert_eq!(seen[0].current.as_deref(), Some("Azul"));
  assert_eq!((seen[1].done, seen[1].total), (1, 2));
  assert_eq!(seen[2].phase, Phase::Done);
  assert_eq!(seen[2].done, 2);
}

#[tokio::test]
async fn refresh_owned_imports_catalog_collection() {
  let s = session("u1").await;
  let catalog = FakeCatalog {
    owned: vec![game(822, "Carcassonne")],
    ..Default::default()
  };
  let engine = Reconciler::new(&s, &catalog);

  let summary = engine.refresh_owned("alice", |_| {}).await.unwrap();
  assert_eq!(summary.created, 1);
  assert_eq!(entry(&s, 822).await.game.name, "Carcassonne");

  let err = engine.refresh_owned("slow", |_| {}).await.unwrap_err();
  assert!(err.is_not_ready());
}

// ─── Add ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn re_adding_refreshes_catalog_fields_only() {
  let s = session("u1").await;
  let catalog = FakeCatalog::default();
  let engine = Reconciler::new(&s, &catalog).with_clock(clock);

  assert!(engine.add_game(game(13, "Catan")).await.unwrap());
  engine.set_personal_note(13, "trading!").await.unwrap();

  let created = engine
    .add_game(CanonicalGame {
      thumbnail: "https://img/catan.png".into(),
      ..game(13, "CATAN")
    })
    .await
    .unwrap();
  assert!(!created);

  let e = entry(&s, 13).await;
  assert_eq!(e.game.name, "CATAN");
  assert_eq!(e.game.thumbnail, "https://img/catan.png");
  assert_eq!(e.personal_note, "trading!");
  assert_eq!(e.hype_events.len(), 1);
}

#[tokio::test]
async fn live_view_follows_writes() {
  let s = session("u1").await;
  let catalog = FakeCatalog::default();
  let engine = Reconciler::new(&s, &catalog);

  s.live().loaded().await;
  assert!(!s.live().is_loading());
  assert!(!s.live().contains(7));

  engine.add_game(game(7, "Root")).await.unwrap();
  s.live().wait_for_revision(2).await;
  assert!(s.live().contains(7));
  assert_eq!(s.live().get(7).unwrap().game.name, "Root");

  engine.remove_game(7).await.unwrap();
  s.live().wait_for_revision(3).await;
  assert!(s.live().is_empty());
}

// ─── Clear ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn clear_commits_in_batches_of_500() {
  let inner = SqliteStore::open_in_memory().await.unwrap();
  let s = Session::open(
    UserId::new("u1"),
    Arc::new(CountingStore {
      inner,
      commits: Mutex::default(),
    }),
  );

  let games = s.games();
  for chunk in (0..1203u32).collect::<Vec<_>>().chunks(500) {
    let mut batch = WriteBatch::new();
    for &i in chunk {
      batch
        .push(WriteOp::Put(games.doc(i.to_string()), game(i, "g").to_document().unwrap()))
        .unwrap();
    }
    s.store().inner.commit(batch).await.unwrap();
  }

  let catalog = FakeCatalog::default();
  let deleted = Reconciler::new(&s, &catalog).clear().await.unwrap();

  assert_eq!(deleted, 1203);
  assert_eq!(*s.store().commits.lock().unwrap(), vec![500, 500, 203]);
  assert!(s.store().list(&games).await.unwrap().is_empty());
}

#[tokio::test]
async fn clear_empty_collection_commits_nothing() {
  let s = Session::open(
    UserId::new("u1"),
    Arc::new(CountingStore {
      inner:   SqliteStore::open_in_memory().await.unwrap(),
      commits: Mutex::default(),
    }),
  );
  let catalog = FakeCatalog::default();
  assert_eq!(Reconciler::new(&s, &catalog).clear().await.unwrap(), 0);
  assert!(s.store().commits.lock().unwrap().is_empty());
}

// ─── Enrichment ──────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn enrich_fills_gaps_and_skips_failures() {
  let s = session("u1").await;
  let complete = CanonicalGame {
    thumbnail: "https://img/t.png".into(),
    bgg_type: vec!["Family".into()],
    ..game(3, "Complete")
  };
  let catalog = FakeCatalog::with_pages(vec![
    CanonicalGame {
      thumbnail: "https://img/1.png".into(),
      image: "https://img/1-full.png".into(),
      description: "Tile laying.".into(),
      bgg_type: vec!["Family".into()],
      categories: vec!["Abstract".into()],
      mechanics: vec!["Tile Placement".into()],
      bgg_score: 7.8,
      weight: 1.8,
      best_player_count: vec![2],
      recommended_player_count: vec![2, 3, 4],
      year_published: 1999,
      ..game(1, "Scraped name")
    },
    CanonicalGame {
      bgg_type: vec!["Strategy".into()],
      ..game(2, "Two")
    },
  ]);

  let mut one = CollectionEntry::create(game(1, "One"), NOW);
  one.labels = vec!["family".into()];
  one.play_dates = vec!["2024-05-01".into()];
  seed(&s, &one).await;
  seed(&s, &CollectionEntry::create(game(2, "Two"), NOW)).await;
  seed(&s, &CollectionEntry::create(complete, NOW)).await;
  // Missing from the catalog: fails, must not abort the others.
  seed(&s, &CollectionEntry::create(game(4, "Gone"), NOW)).await;

  let (seen, progress) = recorder();
  let summary = Reconciler::new(&s, &catalog)
    .enrich(progress)
    .await
    .unwrap();

  assert_eq!(summary.total, 3);
  assert_eq!(summary.enriched, 2);
  assert_eq!(summary.failed, 1);
  assert_eq!(catalog.fetched(), HashSet::from([1, 2, 4]));

  let e = entry(&s, 1).await;
  assert_eq!(e.game.thumbnail, "https://img/1.png");
  assert_eq!(e.game.image, "https://img/1-full.png");
  assert_eq!(e.game.description, "Tile laying.");
  assert_eq!(e.game.mechanics, vec!["Tile Placement"]);
  assert_eq!(e.game.recommended_player_count, vec![2, 3, 4]);
  // Only enrichment fields change.
  assert_eq!(e.game.name, "One");
  assert_eq!(e.game.year_published, 0);
  assert_eq!(e.labels, vec!["family"]);
  assert_eq!(e.play_dates, vec!["2024-05-01"]);
  assert_eq!(e.hype_events, vec![HypeEvent::up(NOW)]);

  let seen = seen.lock().unwrap();
  assert_eq!(seen.first().unwrap().phase, Phase::Enriching);
  assert_eq!(seen.first().unwrap().done, 0);
  let last = seen.last().unwrap();
  assert_eq!((last.phase, last.done, last.total), (Phase::Done, 3, 3));
}

#[tokio::test(start_paused = true)]
async fn enrich_runs_in_waves_of_three_with_pauses() {
  let s = session("u1").await;
  let pages = (1..=7)
    .map(|i| CanonicalGame {
      thumbnail: format!("https://img/{i}.png"),
      bgg_type: vec!["Party".into()],
      ..game(i, "x")
    })
    .collect();
  let catalog = FakeCatalog::with_pages(pages);
  for i in 1..=7 {
    seed(&s, &CollectionEntry::create(game(i, "x"), NOW)).await;
  }

  let started = tokio::time::Instant::now();
  let summary = Reconciler::new(&s, &catalog)
    .enrich(|_| {})
    .await
    .unwrap();

  assert_eq!(summary.enriched, 7);
  assert_eq!(catalog.peak.load(Ordering::SeqCst), 3);
  // Three waves of 100ms fetches separated by two 500ms pauses.
  assert!(started.elapsed() >= Duration::from_millis(1300));
}

#[tokio::test]
async fn enrich_with_nothing_missing_is_a_no_op() {
  let s = session("u1").await;
  seed(
    &s,
    &CollectionEntry::create(
      CanonicalGame {
        thumbnail: "t".into(),
        bgg_type: vec!["Thematic".into()],
        ..game(9, "Done")
      },
      NOW,
    ),
  )
  .await;
  let catalog = FakeCatalog::default();
  let summary = Reconciler::new(&s, &catalog).enrich(|_| {}).await.unwrap();
  assert_eq!(summary.total, 0);
  assert!(catalog.fetched().is_empty());
}

// ─── User actions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn user_actions_touch_only_their_fields() {
  let s = session("u1").await;
  let catalog = FakeCatalog::default();
  let engine = Reconciler::new(&s, &catalog).with_clock(clock);
  engine.add_game(game(5, "Hanabi")).await.unwrap();

  engine.add_label(5, "coop").await.unwrap();
  engine.add_label(5, "coop").await.unwrap();
  engine.add_label(5, "card").await.unwrap();
  engine.remove_label(5, "card").await.unwrap();
  engine.add_play_date(5, "2024-01-01").await.unwrap();
  engine.add_play_date(5, "2024-02-01").await.unwrap();
  engine.remove_play_date(5, "2024-01-01").await.unwrap();
  engine.set_personal_note(5, "teach the hint rules").await.unwrap();
  engine.set_hidden(5, true).await.unwrap();

  let e = entry(&s, 5).await;
  assert_eq!(e.labels, vec!["coop"]);
  assert_eq!(e.play_dates, vec!["2024-02-01"]);
  assert_eq!(e.personal_note, "teach the hint rules");
  assert!(e.hidden);
  assert_eq!(e.game.name, "Hanabi");
}

#[tokio::test]
async fn nudging_appends_events() {
  let s = session("u1").await;
  let catalog = FakeCatalog::default();
  let engine = Reconciler::new(&s, &catalog).with_clock(clock);
  engine.add_game(game(5, "Hanabi")).await.unwrap();

  let later = Reconciler::new(&s, &catalog).with_clock(|| NOW + 1);
  later.nudge_hype(5, HypeDirection::Down).await.unwrap();

  let e = entry(&s, 5).await;
  assert_eq!(e.hype_events, vec![HypeEvent::up(NOW), HypeEvent::down(NOW + 1)]);
}

#[tokio::test]
async fn actions_on_missing_game_fail() {
  let s = session("u1").await;
  let catalog = FakeCatalog::default();
  let engine = Reconciler::new(&s, &catalog);
  assert!(matches!(
    engine.set_hidden(99, true).await,
    Err(Error::NotInCollection(99))
  ));
  // Removing is idempotent.
  engine.remove_game(99).await.unwrap();
}

// ─── Profiles ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn profile_reservation_lifecycle() {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let alice = Session::open(UserId::new("alice-uid"), store.clone());
  let bob = Session::open(UserId::new("bob-uid"), store.clone());

  assert!(profile(&alice).await.unwrap().is_none());
  assert!(matches!(set_public(&alice, true).await, Err(Error::NoProfile)));

  let saved = save_profile(&alice, "Meeple_Queen", false).await.unwrap();
  assert_eq!(saved.username, "meeple_queen");
  assert_eq!(
    resolve_username(&*store, "MEEPLE_QUEEN").await.unwrap(),
    Some(UserId::new("alice-uid"))
  );

  // Someone else cannot take it; the owner may re-save it.
  assert!(matches!(
    save_profile(&bob, "meeple_queen", true).await,
    Err(Error::UsernameTaken(_))
  ));
  assert!(!is_username_available(&*store, "meeple_queen", bob.user()).await.unwrap());
  assert!(is_username_available(&*store, "meeple_queen", alice.user()).await.unwrap());
  save_profile(&alice, "meeple_queen", true).await.unwrap();

  // Renaming releases the old handle.
  save_profile(&alice, "dice-goblin", true).await.unwrap();
  assert_eq!(resolve_username(&*store, "meeple_queen").await.unwrap(), None);
  save_profile(&bob, "meeple_queen", false).await.unwrap();

  assert!(matches!(
    save_profile(&bob, "admin", false).await,
    Err(Error::Core(hype_core::Error::InvalidUsername(_)))
  ));
}

#[tokio::test]
async fn public_collection_is_redacted_and_private_is_hidden() {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let s = Session::open(UserId::new("u1"), store.clone());
  let catalog = FakeCatalog::default();
  let engine = Reconciler::new(&s, &catalog);

  engine.add_game(game(1, "Azul")).await.unwrap();
  engine.set_personal_note(1, "secret").await.unwrap();
  engine.add_play_date(1, "2024-03-03").await.unwrap();
  engine.add_label(1, "abstract").await.unwrap();

  assert_eq!(public_collection(&*store, s.user()).await.unwrap(), None);

  save_profile(&s, "azul_fan", false).await.unwrap();
  assert_eq!(public_collection(&*store, s.user()).await.unwrap(), None);

  set_public(&s, true).await.unwrap();
  let shown = public_collection(&*store, s.user()).await.unwrap().unwrap();
  assert_eq!(shown.len(), 1);
  assert_eq!(shown[0].personal_note, "");
  assert!(shown[0].play_dates.is_empty());
  assert_eq!(shown[0].labels, vec!["abstract"]);

  let raw = store
    .get(&CollectionPath::settings(s.user()).doc("profile"))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(raw["isPublic"], json!(true));
}
