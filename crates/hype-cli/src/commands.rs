//! Command execution against the local store and the catalog.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use hype_catalog::{CatalogClient, CatalogConfig, csv, scrape::is_catalog_url};
use hype_core::{
  entry::HypeDirection,
  hype::{self, HypeScorer, SortKey, sort_entries},
  session::Session,
  store::UserId,
};
use hype_store_sqlite::SqliteStore;
use hype_sync::{ImportProgress, Phase, Reconciler, profile};
use tracing::{debug, info};

use crate::{
  Command, DirectionArg, LabelAction, PlayAction, ProfileAction, config::Settings, render,
};

fn report(p: ImportProgress) {
  debug!(done = p.done, total = p.total, phase = ?p.phase, current = ?p.current, "progress");
  if p.phase == Phase::Done {
    info!(total = p.total, "finished");
  }
}

/// Parse a play date, or default to today.
fn play_date(date: Option<String>) -> Result<String> {
  match date {
    None => Ok(chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()),
    Some(d) => {
      NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date {d:?}; expected YYYY-MM-DD"))?;
      Ok(d.trim().to_string())
    }
  }
}

pub async fn run(command: Command, settings: Settings) -> Result<()> {
  if let Some(parent) = settings.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("creating {}", parent.display()))?;
  }
  let store = SqliteStore::open(&settings.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.store_path))?;

  let client = CatalogClient::new(CatalogConfig {
    api_token: settings.api_token.clone(),
    ..CatalogConfig::default()
  })
  .context("building catalog client")?;

  let session = Session::open(UserId::new(settings.user.clone()), Arc::new(store));
  let engine = Reconciler::new(&session, &client);
  let scorer = HypeScorer::default();

  match command {
    Command::ImportCsv { path } => {
      let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
      let games = csv::parse(&text);
      if games.is_empty() {
        bail!("no games found in {}", path.display());
      }
      let summary = engine.import(games, report).await;
      println!(
        "imported: {} new, {} updated, {} failed",
        summary.created, summary.updated, summary.failed
      );
    }

    Command::Add { game } => {
      let game = game.trim();
      let details = if is_catalog_url(game) {
        client.scrape(game).await?
      } else {
        let id: u32 = game
          .parse()
          .with_context(|| format!("{game:?} is neither a catalog URL nor an id"))?;
        client.scrape_id(id).await?
      };
      let name = details.name.clone();
      if engine.add_game(details).await? {
        println!("added {name}");
      } else {
        println!("{name} is already in your collection; catalog data refreshed");
      }
    }

    Command::Search { query } => {
      if !client.has_token() {
        bail!("search needs a catalog API token (--api-token or HYPE_API_TOKEN)");
      }
      let results = client.search(&query).await?;
      print!("{}", render::search_results(&results));
    }

    Command::Refresh { username } => match engine.refresh_owned(&username, report).await {
      Ok(summary) => println!(
        "refreshed: {} new, {} updated, {} failed",
        summary.created, summary.updated, summary.failed
      ),
      Err(e) if e.is_not_ready() => {
        println!("the catalog is still preparing {username}'s collection; try again shortly");
      }
      Err(e) => return Err(e.into()),
    },

    Command::Enrich => {
      let summary = engine.enrich(report).await?;
      println!(
        "enriched {} of {} ({} failed)",
        summary.enriched, summary.total, summary.failed
      );
    }

    Command::Clear { yes } => {
      if !yes {
        bail!("refusing to clear the collection without --yes");
      }
      let removed = engine.clear().await?;
      println!("removed {removed} games");
    }

    Command::List { sort, all } => {
      session.live().loaded().await;
      if let Some(err) = session.live().last_error() {
        bail!("reading collection: {err}");
      }
      let mut entries = session.live().snapshot();
      if !all {
        entries.retain(|e| !e.hidden);
      }
      let now = hype::now_ms();
      sort_entries(&mut entries, sort.into(), &scorer, now);
      print!("{}", render::entries(&entries, &scorer, now));
    }

    Command::Show { id } => {
      session.live().loaded().await;
      let Some(entry) = session.live().get(id) else {
        bail!("game {id} is not in your collection");
      };
      print!("{}", render::detail(&entry, &scorer, hype::now_ms()));
    }

    Command::Hide { id } => engine.set_hidden(id, true).await?,
    Command::Unhide { id } => engine.set_hidden(id, false).await?,

    Command::Hype { direction, id } => {
      let direction = match direction {
        DirectionArg::Up => HypeDirection::Up,
        DirectionArg::Down => HypeDirection::Down,
      };
      engine.nudge_hype(id, direction).await?;
    }

    Command::Label { action } => match action {
      LabelAction::Add { id, label } => engine.add_label(id, label.trim()).await?,
      LabelAction::Rm { id, label } => engine.remove_label(id, label.trim()).await?,
    },

    Command::Play { action } => match action {
      PlayAction::Add { id, date } => engine.add_play_date(id, &play_date(date)?).await?,
      PlayAction::Rm { id, date } => engine.remove_play_date(id, date.trim()).await?,
    },

    Command::Note { id, text } => engine.set_personal_note(id, &text).await?,

    Command::Remove { id } => engine.remove_game(id).await?,

    Command::Profile { action } => match action {
      ProfileAction::Save { username, public } => {
        let saved = profile::save_profile(&session, &username, public).await?;
        println!(
          "saved profile {} ({})",
          saved.username,
          if saved.is_public { "public" } else { "private" }
        );
      }
      ProfileAction::Public { public } => profile::set_public(&session, public).await?,
      ProfileAction::Show => match profile::profile(&session).await? {
        Some(p) => println!(
          "{} ({})",
          p.username,
          if p.is_public { "public" } else { "private" }
        ),
        None => println!("no profile saved"),
      },
      ProfileAction::View { username } => {
        let store = session.store();
        let Some(owner) = profile::resolve_username(store, &username).await? else {
          bail!("no user named {username}");
        };
        let Some(mut entries) = profile::public_collection(store, &owner).await? else {
          bail!("{username}'s collection is private");
        };
        entries.retain(|e| !e.hidden);
        let now = hype::now_ms();
        sort_entries(&mut entries, SortKey::HypeScore, &scorer, now);
        print!("{}", render::entries(&entries, &scorer, now));
      }
    },
  }

  Ok(())
}
