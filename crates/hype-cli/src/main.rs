//! `hype`: command-line front end for the board-game hype tracker.
//!
//! # Usage
//!
//! ```
//! hype import-csv ~/Downloads/collection.csv
//! hype add https://boardgamegeek.com/boardgame/266192/wingspan
//! hype list --sort hype
//! hype hype up 266192
//! ```

mod commands;
mod config;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use config::{ConfigFile, Overrides, Settings};
use hype_core::hype::SortKey;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "hype", version, about = "Track how excited you are about your board games")]
struct Args {
  /// Path to a TOML config file (store_path, user, api_token).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// SQLite database holding the collection.
  #[arg(long, env = "HYPE_STORE", value_name = "PATH")]
  store: Option<PathBuf>,

  /// Whose collection to operate on.
  #[arg(long, env = "HYPE_USER")]
  user: Option<String>,

  /// Catalog API token, needed for `search`.
  #[arg(long, env = "HYPE_API_TOKEN", hide_env_values = true)]
  api_token: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Import a collection CSV export, keeping your notes and labels.
  ImportCsv { path: PathBuf },

  /// Add a game by catalog URL or numeric id.
  Add { game: String },

  /// Search the catalog by name.
  Search { query: String },

  /// Import every game a catalog user marks as owned.
  Refresh { username: String },

  /// Fill in missing images and type tags from item pages.
  Enrich,

  /// Delete every game in the collection.
  Clear {
    /// Required; clearing cannot be undone.
    #[arg(long)]
    yes: bool,
  },

  /// List the collection.
  List {
    #[arg(short, long, value_enum, default_value_t = SortArg::Name)]
    sort: SortArg,

    /// Include hidden games.
    #[arg(short, long)]
    all: bool,
  },

  /// Show one game in detail.
  Show { id: u32 },

  /// Hide a game from the default listing.
  Hide { id: u32 },

  Unhide { id: u32 },

  /// Nudge hype up or down.
  Hype {
    #[arg(value_enum)]
    direction: DirectionArg,
    id:        u32,
  },

  Label {
    #[command(subcommand)]
    action: LabelAction,
  },

  Play {
    #[command(subcommand)]
    action: PlayAction,
  },

  /// Replace the personal note (an empty note clears it).
  Note { id: u32, text: String },

  /// Remove a game from the collection.
  Remove { id: u32 },

  Profile {
    #[command(subcommand)]
    action: ProfileAction,
  },
}

#[derive(Subcommand, Debug)]
pub enum LabelAction {
  Add { id: u32, label: String },
  Rm { id: u32, label: String },
}

#[derive(Subcommand, Debug)]
pub enum PlayAction {
  /// Record a play; the date defaults to today.
  Add {
    id:   u32,
    /// `YYYY-MM-DD`.
    date: Option<String>,
  },
  Rm {
    id:   u32,
    date: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum ProfileAction {
  /// Claim a username.
  Save {
    username: String,
    #[arg(long)]
    public:   bool,
  },
  /// Change collection visibility.
  Public {
    #[arg(action = clap::ArgAction::Set)]
    public: bool,
  },
  Show,
  /// Show another user's public collection.
  View { username: String },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortArg {
  Name,
  Score,
  Weight,
  Hype,
  Added,
}

impl From<SortArg> for SortKey {
  fn from(s: SortArg) -> Self {
    match s {
      SortArg::Name => SortKey::Name,
      SortArg::Score => SortKey::BggScore,
      SortArg::Weight => SortKey::Weight,
      SortArg::Hype => SortKey::HypeScore,
      SortArg::Added => SortKey::AddedAt,
    }
  }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectionArg {
  Up,
  Down,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg = match &args.config {
    Some(path) => ConfigFile::load(path)?,
    None => ConfigFile::default(),
  };
  let settings = Settings::resolve(
    Overrides {
      store_path: args.store,
      user:       args.user,
      api_token:  args.api_token,
    },
    file_cfg,
  );

  commands::run(args.command, settings).await
}
