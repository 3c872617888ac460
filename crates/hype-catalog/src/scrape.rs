//! Item-page adapter: reads the JSON blob the catalog embeds in its HTML.
//!
//! The page assigns the full item record to `GEEK.geekitemPreload` on a single
//! line. We locate that assignment, parse the object literal as JSON, and map
//! it onto [`CanonicalGame`].

use std::sync::LazyLock;

use hype_core::{coerce, game::CanonicalGame};
use regex::Regex;
use serde_json::Value;

use crate::{
  error::{Error, Result},
  text::strip_html,
};

static PRELOAD: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?m)GEEK\.geekitemPreload\s*=\s*(\{.+?\});\s*$").expect("valid preload pattern")
});

static ITEM_PATH: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"boardgame(?:expansion)?/(\d+)").expect("valid item path pattern"));

static CATALOG_URL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"boardgamegeek\.com/boardgame(?:expansion)?/(\d+)").expect("valid catalog url pattern")
});

/// Player counts above this are ignored when expanding poll ranges.
const MAX_PLAYER_COUNT: u32 = 100;

// ─── URLs ────────────────────────────────────────────────────────────────────

/// `true` if `input` looks like a catalog item URL rather than a search term.
pub fn is_catalog_url(input: &str) -> bool { CATALOG_URL.is_match(input) }

/// The item id in a `.../boardgame/<id>` or `.../boardgameexpansion/<id>`
/// URL.
pub fn extract_item_id(url: &str) -> Result<u32> {
  let id = ITEM_PATH
    .captures(url)
    .and_then(|c| c.get(1))
    .map(|m| coerce::int(m.as_str()))
    .ok_or_else(|| Error::ClientInput(format!("not a catalog item URL: {url}")))?;
  if id == 0 {
    return Err(Error::ClientInput(format!("invalid item id in URL: {url}")));
  }
  Ok(id)
}

// ─── Page parsing ────────────────────────────────────────────────────────────

/// Extract the embedded preload object from an item page.
///
/// A page without the assignment (layout changed, request blocked) is
/// [`Error::Parse`]; a parsed object without an `item` is
/// [`Error::NotFound`].
pub fn parse_item_page(html: &str, fallback_id: u32) -> Result<CanonicalGame> {
  let blob = PRELOAD
    .captures(html)
    .and_then(|c| c.get(1))
    .ok_or_else(|| Error::Parse("could not find game data in the item page".into()))?;

  let preload: Value = serde_json::from_str(blob.as_str())
    .map_err(|e| Error::Parse(format!("item page data is not valid JSON: {e}")))?;

  match preload.get("item") {
    Some(item) if item.is_object() => Ok(map_item(item, fallback_id)),
    _ => Err(Error::NotFound(format!("no game data for item {fallback_id}"))),
  }
}

fn map_item(item: &Value, fallback_id: u32) -> CanonicalGame {
  let id = match count(item.get("objectid")) {
    0 => fallback_id,
    id => id,
  };
  let max_play_time = count(item.get("maxplaytime"));
  let min_play_time = count(item.get("minplaytime"));
  let stats = item.get("stats");

  CanonicalGame {
    id,
    name: text(item.get("name")).unwrap_or_else(|| "Unknown".to_string()),
    thumbnail: text(item.pointer("/images/square200"))
      .or_else(|| text(item.pointer("/images/thumb")))
      .unwrap_or_default(),
    image: text(item.pointer("/images/original"))
      .or_else(|| text(item.get("imageurl")))
      .unwrap_or_default(),
    description: strip_html(item.get("description").and_then(Value::as_str).unwrap_or("")),
    year_published: count(item.get("yearpublished")),
    min_players: count(item.get("minplayers")),
    max_players: count(item.get("maxplayers")),
    playing_time: if max_play_time > 0 { max_play_time } else { min_play_time },
    min_play_time,
    max_play_time,
    bgg_score: score(stats.and_then(|s| s.get("average"))),
    average_rating: score(stats.and_then(|s| s.get("baverage"))),
    weight: score(stats.and_then(|s| s.get("avgweight"))),
    best_player_count: expand_ranges(item.pointer("/polls/userplayers/best")),
    recommended_player_count: expand_ranges(item.pointer("/polls/userplayers/recommended")),
    bgg_type: link_names(item, "boardgamesubdomain"),
    categories: link_names(item, "boardgamecategory"),
    mechanics: link_names(item, "boardgamemechanic"),
  }
}

// ─── Value helpers ───────────────────────────────────────────────────────────

/// A non-empty string, or a number rendered as one.
fn text(v: Option<&Value>) -> Option<String> {
  match v? {
    Value::String(s) if !s.is_empty() => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

/// A non-negative integer from a JSON string or number.
fn count(v: Option<&Value>) -> u32 {
  match v {
    Some(Value::String(s)) => coerce::int(s),
    Some(Value::Number(n)) => n
      .as_u64()
      .and_then(|n| u32::try_from(n).ok())
      .or_else(|| n.as_f64().map(|f| coerce::int(&f.to_string())))
      .unwrap_or(0),
    _ => 0,
  }
}

fn score(v: Option<&Value>) -> f64 {
  match v {
    Some(Value::String(s)) => coerce::float(s),
    Some(Value::Number(n)) => n.as_f64().map_or(0.0, |f| coerce::float(&f.to_string())),
    _ => 0.0,
  }
}

/// Expand `[{ "min": 2, "max": 4 }, …]` into `[2, 3, 4, …]`.
fn expand_ranges(v: Option<&Value>) -> Vec<u32> {
  let Some(ranges) = v.and_then(Value::as_array) else {
    return Vec::new();
  };
  ranges
    .iter()
    .flat_map(|r| {
      let min = count(r.get("min"));
      let max = count(r.get("max")).min(MAX_PLAYER_COUNT);
      coerce::expand_range(min, max)
    })
    .filter(|&n| n > 0)
    .collect()
}

fn link_names(item: &Value, kind: &str) -> Vec<String> {
  item
    .get("links")
    .and_then(|l| l.get(kind))
    .and_then(Value::as_array)
    .map(|links| {
      links
        .iter()
        .filter_map(|l| text(l.get("name")))
        .collect()
    })
    .unwrap_or_default()
}
