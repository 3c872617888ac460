//! XML API adapter: search results, item detail, and owned collection.
//!
//! Uses `quick-xml`'s event reader to build a small element tree, then reads
//! each response shape out of the tree.

use std::collections::HashSet;

use hype_core::{
  coerce,
  game::{CanonicalGame, SearchResult},
};
use quick_xml::{Reader, events::Event};

use crate::{
  error::{Error, Result},
  text::html_to_text,
};

/// Fraction of the top "Best" vote count a player count needs to be listed
/// as best.
pub const BEST_VOTE_RATIO: f64 = 0.75;

// ─── Element tree ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Element {
  name:     String,
  attrs:    Vec<(String, String)>,
  children: Vec<Element>,
  text:     String,
}

impl Element {
  fn attr(&self, name: &str) -> Option<&str> {
    self
      .attrs
      .iter()
      .find(|(k, _)| k == name)
      .map(|(_, v)| v.as_str())
  }

  fn child(&self, name: &str) -> Option<&Element> {
    self.children.iter().find(|c| c.name == name)
  }

  fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
    self.children.iter().filter(move |c| c.name == name)
  }

  /// All descendants named `name`, in document order.
  fn descendants_named<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
    for c in &self.children {
      if c.name == name {
        out.push(c);
      }
      c.descendants_named(name, out);
    }
  }

  /// The `value` attribute of the first child named `name`, or `""`.
  fn child_value(&self, name: &str) -> &str {
    self
      .child(name)
      .and_then(|c| c.attr("value"))
      .unwrap_or("")
  }

  fn child_text(&self, name: &str) -> &str {
    self.child(name).map_or("", |c| c.text.trim())
  }
}

fn local_name(name: &[u8]) -> String {
  let local = match name.iter().rposition(|&b| b == b':') {
    Some(pos) => &name[pos + 1..],
    None => name,
  };
  String::from_utf8_lossy(local).into_owned()
}

fn open_element(e: &quick_xml::events::BytesStart<'_>) -> Result<Element> {
  let mut attrs = Vec::new();
  for attr in e.attributes() {
    let attr = attr.map_err(|err| Error::Parse(format!("bad attribute: {err}")))?;
    let value = attr
      .unescape_value()
      .map_err(|err| Error::Parse(format!("bad attribute value: {err}")))?;
    attrs.push((local_name(attr.key.as_ref()), value.into_owned()));
  }
  Ok(Element {
    name: local_name(e.name().as_ref()),
    attrs,
    ..Default::default()
  })
}

/// Parse `xml` into its root element. Syntax errors and a missing root are
/// [`Error::Parse`].
fn parse_tree(xml: &str) -> Result<Element> {
  let mut reader = Reader::from_str(xml);
  reader.config_mut().trim_text(true);

  // The bottom of the stack is a synthetic document node.
  let mut stack: Vec<Element> = vec![Element::default()];

  loop {
    match reader.read_event() {
      Ok(Event::Start(e)) => stack.push(open_element(&e)?),
      Ok(Event::Empty(e)) => {
        let el = open_element(&e)?;
        if let Some(parent) = stack.last_mut() {
          parent.children.push(el);
        }
      }
      Ok(Event::End(_)) => {
        if stack.len() < 2 {
          return Err(Error::Parse("unbalanced end tag".into()));
        }
        if let Some(el) = stack.pop()
          && let Some(parent) = stack.last_mut()
        {
          parent.children.push(el);
        }
      }
      Ok(Event::Text(t)) => {
        let text = t
          .unescape()
          .map(|s| s.into_owned())
          .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
        if let Some(el) = stack.last_mut() {
          el.text.push_str(&text);
        }
      }
      Ok(Event::CData(t)) => {
        if let Some(el) = stack.last_mut() {
          el.text.push_str(&String::from_utf8_lossy(&t));
        }
      }
      Ok(Event::Eof) => break,
      Err(e) => {
        return Err(Error::Parse(format!(
          "malformed XML at position {}: {e}",
          reader.error_position()
        )));
      }
      _ => {}
    }
  }

  if stack.len() != 1 {
    return Err(Error::Parse("unexpected end of document".into()));
  }
  stack
    .pop()
    .and_then(|doc| doc.children.into_iter().next())
    .ok_or_else(|| Error::Parse("empty document".into()))
}

/// Parse and require an `<items>` root.
fn parse_items(xml: &str) -> Result<Element> {
  let root = parse_tree(xml)?;
  if root.name != "items" {
    return Err(Error::Parse(format!("expected <items> root, found <{}>", root.name)));
  }
  Ok(root)
}

// ─── Search ──────────────────────────────────────────────────────────────────

/// Parse a search response. Results are ordered newest first; equal years
/// keep document order. An `<items>` root with no results is an empty list.
pub fn parse_search(xml: &str) -> Result<Vec<SearchResult>> {
  let root = parse_items(xml)?;

  let mut results: Vec<SearchResult> = root
    .children_named("item")
    .map(|item| SearchResult {
      id:             coerce::int(item.attr("id").unwrap_or("")),
      name:           primary_name(item)
        .or_else(|| item.child("name").and_then(|n| n.attr("value")))
        .unwrap_or("Unknown")
        .to_string(),
      year_published: coerce::int(item.child_value("yearpublished")),
    })
    .filter(|r| r.id > 0)
    .collect();

  results.sort_by(|a, b| b.year_published.cmp(&a.year_published));
  Ok(results)
}

fn primary_name(item: &Element) -> Option<&str> {
  item
    .children_named("name")
    .find(|n| n.attr("type") == Some("primary"))
    .and_then(|n| n.attr("value"))
}

// ─── Item detail ─────────────────────────────────────────────────────────────

/// Select the player counts rated "Best".
///
/// `votes` pairs each player count with its "Best" vote total. Every count
/// whose total reaches [`BEST_VOTE_RATIO`] of the highest total is included,
/// so closely-rated neighbours of the winner are kept. No votes at all
/// yields an empty list.
pub fn best_player_counts(votes: &[(u32, u32)]) -> Vec<u32> {
  let max_best = votes.iter().map(|&(_, v)| v).max().unwrap_or(0);
  if max_best == 0 {
    return Vec::new();
  }
  let threshold = f64::from(max_best) * BEST_VOTE_RATIO;
  // "4" and "4+" both coerce to 4; keep the first.
  let mut seen = HashSet::new();
  votes
    .iter()
    .filter(|&&(n, v)| n > 0 && f64::from(v) >= threshold)
    .map(|&(n, _)| n)
    .filter(|&n| seen.insert(n))
    .collect()
}

fn best_votes(item: &Element) -> Vec<(u32, u32)> {
  let Some(poll) = item
    .children_named("poll")
    .find(|p| p.attr("name") == Some("suggested_numplayers"))
  else {
    return Vec::new();
  };

  poll
    .children_named("results")
    .map(|results| {
      let players = coerce::int(results.attr("numplayers").unwrap_or(""));
      let best = results
        .children_named("result")
        .find(|r| r.attr("value") == Some("Best"))
        .and_then(|r| r.attr("numvotes"))
        .map_or(0, coerce::int);
      (players, best)
    })
    .collect()
}

fn links(item: &Element, kind: &str) -> Vec<String> {
  item
    .children_named("link")
    .filter(|l| l.attr("type") == Some(kind))
    .filter_map(|l| l.attr("value"))
    .filter(|v| !v.is_empty())
    .map(str::to_string)
    .collect()
}

/// Family rank names, e.g. "Strategy Game Rank" → "Strategy Game".
fn family_ranks(item: &Element) -> Vec<String> {
  let mut ranks = Vec::new();
  item.descendants_named("rank", &mut ranks);
  ranks
    .into_iter()
    .filter(|r| r.attr("type") == Some("family"))
    .filter_map(|r| r.attr("friendlyname"))
    .filter(|n| !n.is_empty())
    .map(|n| n.strip_suffix(" Rank").unwrap_or(n).to_string())
    .collect()
}

/// Parse an item-detail response.
///
/// Returns `Ok(None)` when the `<items>` root holds no item.
pub fn parse_thing(xml: &str) -> Result<Option<CanonicalGame>> {
  let root = parse_items(xml)?;
  let Some(item) = root.child("item") else {
    return Ok(None);
  };

  let ratings = item
    .child("statistics")
    .and_then(|s| s.child("ratings"));
  let rating = |name: &str| ratings.map_or(0.0, |r| coerce::float(r.child_value(name)));

  let best = best_player_counts(&best_votes(item));

  Ok(Some(CanonicalGame {
    id:                       coerce::int(item.attr("id").unwrap_or("")),
    name:                     primary_name(item).unwrap_or("Unknown").to_string(),
    thumbnail:                item.child_text("thumbnail").to_string(),
    image:                    item.child_text("image").to_string(),
    description:              html_to_text(item.child("description").map_or("", |d| &d.text)),
    year_published:           coerce::int(item.child_value("yearpublished")),
    min_players:              coerce::int(item.child_value("minplayers")),
    max_players:              coerce::int(item.child_value("maxplayers")),
    playing_time:             coerce::int(item.child_value("playingtime")),
    min_play_time:            coerce::int(item.child_value("minplaytime")),
    max_play_time:            coerce::int(item.child_value("maxplaytime")),
    bgg_score:                rating("average"),
    average_rating:           rating("bayesaverage"),
    weight:                   rating("averageweight"),
    recommended_player_count: best.clone(),
    best_player_count:        best,
    bgg_type:                 family_ranks(item),
    categories:               links(item, "boardgamecategory"),
    mechanics:                links(item, "boardgamemechanic"),
  }))
}

// ─── Owned collection ────────────────────────────────────────────────────────

/// Parse a collection response, keeping only owned items with a positive id.
///
/// This shape has no polls, description or tags beyond family ranks; those
/// fields stay empty.
pub fn parse_collection(xml: &str) -> Result<Vec<CanonicalGame>> {
  let root = parse_items(xml)?;

  let games = root
    .children_named("item")
    .filter(|item| item.child("status").and_then(|s| s.attr("own")) == Some("1"))
    .map(|item| {
      let stats = item.child("stats");
      let stat = |name: &str| stats.and_then(|s| s.attr(name)).map_or(0, coerce::int);
      let rating_value = |name: &str| {
        stats
          .and_then(|s| s.child("rating"))
          .map_or(0.0, |r| coerce::float(r.child_value(name)))
      };
      let name = item.child_text("name");
      let playing_time = stat("playingtime");

      CanonicalGame {
        id: coerce::int(item.attr("objectid").unwrap_or("")),
        name: if name.is_empty() { "Unknown" } else { name }.to_string(),
        thumbnail: item.child_text("thumbnail").to_string(),
        image: item.child_text("image").to_string(),
        year_published: coerce::int(item.child_text("yearpublished")),
        min_players: stat("minplayers"),
        max_players: stat("maxplayers"),
        playing_time,
        min_play_time: playing_time,
        max_play_time: playing_time,
        bgg_score: rating_value("average"),
        weight: rating_value("averageweight"),
        bgg_type: family_ranks(item),
        ..Default::default()
      }
    })
    .filter(|g| g.id > 0)
    .collect();

  Ok(games)
}
