//! Plain-text rendering of collection listings.

use hype_core::{
  entry::CollectionEntry,
  game::SearchResult,
  hype::{HypeScorer, HypeTier},
};

/// One line per entry: id, hype score, tier, name, and flags.
pub fn entries(entries: &[CollectionEntry], scorer: &HypeScorer, now_ms: i64) -> String {
  let mut out = String::new();
  for entry in entries {
    let score = scorer.score_entry(entry, now_ms);
    let tier = HypeTier::of(score);
    out.push_str(&format!(
      "{:>7}  {:>5.2}  {:<7}  {}",
      entry.game.id,
      score,
      tier.label(),
      entry.game.name
    ));
    if entry.game.year_published > 0 {
      out.push_str(&format!(" ({})", entry.game.year_published));
    }
    if !entry.labels.is_empty() {
      out.push_str(&format!("  [{}]", entry.labels.join(", ")));
    }
    if entry.hidden {
      out.push_str("  (hidden)");
    }
    out.push('\n');
  }
  out
}

pub fn search_results(results: &[SearchResult]) -> String {
  results
    .iter()
    .map(|r| match r.year_published {
      0 => format!("{:>7}  {}\n", r.id, r.name),
      year => format!("{:>7}  {} ({year})\n", r.id, r.name),
    })
    .collect()
}

/// Multi-line detail view of one entry.
pub fn detail(entry: &CollectionEntry, scorer: &HypeScorer, now_ms: i64) -> String {
  let game = &entry.game;
  let score = scorer.score_entry(entry, now_ms);
  let mut out = format!("{} [{}]\n", game.name, game.id);
  out.push_str(&format!(
    "  hype:     {score:.2} ({})\n",
    HypeTier::of(score).label()
  ));
  out.push_str(&format!(
    "  players:  {}-{}  best {:?}\n",
    game.min_players, game.max_players, game.best_player_count
  ));
  out.push_str(&format!("  time:     {} min\n", game.playing_time));
  out.push_str(&format!(
    "  rating:   {:.2}  weight {:.2}\n",
    game.bgg_score, game.weight
  ));
  if !entry.labels.is_empty() {
    out.push_str(&format!("  labels:   {}\n", entry.labels.join(", ")));
  }
  if !entry.play_dates.is_empty() {
    out.push_str(&format!("  played:   {}\n", entry.play_dates.join(", ")));
  }
  if !entry.personal_note.is_empty() {
    out.push_str(&format!("  note:     {}\n", entry.personal_note));
  }
  out
}

#[cfg(test)]
mod tests {
  use hype_core::{entry::HypeEvent, game::CanonicalGame};

  use super::*;

  const NOW: i64 = 1_700_000_000_000;

  fn entry(id: u32, name: &str) -> CollectionEntry {
    CollectionEntry::create(
      CanonicalGame {
        id,
        name: name.into(),
        ..CanonicalGame::default()
      },
      NOW,
    )
  }

  #[test]
  fn lists_score_and_tier() {
    let mut hot = entry(13, "Catan");
    hot.hype_events.push(HypeEvent::up(NOW));
    hot.game.year_published = 1995;
    let out = entries(&[hot], &HypeScorer::default(), NOW);
    assert_eq!(out, "     13   2.00  Fire     Catan (1995)\n");
  }

  #[test]
  fn marks_hidden_and_labels() {
    let mut e = entry(7, "Azul");
    e.hidden = true;
    e.labels = vec!["family".into()];
    let out = entries(&[e], &HypeScorer::default(), NOW);
    assert!(out.ends_with("Azul  [family]  (hidden)\n"), "{out}");
  }

  #[test]
  fn search_omits_unknown_year() {
    let out = search_results(&[
      SearchResult {
        id:             1,
        name:           "A".into(),
        year_published: 0,
      },
      SearchResult {
        id:             2,
        name:           "B".into(),
        year_published: 2020,
      },
    ]);
    assert_eq!(out, "      1  A\n      2  B (2020)\n");
  }
}
