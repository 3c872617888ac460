//! Exponential-decay hype scoring and the read-path helpers built on it.
//!
//! Each event contributes `direction × e^(−λ·days)`; with λ = 0.02 a single
//! "+1" halves in roughly 35 days, so games hyped regularly stay hot and
//! forgotten ones cool down.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::entry::{CollectionEntry, HypeEvent};

/// Decay constant per day. Half-life is `ln 2 / λ` ≈ 34.7 days.
pub const DECAY_LAMBDA: f64 = 0.02;

const MS_PER_DAY: f64 = 1000.0 * 60.0 * 60.0 * 24.0;

/// Wall-clock time in milliseconds since the Unix epoch, the unit hype
/// timestamps are recorded in.
pub fn now_ms() -> i64 { chrono::Utc::now().timestamp_millis() }

// ─── Scorer ──────────────────────────────────────────────────────────────────

/// Converts a hype log into a bounded score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HypeScorer {
  pub lambda:  f64,
  pub floor:   f64,
  /// `None` leaves the score unbounded above.
  pub ceiling: Option<f64>,
}

impl Default for HypeScorer {
  fn default() -> Self {
    Self {
      lambda:  DECAY_LAMBDA,
      floor:   0.0,
      ceiling: Some(5.0),
    }
  }
}

impl HypeScorer {
  /// The floored-but-unbounded variant.
  pub fn unbounded() -> Self {
    Self {
      ceiling: None,
      ..Self::default()
    }
  }

  /// Score `events` as of `now_ms`, clamped and rounded to two decimals.
  ///
  /// The result is a plain sum, so event order does not matter.
  pub fn score(&self, events: &[HypeEvent], now_ms: i64) -> f64 {
    if events.is_empty() {
      return 0.0;
    }

    let raw: f64 = events
      .iter()
      .map(|e| {
        let days = now_ms.saturating_sub(e.timestamp) as f64 / MS_PER_DAY;
        e.direction.sign() * (-self.lambda * days).exp()
      })
      .sum();

    let mut clamped = raw.max(self.floor);
    if let Some(ceiling) = self.ceiling {
      clamped = clamped.min(ceiling);
    }
    (clamped * 100.0).round() / 100.0
  }

  pub fn score_entry(&self, entry: &CollectionEntry, now_ms: i64) -> f64 {
    self.score(&entry.hype_events, now_ms)
  }
}

// ─── Tiers ───────────────────────────────────────────────────────────────────

/// Qualitative band for a score, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HypeTier {
  Cold,
  Warm,
  Hot,
  Fire,
  Blazing,
}

impl HypeTier {
  pub fn of(score: f64) -> Self {
    if score <= 0.0 {
      Self::Cold
    } else if score < 1.0 {
      Self::Warm
    } else if score < 2.0 {
      Self::Hot
    } else if score < 3.0 {
      Self::Fire
    } else {
      Self::Blazing
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::Cold => "Cold",
      Self::Warm => "Warm",
      Self::Hot => "Hot",
      Self::Fire => "Fire",
      Self::Blazing => "Blazing",
    }
  }

  /// Display color as a hex string. `Cold` uses a muted grey.
  pub fn color(self) -> &'static str {
    match self {
      Self::Cold => "#9E9E9E",
      Self::Warm => "#78909C",
      Self::Hot => "#FFA726",
      Self::Fire => "#FF7043",
      Self::Blazing => "#E53935",
    }
  }
}

// ─── Sorting ─────────────────────────────────────────────────────────────────

/// Collection sort orders offered on read paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
  #[default]
  Name,
  BggScore,
  Weight,
  HypeScore,
  AddedAt,
}

/// Sort `entries` in place. Names sort ascending (case-insensitive); every
/// numeric key sorts descending. Hype scores are computed once, at `now_ms`.
pub fn sort_entries(
  entries: &mut [CollectionEntry],
  key: SortKey,
  scorer: &HypeScorer,
  now_ms: i64,
) {
  let desc = |a: f64, b: f64| b.partial_cmp(&a).unwrap_or(Ordering::Equal);
  match key {
    SortKey::Name => entries.sort_by_cached_key(|e| e.game.name.to_lowercase()),
    SortKey::BggScore => {
      entries.sort_by(|a, b| desc(a.game.bgg_score, b.game.bgg_score))
    }
    SortKey::Weight => entries.sort_by(|a, b| desc(a.game.weight, b.game.weight)),
    SortKey::HypeScore => {
      let mut scored: Vec<(f64, CollectionEntry)> = entries
        .iter()
        .map(|e| (scorer.score_entry(e, now_ms), e.clone()))
        .collect();
      scored.sort_by(|a, b| desc(a.0, b.0));
      for (slot, (_, entry)) in entries.iter_mut().zip(scored) {
        *slot = entry;
      }
    }
    SortKey::AddedAt => entries.sort_by(|a, b| b.added_at.cmp(&a.added_at)),
  }
}
