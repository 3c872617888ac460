//! Collection entries: catalog data plus the fields only a user may change.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, game::CanonicalGame, store::Document};

// ─── Hype events ─────────────────────────────────────────────────────────────

/// Whether a hype event raises or lowers interest. Serialised as `1` / `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum HypeDirection {
  Up,
  Down,
}

impl HypeDirection {
  pub fn sign(self) -> f64 {
    match self {
      Self::Up => 1.0,
      Self::Down => -1.0,
    }
  }
}

impl TryFrom<i8> for HypeDirection {
  type Error = Error;

  fn try_from(value: i8) -> Result<Self> {
    match value {
      1 => Ok(Self::Up),
      -1 => Ok(Self::Down),
      other => Err(Error::InvalidDirection(other)),
    }
  }
}

impl From<HypeDirection> for i8 {
  fn from(d: HypeDirection) -> Self {
    match d {
      HypeDirection::Up => 1,
      HypeDirection::Down => -1,
    }
  }
}

/// A timestamped interest signal. Events are appended, never edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypeEvent {
  pub direction: HypeDirection,
  /// Milliseconds since the Unix epoch.
  pub timestamp: i64,
}

impl HypeEvent {
  pub fn up(timestamp: i64) -> Self {
    Self {
      direction: HypeDirection::Up,
      timestamp,
    }
  }

  pub fn down(timestamp: i64) -> Self {
    Self {
      direction: HypeDirection::Down,
      timestamp,
    }
  }
}

// ─── CollectionEntry ─────────────────────────────────────────────────────────

/// A game in a user's collection.
///
/// The flattened [`CanonicalGame`] holds the catalog-owned fields; everything
/// else is user-owned and is written only by explicit user actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEntry {
  #[serde(flatten)]
  pub game:          CanonicalGame,
  #[serde(default)]
  pub labels:        Vec<String>,
  /// Free-form date strings, e.g. `2024-05-01`.
  #[serde(default)]
  pub play_dates:    Vec<String>,
  #[serde(default)]
  pub personal_note: String,
  #[serde(default)]
  pub hype_events:   Vec<HypeEvent>,
  /// Creation time, milliseconds since the Unix epoch.
  #[serde(default)]
  pub added_at:      i64,
  #[serde(default)]
  pub hidden:        bool,
}

impl CollectionEntry {
  /// A fresh entry for `game`, carrying the single creation hype event.
  pub fn create(game: CanonicalGame, now_ms: i64) -> Self {
    Self {
      game,
      labels: Vec::new(),
      play_dates: Vec::new(),
      personal_note: String::new(),
      hype_events: vec![HypeEvent::up(now_ms)],
      added_at: now_ms,
      hidden: false,
    }
  }

  pub fn id(&self) -> u32 { self.game.id }

  /// The document key for this entry: the stringified catalog id.
  pub fn key(&self) -> String { self.game.key() }

  /// Encode as a store document.
  pub fn to_document(&self) -> Result<Document> {
    match serde_json::to_value(self)? {
      serde_json::Value::Object(map) => Ok(map),
      _ => Err(Error::NotAnObject),
    }
  }

  /// Decode from a store document; missing fields take their defaults.
  pub fn from_document(doc: &Document) -> Result<Self> {
    Ok(serde_json::from_value(serde_json::Value::Object(doc.clone()))?)
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn direction_serialises_as_sign() {
    let e = HypeEvent::down(5);
    let v = serde_json::to_value(e).unwrap();
    assert_eq!(v, json!({ "direction": -1, "timestamp": 5 }));

    let bad: Result<HypeEvent, _> =
      serde_json::from_value(json!({ "direction": 2, "timestamp": 0 }));
    assert!(bad.is_err());
  }

  #[test]
  fn create_has_one_up_event() {
    let game = CanonicalGame {
      id: 13,
      name: "Catan".into(),
      ..Default::default()
    };
    let entry = CollectionEntry::create(game, 1_000);
    assert_eq!(entry.hype_events, vec![HypeEvent::up(1_000)]);
    assert_eq!(entry.added_at, 1_000);
    assert!(!entry.hidden);
    assert_eq!(entry.key(), "13");
  }

  #[test]
  fn document_is_flat_and_tolerant() {
    let mut entry = CollectionEntry::create(
      CanonicalGame {
        id: 822,
        name: "Carcassonne".into(),
        weight: 1.9,
        ..Default::default()
      },
      42,
    );
    entry.labels.push("family".into());

    let doc = entry.to_document().unwrap();
    assert_eq!(doc.get("id"), Some(&json!(822)));
    assert_eq!(doc.get("personalNote"), Some(&json!("")));
    assert_eq!(doc.get("bggType"), Some(&json!([])));

    let back = CollectionEntry::from_document(&doc).unwrap();
    assert_eq!(back, entry);

    // A sparse document written by an older client still decodes.
    let sparse = json!({ "id": 1, "name": "Go" });
    let sparse = sparse.as_object().unwrap();
    let decoded = CollectionEntry::from_document(sparse).unwrap();
    assert_eq!(decoded.game.name, "Go");
    assert!(decoded.hype_events.is_empty());
    assert_eq!(decoded.game.bgg_score, 0.0);
  }
}
