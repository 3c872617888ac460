//! The canonical game record every catalog adapter converges on.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, store::Document};

/// Catalog data about one game, normalised across the CSV export, the XML
/// API and the item page.
///
/// Numeric fields are `0` when unknown and list fields are empty, never
/// absent, so a partially-populated record still round-trips through the
/// document store unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanonicalGame {
  /// The Catalog's stable identifier.
  pub id:                       u32,
  pub name:                     String,
  pub thumbnail:                String,
  pub image:                    String,
  /// Plain text; markup is stripped by the adapters.
  pub description:              String,
  pub year_published:           u32,
  pub min_players:              u32,
  pub max_players:              u32,
  /// Minutes.
  pub playing_time:             u32,
  pub min_play_time:            u32,
  pub max_play_time:            u32,
  /// Raw average rating.
  pub bgg_score:                f64,
  /// Bayesian-adjusted average.
  pub average_rating:           f64,
  /// Complexity, 0–5.
  pub weight:                   f64,
  pub best_player_count:        Vec<u32>,
  /// Superset of `best_player_count` when the source distinguishes them.
  pub recommended_player_count: Vec<u32>,
  /// Family / subdomain tags, e.g. "Strategy".
  pub bgg_type:                 Vec<String>,
  pub categories:               Vec<String>,
  pub mechanics:                Vec<String>,
}

impl CanonicalGame {
  /// The document key this game is stored under.
  pub fn key(&self) -> String { self.id.to_string() }

  /// The catalog-owned fields as a store document, keyed in camelCase.
  pub fn to_document(&self) -> Result<Document> {
    match serde_json::to_value(self)? {
      serde_json::Value::Object(map) => Ok(map),
      _ => Err(Error::NotAnObject),
    }
  }
}

/// One hit from a catalog name search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
  pub id:             u32,
  pub name:           String,
  pub year_published: u32,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn document_has_every_field() {
    let doc = CanonicalGame {
      id: 13,
      name: "Catan".into(),
      ..Default::default()
    }
    .to_document()
    .unwrap();
    assert_eq!(doc.len(), 19);
    assert_eq!(doc["yearPublished"], serde_json::json!(0));
    assert_eq!(doc["recommendedPlayerCount"], serde_json::json!([]));
  }
}
