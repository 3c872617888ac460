//! Collection CSV export adapter.
//!
//! Pipeline:
//!   raw &str
//!     └─ records()   → Vec<Vec<String>>       (RFC 4180 tokenizer)
//!          └─ rows() → Vec<HashMap<..>>       (keyed by lower-cased header)
//!               └─ project() → CanonicalGame  (rows without id/name dropped)

use std::collections::HashMap;

use hype_core::{coerce, game::CanonicalGame};

/// One data row, keyed by lower-cased, trimmed header name.
pub type Row = HashMap<String, String>;

/// Parse a collection export into canonical games.
///
/// Rows missing `objectid` or `objectname` are dropped silently. Fields this
/// export does not carry (images, description, tags) are left empty.
pub fn parse(text: &str) -> Vec<CanonicalGame> {
  rows(text).iter().filter_map(project).collect()
}

/// Tokenize `text` and key each non-blank data row by the header row.
pub fn rows(text: &str) -> Vec<Row> {
  let mut records = records(text).into_iter();
  let Some(header) = records.next() else {
    return Vec::new();
  };
  let header: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();

  records
    .filter(|r| r.iter().any(|f| !f.trim().is_empty()))
    .map(|r| {
      header
        .iter()
        .enumerate()
        .map(|(i, h)| (h.clone(), r.get(i).cloned().unwrap_or_default()))
        .collect()
    })
    .collect()
}

/// Split `text` into records of fields.
///
/// Double-quoted fields may contain commas, CR/LF and `""` escapes. Records
/// end at an unquoted LF or CRLF.
pub fn records(text: &str) -> Vec<Vec<String>> {
  let mut records = Vec::new();
  let mut record: Vec<String> = Vec::new();
  let mut field = String::new();
  let mut in_quotes = false;
  let mut chars = text.chars().peekable();

  while let Some(c) = chars.next() {
    if in_quotes {
      match c {
        '"' if chars.peek() == Some(&'"') => {
          chars.next();
          field.push('"');
        }
        '"' => in_quotes = false,
        _ => field.push(c),
      }
      continue;
    }

    match c {
      '"' => in_quotes = true,
      ',' => record.push(std::mem::take(&mut field)),
      '\r' | '\n' => {
        if c == '\r' && chars.peek() == Some(&'\n') {
          chars.next();
        }
        record.push(std::mem::take(&mut field));
        records.push(std::mem::take(&mut record));
      }
      _ => field.push(c),
    }
  }

  if !field.is_empty() || !record.is_empty() {
    record.push(field);
    records.push(record);
  }
  records
}

fn project(row: &Row) -> Option<CanonicalGame> {
  let get = |key: &str| row.get(key).map(String::as_str).unwrap_or("");

  let id = coerce::int(get("objectid"));
  let name = get("objectname").trim();
  if id == 0 || name.is_empty() {
    return None;
  }

  Some(CanonicalGame {
    id,
    name: name.to_string(),
    year_published: coerce::int(get("yearpublished")),
    min_players: coerce::int(get("minplayers")),
    max_players: coerce::int(get("maxplayers")),
    playing_time: coerce::int(get("playingtime")),
    min_play_time: coerce::int(get("minplaytime")),
    max_play_time: coerce::int(get("maxplaytime")),
    bgg_score: coerce::float(get("average")),
    average_rating: coerce::float(get("baverage")),
    weight: coerce::float(get("avgweight")),
    best_player_count: coerce::player_list(get("bggbestplayers")),
    recommended_player_count: coerce::player_list(get("bggrecplayers")),
    ..Default::default()
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  const EXPORT: &str = "objectname,objectid,rating,numplays,yearpublished,minplayers,maxplayers,playingtime,minplaytime,maxplaytime,average,baverage,avgweight,bggbestplayers,bggrecplayers\r\n\
\"Brass: Birmingham\",224517,9,12,2018,2,4,120,60,120,8.59,8.41,3.87,\"3,4\",\"2,3,4\"\r\n\
Azul,230802,,3,2017,2,4,45,30,45,7.74,7.64,1.76,2,\"2,3,4\"\r\n";

  #[test]
  fn quoted_field_with_comma_newline_and_escape() {
    let recs = records("h\n\"a,b\n\"\"c\"\"\"\n");
    assert_eq!(recs, vec![vec!["h".to_string()], vec!["a,b\n\"c\"".to_string()]]);
  }

  #[test]
  fn parses_export() {
    let games = parse(EXPORT);
    assert_eq!(games.len(), 2);

    let brass = &games[0];
    assert_eq!(brass.id, 224517);
    assert_eq!(brass.name, "Brass: Birmingham");
    assert_eq!(brass.year_published, 2018);
    assert_eq!((brass.min_players, brass.max_players), (2, 4));
    assert_eq!(brass.playing_time, 120);
    assert_eq!(brass.min_play_time, 60);
    assert_eq!(brass.bgg_score, 8.59);
    assert_eq!(brass.average_rating, 8.41);
    assert_eq!(brass.weight, 3.87);
    assert_eq!(brass.best_player_count, vec![3, 4]);
    assert_eq!(brass.recommended_player_count, vec![2, 3, 4]);
    assert!(brass.thumbnail.is_empty());
    assert!(brass.bgg_type.is_empty());

    assert_eq!(games[1].best_player_count, vec![2]);
  }

  #[test]
  fn header_is_case_insensitive() {
    let games = parse("ObjectID,ObjectName,AvgWeight\n1,Go,3.9\n");
    assert_eq!(games[0].name, "Go");
    assert_eq!(games[0].weight, 3.9);
  }

  #[test]
  fn drops_rows_without_id_or_name_and_blank_rows() {
    let text = "objectid,objectname\n1,Keep\n\n,NoId\n2,\n  \nx,BadId\n3,Also kept";
    let games = parse(text);
    let ids: Vec<u32> = games.iter().map(|g| g.id).collect();
    assert_eq!(ids, vec![1, 3]);
  }

  #[test]
  fn bad_numbers_default_to_zero() {
    let games = parse("objectid,objectname,average,minplayers,bggbestplayers\n5,X,n/a,-3,\"0,abc,4\"\n");
    assert_eq!(games[0].bgg_score, 0.0);
    assert_eq!(games[0].min_players, 0);
    assert_eq!(games[0].best_player_count, vec![4]);
  }

  #[test]
  fn empty_input() {
    assert!(parse("").is_empty());
    assert!(parse("objectid,objectname\n").is_empty());
  }
}
