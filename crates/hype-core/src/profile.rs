//! Public profile and username rules.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, entry::CollectionEntry};

/// Key of the profile document inside a user's settings collection.
pub const PROFILE_KEY: &str = "profile";

const RESERVED: &[&str] = &["search", "api", "settings", "login", "admin"];

/// The user-chosen handle and visibility flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  /// Always stored lower-cased.
  pub username:  String,
  #[serde(default)]
  pub is_public: bool,
}

/// The `usernames/<name>` document that maps a handle back to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsernameReservation {
  pub user_id:  String,
  pub username: String,
}

/// Check a proposed username: 3–24 characters of `[A-Za-z0-9_-]`, not a
/// reserved route name.
pub fn validate_username(username: &str) -> Result<()> {
  let len = username.chars().count();
  if len < 3 {
    return Err(Error::InvalidUsername("at least 3 characters"));
  }
  if len > 24 {
    return Err(Error::InvalidUsername("max 24 characters"));
  }
  if !username
    .chars()
    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
  {
    return Err(Error::InvalidUsername("letters, numbers, _ and - only"));
  }
  if RESERVED.iter().any(|r| r.eq_ignore_ascii_case(username)) {
    return Err(Error::InvalidUsername("reserved name"));
  }
  Ok(())
}

/// Blank the private fields of an entry before showing it to other users.
pub fn redact(mut entry: CollectionEntry) -> CollectionEntry {
  entry.personal_note.clear();
  entry.play_dates.clear();
  entry
}
