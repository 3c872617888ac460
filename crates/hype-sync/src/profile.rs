//! Profile and username operations.
//!
//! Layout in the store:
//!   users/<uid>/settings/profile   UserProfile
//!   usernames/<lower-cased name>   UsernameReservation

use hype_core::{
  entry::CollectionEntry,
  profile::{PROFILE_KEY, UserProfile, UsernameReservation, redact, validate_username},
  session::Session,
  store::{CollectionPath, Document, DocumentStore, Patch, UserId, WriteBatch, WriteOp},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{info, warn};

use crate::{Error, Result};

fn to_document<T: Serialize>(value: &T) -> Result<Document> {
  match serde_json::to_value(value).map_err(hype_core::Error::from)? {
    serde_json::Value::Object(map) => Ok(map),
    _ => Err(hype_core::Error::NotAnObject.into()),
  }
}

fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
  Ok(serde_json::from_value(serde_json::Value::Object(doc)).map_err(hype_core::Error::from)?)
}

async fn read<S, T>(store: &S, collection: &CollectionPath, key: &str) -> Result<Option<T>>
where
  S: DocumentStore,
  T: DeserializeOwned,
{
  store
    .get(&collection.doc(key))
    .await
    .map_err(Error::store)?
    .map(from_document)
    .transpose()
}

/// The signed-in user's profile, if one has been saved.
pub async fn profile<S>(session: &Session<S>) -> Result<Option<UserProfile>>
where
  S: DocumentStore + 'static,
{
  read(session.store(), &CollectionPath::settings(session.user()), PROFILE_KEY).await
}

/// Claim `username` and set visibility in one atomic batch.
///
/// The name is stored lower-cased. A previous reservation held by this user
/// is released; a name reserved by anyone else is refused.
pub async fn save_profile<S>(session: &Session<S>, username: &str, is_public: bool) -> Result<UserProfile>
where
  S: DocumentStore + 'static,
{
  validate_username(username)?;
  let lower = username.to_lowercase();
  let store = session.store();
  let user = session.user();
  let usernames = CollectionPath::usernames();

  let holder: Option<UsernameReservation> = read(store, &usernames, &lower).await?;
  if let Some(holder) = holder
    && holder.user_id != user.as_str()
  {
    return Err(Error::UsernameTaken(lower));
  }

  let mut batch = WriteBatch::new();
  if let Some(old) = profile(session).await?
    && old.username.to_lowercase() != lower
  {
    batch.delete(usernames.doc(old.username.to_lowercase()))?;
  }

  let reservation = UsernameReservation {
    user_id:  user.as_str().to_string(),
    username: lower.clone(),
  };
  let profile = UserProfile {
    username: lower.clone(),
    is_public,
  };
  batch.push(WriteOp::Put(usernames.doc(lower.as_str()), to_document(&reservation)?))?;
  batch.push(WriteOp::Put(
    CollectionPath::settings(user).doc(PROFILE_KEY),
    to_document(&profile)?,
  ))?;
  store.commit(batch).await.map_err(Error::store)?;

  info!(%user, username = %lower, is_public, "profile saved");
  Ok(profile)
}

/// Change only the visibility flag of an existing profile.
pub async fn set_public<S>(session: &Session<S>, is_public: bool) -> Result<()>
where
  S: DocumentStore + 'static,
{
  if profile(session).await?.is_none() {
    return Err(Error::NoProfile);
  }
  let path = CollectionPath::settings(session.user()).doc(PROFILE_KEY);
  session
    .store()
    .update(&path, Patch::new().set("isPublic", is_public))
    .await
    .map_err(Error::store)
}

/// Whether `username` is free for `user` to claim.
pub async fn is_username_available<S>(store: &S, username: &str, user: &UserId) -> Result<bool>
where
  S: DocumentStore,
{
  let holder: Option<UsernameReservation> =
    read(store, &CollectionPath::usernames(), &username.to_lowercase()).await?;
  Ok(holder.is_none_or(|h| h.user_id == user.as_str()))
}

/// The user holding `username`, case-insensitively.
pub async fn resolve_username<S>(store: &S, username: &str) -> Result<Option<UserId>>
where
  S: DocumentStore,
{
  let holder: Option<UsernameReservation> =
    read(store, &CollectionPath::usernames(), &username.to_lowercase()).await?;
  Ok(holder.map(|h| UserId::new(h.user_id)))
}

/// `user`'s collection as other people see it, or `None` if the profile is
/// missing or private. Notes and play dates are blanked.
pub async fn public_collection<S>(store: &S, user: &UserId) -> Result<Option<Vec<CollectionEntry>>>
where
  S: DocumentStore,
{
  let profile: Option<UserProfile> =
    read(store, &CollectionPath::settings(user), PROFILE_KEY).await?;
  if !profile.is_some_and(|p| p.is_public) {
    return Ok(None);
  }

  let docs = store
    .list(&CollectionPath::games(user))
    .await
    .map_err(Error::store)?;
  let entries = docs
    .into_iter()
    .filter_map(|(key, doc)| match CollectionEntry::from_document(&doc) {
      Ok(entry) => Some(redact(entry)),
      Err(e) => {
        warn!(%user, %key, error = %e, "skipping undecodable entry");
        None
      }
    })
    .collect();
  Ok(Some(entries))
}
