//! Explicit user actions: the only writers of user-owned entry fields.

use hype_core::{
  entry::{HypeDirection, HypeEvent},
  store::{DocumentStore, Patch},
};
use serde_json::Value;
use tracing::debug;

use crate::{Error, Result, engine::Reconciler};

impl<S, C> Reconciler<'_, S, C>
where
  S: DocumentStore + 'static,
{
  /// Merge `patch` into entry `id`, which must exist.
  async fn update_entry(&self, id: u32, patch: Patch) -> Result<()> {
    if self.existing(id).await?.is_none() {
      return Err(Error::NotInCollection(id));
    }
    let path = self.session.games().doc(id.to_string());
    self
      .session
      .store()
      .update(&path, patch)
      .await
      .map_err(Error::store)
  }

  pub async fn remove_game(&self, id: u32) -> Result<()> {
    let path = self.session.games().doc(id.to_string());
    self.session.store().delete(&path).await.map_err(Error::store)?;
    debug!(id, "removed entry");
    Ok(())
  }

  pub async fn set_hidden(&self, id: u32, hidden: bool) -> Result<()> {
    self.update_entry(id, Patch::new().set("hidden", hidden)).await
  }

  /// Append a hype event stamped with the current time.
  pub async fn nudge_hype(&self, id: u32, direction: HypeDirection) -> Result<()> {
    let event = HypeEvent {
      direction,
      timestamp: self.now(),
    };
    let event = serde_json::to_value(event).map_err(hype_core::Error::from)?;
    self
      .update_entry(id, Patch::new().array_union("hypeEvents", vec![event]))
      .await
  }

  pub async fn add_play_date(&self, id: u32, date: &str) -> Result<()> {
    self
      .update_entry(id, Patch::new().array_union("playDates", vec![Value::from(date)]))
      .await
  }

  pub async fn remove_play_date(&self, id: u32, date: &str) -> Result<()> {
    self
      .update_entry(id, Patch::new().array_remove("playDates", vec![Value::from(date)]))
      .await
  }

  pub async fn add_label(&self, id: u32, label: &str) -> Result<()> {
    self
      .update_entry(id, Patch::new().array_union("labels", vec![Value::from(label)]))
      .await
  }

  pub async fn remove_label(&self, id: u32, label: &str) -> Result<()> {
    self
      .update_entry(id, Patch::new().array_remove("labels", vec![Value::from(label)]))
      .await
  }

  pub async fn set_personal_note(&self, id: u32, note: &str) -> Result<()> {
    self
      .update_entry(id, Patch::new().set("personalNote", note))
      .await
  }
}
