use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::models::UserProfile;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AppState {
    pub profile: Option<UserProfile>,
    #[serde(default)]
    pub favorites: Vec<String>,
}

/// Typed accessors over the locally persisted application state.
/// Everything the app remembers between runs goes through here; no other
/// module touches the state file or invents its own keys.
pub struct StateStore {
    path: PathBuf,
    state: AppState,
}

impl StateStore {
    pub fn load(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("state file {} is not valid JSON", path.display()))?,
            Err(err) if err.kind() == ErrorKind::NotFound => AppState::default(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("could not read state file {}", path.display()))
            }
        };
        Ok(Self { path, state })
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let raw = serde_json::to_string_pretty(&self.state)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("could not write state file {}", self.path.display()))
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.state.profile.as_ref()
    }

    pub fn set_profile(&mut self, profile: UserProfile) {
        self.state.profile = Some(profile);
    }

    pub fn favorites(&self) -> &[String] {
        &self.state.favorites
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.state.favorites.iter().any(|fav| fav == id)
    }

    /// Returns false when the material was already a favorite.
    pub fn add_favorite(&mut self, id: &str) -> bool {
        if self.is_favorite(id) {
            return false;
        }
        self.state.favorites.push(id.to_string());
        true
    }

    pub fn remove_favorite(&mut self, id: &str) -> bool {
        let before = self.state.favorites.len();
        self.state.favorites.retain(|fav| fav != id);
        self.state.favorites.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir().join(format!("weconnect-state-{}.json", Uuid::new_v4()))
    }

    #[test]
    fn missing_file_loads_as_empty_state() {
        let store = StateStore::load(scratch_path()).unwrap();
        assert!(store.profile().is_none());
        assert!(store.favorites().is_empty());
    }

    #[test]
    fn profile_and_favorites_round_trip_through_disk() {
        let path = scratch_path();
        let mut store = StateStore::load(&path).unwrap();
        store.set_profile(UserProfile {
            user_id: Uuid::new_v4(),
            display_name: "Adaeze".to_string(),
            email: "adaeze@example.com".to_string(),
            school: "UNILAG".to_string(),
            course: "MTH 202".to_string(),
        });
        store.add_favorite("mat-1");
        store.save().unwrap();

        let reloaded = StateStore::load(&path).unwrap();
        assert_eq!(reloaded.profile().unwrap().display_name, "Adaeze");
        assert!(reloaded.is_favorite("mat-1"));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn favorites_deduplicate_by_id() {
        let mut store = StateStore::load(scratch_path()).unwrap();
        assert!(store.add_favorite("mat-1"));
        assert!(!store.add_favorite("mat-1"));
        assert_eq!(store.favorites().len(), 1);

        assert!(store.remove_favorite("mat-1"));
        assert!(!store.remove_favorite("mat-1"));
    }
}
