use std::collections::HashMap;

use tokio::sync::RwLock;

use smartscoop_core::domain::profile::{UserId, UserProfile};

use super::{RepositoryError, UserProfileRepository};

#[derive(Default)]
pub struct InMemoryUserProfileRepository {
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl InMemoryUserProfileRepository {
    pub fn with_profiles(profiles: impl IntoIterator<Item = UserProfile>) -> Self {
        let profiles =
            profiles.into_iter().map(|profile| (profile.user_id.0.clone(), profile)).collect();
        Self { profiles: RwLock::new(profiles) }
    }
}

#[async_trait::async_trait]
impl UserProfileRepository for InMemoryUserProfileRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(&id.0).cloned())
    }

    async fn save(&self, profile: UserProfile) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.user_id.0.clone(), profile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use smartscoop_core::domain::profile::{UserId, UserProfile};

    use super::InMemoryUserProfileRepository;
    use crate::repositories::UserProfileRepository;

    #[tokio::test]
    async fn save_replaces_existing_profile() {
        let repo = InMemoryUserProfileRepository::default();
        let mut profile = UserProfile::new(UserId::from("u-1"));
        profile.preferences.insert("size".to_string(), json!("S"));
        repo.save(profile).await.expect("save");

        let replacement = UserProfile::new(UserId::from("u-1"));
        repo.save(replacement.clone()).await.expect("save");

        assert_eq!(repo.find_by_id(&UserId::from("u-1")).await.expect("find"), Some(replacement));
        assert_eq!(repo.find_by_id(&UserId::from("u-2")).await.expect("find"), None);
    }
}
