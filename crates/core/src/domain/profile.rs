use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Stored shopping profile. The storage layer replaces all three documents on
/// every save; merging happens before the profile is handed to the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    #[serde(default)]
    pub preferences: Map<String, Value>,
    #[serde(default)]
    pub style_profile: Map<String, Value>,
    #[serde(default)]
    pub budget_limits: Map<String, Value>,
}

impl UserProfile {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            preferences: Map::new(),
            style_profile: Map::new(),
            budget_limits: Map::new(),
        }
    }

    /// Shallow merge: every key in `updates` replaces the stored key.
    pub fn merge_preferences(&mut self, updates: Map<String, Value>) {
        for (key, value) in updates {
            self.preferences.insert(key, value);
        }
    }

    /// Preferences scoped to `category` when given, else the whole mapping.
    /// A category that is missing or not an object yields an empty mapping.
    pub fn preferences_for(&self, category: Option<&str>) -> Map<String, Value> {
        match category {
            None => self.preferences.clone(),
            Some(category) => match self.preferences.get(category) {
                Some(Value::Object(scoped)) => scoped.clone(),
                _ => Map::new(),
            },
        }
    }
}
