use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use smartscoop_core::domain::profile::{UserId, UserProfile};

use super::{RepositoryError, UserProfileRepository};
use crate::DbPool;

pub struct SqlUserProfileRepository {
    pool: DbPool,
}

impl SqlUserProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserProfileRepository for SqlUserProfileRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_id, preferences, style_profile, budget_limits
             FROM users
             WHERE user_id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_profile(&row)).transpose()
    }

    async fn save(&self, profile: UserProfile) -> Result<(), RepositoryError> {
        let preferences = encode_document(&profile.preferences)?;
        let style_profile = encode_document(&profile.style_profile)?;
        let budget_limits = encode_document(&profile.budget_limits)?;

        // created_at keeps its first-insert value.
        sqlx::query(
            "INSERT INTO users (user_id, preferences, style_profile, budget_limits)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                preferences = excluded.preferences,
                style_profile = excluded.style_profile,
                budget_limits = excluded.budget_limits",
        )
        .bind(profile.user_id.as_str())
        .bind(preferences)
        .bind(style_profile)
        .bind(budget_limits)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_profile(row: &SqliteRow) -> Result<UserProfile, RepositoryError> {
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let preferences: Option<String> =
        row.try_get("preferences").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let style_profile: Option<String> =
        row.try_get("style_profile").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let budget_limits: Option<String> =
        row.try_get("budget_limits").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(UserProfile {
        user_id: UserId(user_id),
        preferences: decode_document("preferences", preferences.as_deref())?,
        style_profile: decode_document("style_profile", style_profile.as_deref())?,
        budget_limits: decode_document("budget_limits", budget_limits.as_deref())?,
    })
}

fn encode_document(document: &Map<String, Value>) -> Result<String, RepositoryError> {
    serde_json::to_string(document).map_err(|e| RepositoryError::Decode(e.to_string()))
}

/// NULL and blank columns read back as an empty mapping.
fn decode_document(
    column: &str,
    raw: Option<&str>,
) -> Result<Map<String, Value>, RepositoryError> {
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return Ok(Map::new());
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(RepositoryError::Decode(format!(
            "users.{column} must hold a JSON object, found `{other}`"
        ))),
        Err(e) => Err(RepositoryError::Decode(format!("users.{column}: {e}"))),
    }
}
