//! Store settings endpoints

use axum::{extract::State, Json};
use serde_json::{Map, Value};

use super::{ok, ok_with, ApiResponse};
use crate::auth::Admin;
use crate::db;
use crate::domain::aggregates::settings::PublicSettings;
use crate::domain::aggregates::Settings;
use crate::domain::value_objects::Language;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/settings
pub async fn get_public(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<PublicSettings>>> {
    let settings = db::settings::load(&state.db).await?;
    Ok(ok(settings.public_view()))
}

/// GET /api/admin/settings
pub async fn get_all(State(state): State<AppState>, Admin(_): Admin) -> ApiResult<Json<ApiResponse<Settings>>> {
    Ok(ok(db::settings::load(&state.db).await?))
}

const LEGACY_KEYS: [&str; 5] = ["siteName", "siteDescription", "contactEmail", "currency", "language"];

fn text(value: &Value, key: &str) -> Result<String, ApiError> {
    value.as_str().map(str::to_string).ok_or_else(|| ApiError::bad_request(format!("{key} must be a string")))
}

/// Applies the flat keys older admin clients still send.
fn apply_legacy(settings: &mut Settings, legacy: &Map<String, Value>) -> Result<(), ApiError> {
    for (key, value) in legacy {
        match key.as_str() {
            "siteName" => settings.site.name.en = text(value, key)?,
            "siteDescription" => settings.site.description.en = text(value, key)?,
            "contactEmail" => settings.contact.email.primary = Some(text(value, key)?),
            "currency" => settings.site.currency.primary = text(value, key)?,
            "language" => {
                settings.site.default_language = serde_json::from_value::<Language>(value.clone())
                    .map_err(|_| ApiError::bad_request("language must be one of ka, en, tr"))?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Merges `patch` into `current`: nested sections replace whole top-level
/// sections, legacy flat keys update their single field.
fn updated(current: &Settings, patch: Value) -> Result<Settings, ApiError> {
    let Value::Object(mut sections) = patch else {
        return Err(ApiError::bad_request("Settings update must be a JSON object"));
    };
    let mut legacy = Map::new();
    for key in LEGACY_KEYS {
        if let Some(v) = sections.remove(key) {
            legacy.insert(key.to_string(), v);
        }
    }
    let mut settings = current.merge(&Value::Object(sections))?;
    apply_legacy(&mut settings, &legacy)?;
    Ok(settings)
}

/// PUT /api/settings and PUT /api/admin/settings
pub async fn update(
    State(state): State<AppState>,
    Admin(user): Admin,
    Json(patch): Json<Value>,
) -> ApiResult<Json<ApiResponse<Settings>>> {
    let current = db::settings::load(&state.db).await?;
    let settings = updated(&current, patch)?;
    db::settings::save(&state.db, &settings, user.id).await?;
    Ok(ok_with("Settings updated successfully", settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_keys_map_onto_sections() {
        let s = updated(
            &Settings::default(),
            json!({ "siteName": "Kervan Trade", "contactEmail": "info@kervan.ge", "currency": "USD", "language": "en" }),
        )
        .unwrap();
        assert_eq!(s.site.name.en, "Kervan Trade");
        assert_eq!(s.contact.email.primary.as_deref(), Some("info@kervan.ge"));
        assert_eq!(s.site.currency.primary, "USD");
        assert_eq!(s.site.default_language, Language::En);
    }

    #[test]
    fn test_sections_and_legacy_keys_combine() {
        let s = updated(
            &Settings::default(),
            json!({ "siteDescription": "Packaging wholesale", "social": { "instagram": "https://instagram.com/kervan" } }),
        )
        .unwrap();
        assert_eq!(s.site.description.en, "Packaging wholesale");
        assert_eq!(s.social.instagram.as_deref(), Some("https://instagram.com/kervan"));
    }

    #[test]
    fn test_bad_language_is_rejected() {
        assert!(updated(&Settings::default(), json!({ "language": "fr" })).is_err());
        assert!(updated(&Settings::default(), json!("nope")).is_err());
    }
}
