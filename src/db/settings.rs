use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::domain::aggregates::Settings;
use crate::Result;

/// The settings document; sections missing from storage take their defaults.
pub async fn load(pool: &PgPool) -> Result<Settings> {
    let doc: Option<Json<Settings>> = sqlx::query_scalar("SELECT document FROM settings WHERE id = 1")
        .fetch_optional(pool)
        .await?;
    Ok(doc.map(|d| d.0).unwrap_or_default())
}

pub async fn save(pool: &PgPool, settings: &Settings, updated_by: Uuid) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (id, document, updated_by, updated_at) VALUES (1, $1, $2, NOW())
            ON CONFLICT (id) DO UPDATE SET document = EXCLUDED.document, updated_by = EXCLUDED.updated_by,
            updated_at = EXCLUDED.updated_at",
    )
    .bind(Json(settings))
    .bind(updated_by)
    .execute(pool)
    .await?;
    tracing::info!(%updated_by, "settings updated");
    Ok(())
}
