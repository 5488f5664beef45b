//! Kervan Wholesale E-commerce - storefront and back-office API

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kervan_ecommerce::{
    api,
    auth::hash_password,
    config::Config,
    db::{self, users::NewUser},
    domain::aggregates::{user::Preferences, Role},
    publisher::EventPublisher,
    state::AppState,
};

/// Creates the configured admin account unless its email is already taken.
async fn seed_admin(pool: &sqlx::PgPool, config: &Config) -> Result<()> {
    let (Some(email), Some(password)) = (config.admin_email.as_deref(), config.admin_password.as_deref()) else {
        return Ok(());
    };
    if db::users::find_by_email(pool, email).await?.is_some() {
        tracing::debug!(email, "admin account already present");
        return Ok(());
    }

    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!("hashing admin password: {e}"))?;
    let admin = db::users::insert(
        pool,
        NewUser {
            first_name: "Admin",
            last_name: "Kervan",
            email,
            phone: None,
            password_hash: &password_hash,
            role: Role::Admin,
            preferences: Preferences::default(),
        },
    )
    .await?;
    tracing::info!(user_id = %admin.id, email, "admin account created");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kervan_ecommerce=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("configuration: {e}"))?;
    let db = db::connect(&config).await.context("connecting to PostgreSQL")?;
    db::migrate(&db).await.context("running migrations")?;
    seed_admin(&db, &config).await?;

    let events = EventPublisher::connect(config.nats_url.as_deref()).await;
    let port = config.port;
    tracing::info!(environment = %config.environment, nats = events.is_connected(), "configuration loaded");

    let app = api::create_router(AppState::new(db, config, events));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!("Kervan e-commerce listening on 0.0.0.0:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
