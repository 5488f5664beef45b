//! Shared application state

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::JwtKeys;
use crate::config::Config;
use crate::publisher::EventPublisher;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtKeys>,
    pub events: EventPublisher,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, events: EventPublisher) -> Self {
        let jwt = JwtKeys::new(&config.jwt_secret, config.jwt_expiry_hours);
        Self { db, config: Arc::new(config), jwt: Arc::new(jwt), events }
    }
}
