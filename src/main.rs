mod auth;
mod config;
mod error;
mod voting;
mod web;

use std::error::Error;

use tracing::info;
use tracing_subscriber::EnvFilter;

use auth::{PasswordHasher, TokenCodec};
use config::Config;
use web::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    let pool = web::db::establish_pool(&config.database_url, config.pool_size)?;

    // Schema and admin promotion both happen before the first request
    let setup_pool = pool.clone();
    let admin_emails = config.admin_emails.clone();
    let promoted = tokio::task::spawn_blocking(move || -> Result<usize, Box<dyn Error + Send + Sync>> {
        let mut conn = setup_pool.get()?;
        let applied = web::db::run_migrations(&mut conn)?;
        if !applied.is_empty() {
            info!(migrations = ?applied, "applied migrations");
        }
        Ok(web::user_api::promote_admins(&mut conn, &admin_emails)?)
    })
    .await??;
    if promoted > 0 {
        info!(promoted, "promoted configured admins");
    }

    let tokens = match &config.jwt_secret {
        Some(secret) => TokenCodec::new(secret.as_bytes(), config.token_ttl),
        None => TokenCodec::with_random_key(config.token_ttl),
    };
    let state = AppState::new(pool, tokens, PasswordHasher::new(config.bcrypt_cost));

    web::serve(state, &config).await?;
    Ok(())
}
