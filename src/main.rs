use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Result;
use ecb_rates::api::{self, AppState};
use ecb_rates::cache::WindowCache;
use ecb_rates::config::{Config, DEFAULT_CONFIG_PATH};
use ecb_rates::resolver::RateResolver;
use ecb_rates::upstream::EcbClient;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::var("CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = Config::load(&config_path)?;

    let client = EcbClient::new(&config)?;
    let resolver = RateResolver::new(Arc::new(client), WindowCache::new(config.cache_ttl()));
    let state = web::Data::new(AppState::new(resolver, config.default_currencies.clone()));

    log::info!(
        "Serving ECB rates from {} on {}:{} (cache ttl {:?})",
        config.api_url,
        config.host,
        config.port,
        config.cache_ttl()
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(api::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
