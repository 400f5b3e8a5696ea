use actix_cors::Cors;
use actix_web::{self, middleware::Logger, web, App, HttpServer};
use std::sync::{Arc, LazyLock};
use tokio::sync::watch;
use validator::Validate;

use crate::{
    configs::connect_storage,
    modules::{
        file::{FileConfig, FileService},
        status::StatusService,
        sweeper::{RetentionSweeper, SweepConfig},
    },
};

mod api;
mod configs;
mod constants;
mod modules;
mod utils;

pub static ENV: LazyLock<constants::Env> = LazyLock::new(|| {
    dotenvy::dotenv().ok();
    env_logger::init();
    if let Err(e) = tracing::subscriber::set_global_default(tracing_subscriber::fmt().finish()) {
        log::warn!("Tracing subscriber already installed: {}", e);
    }
    log::info!("Environment variables loaded from .env file");
    constants::Env::default()
});

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let file_config = FileConfig::from(&*ENV);
    file_config
        .validate()
        .map_err(|e| std::io::Error::other(format!("Invalid file configuration: {e}")))?;

    let sweep_config = SweepConfig::from(&*ENV);
    sweep_config
        .validate()
        .map_err(|e| std::io::Error::other(format!("Invalid sweep configuration: {e}")))?;

    let storage = connect_storage(&ENV).await;
    // Only a missing or unusable configuration is permanent; a database that
    // is down at start-up is retried by the pool.
    if !storage.status.is_connected() {
        log::error!("Storage {}; serving health reports only", storage.status);
    }

    let file_service =
        FileService::new(storage.records.clone(), storage.content.clone(), file_config)
            .map_err(|e| std::io::Error::other(format!("Invalid code settings: {e}")))?;

    let status_service = StatusService::new(
        storage.clone(),
        ENV.database_url.is_some(),
        sweep_config.retention_days,
        sweep_config.interval_secs,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = storage.status.is_connected().then(|| {
        Arc::new(RetentionSweeper::new(
            storage.records.clone(),
            storage.content.clone(),
            sweep_config.clone(),
        ))
        .start(shutdown_rx)
    });

    log::info!("Starting server at http://{}:{}", ENV.ip.as_str(), ENV.port);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(web::Data::new(file_service.clone()))
            .app_data(web::Data::new(status_service.clone()))
            .configure(modules::status::route::configure)
            // catch-all `/{filename}` must stay last
            .configure(modules::file::route::configure)
    })
    .bind((ENV.ip.as_str(), ENV.port))?
    .workers(ENV.workers)
    .run()
    .await;

    if shutdown_tx.send(true).is_err() {
        log::debug!("Retention sweeper not running, nothing to stop");
    }
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            log::error!("Retention sweeper task failed: {}", e);
        }
    }

    server
}
