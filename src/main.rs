use std::io;
use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use log::{error, info};
use sqlx::mysql::MySqlPoolOptions;

mod auth;
mod config;
mod errors;
mod models;
mod routes;
mod store;

use config::Config;
use store::{mysql::MySqlStore, Repository};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            error!("Failed to create pool: {}", e);
            io::Error::new(io::ErrorKind::Other, e)
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        error!("Failed to run migrations: {}", e);
        io::Error::new(io::ErrorKind::Other, e)
    })?;

    let store: Arc<dyn Repository> = Arc::new(MySqlStore::new(pool));
    let store = web::Data::from(store);
    let server_address = config.server_address.clone();
    let config = web::Data::new(config);

    info!("Server running at http://{}", server_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(store.clone())
            .app_data(config.clone())
            .app_data(errors::json_config())
            .configure(routes::routes::configure)
    })
    .bind(server_address)?
    .run()
    .await
}
