mod auth;
mod config;
mod database;
mod error;
mod model;
mod routes;

use actix_web::{middleware::Logger, web, App, HttpServer};
use auth::Auth;
use config::Config;
use log::info;
use std::io;

#[actix_rt::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("cinelog=debug,actix_web=info"),
    )
    .init();

    let config = Config::from_env()?;
    let db = sled::open(&config.database_path)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    info!("Opened database at {}", config.database_path);

    let db = web::Data::new(db);
    let auth = web::Data::new(Auth::new(&config.jwt_secret, config.bcrypt_cost));

    let cors_origin = config.cors_origin.clone();
    info!("Listening on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .wrap(routes::cors(cors_origin.as_deref()))
            .wrap(Logger::default())
            .app_data(db.clone())
            .app_data(auth.clone())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
