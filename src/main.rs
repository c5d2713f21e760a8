use actix_cors::Cors;
use actix_web::{App, HttpServer};
use actix_web::middleware::Logger;
use actix_web::http::header;
use actix_web::web::Data;
use env_logger::Env;
use std::sync::Arc;

use filevault::auth::{IdentityResolver, JwtIdentity};
use filevault::config::Config;
use filevault::db::Db;
use filevault::files::FileService;
use filevault::routes;
use filevault::storage::{LocalBlobStore, SqliteFileRepository};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Init logger to show info by default, but can be overridden by RUST_LOG
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cfg = Config::from_env_config().map_err(std::io::Error::other)?;

    let db = Db::connect_and_migrate(&cfg).await
        .map_err(std::io::Error::other)?;

    let files = Data::new(FileService::new(
        Arc::new(LocalBlobStore::new(&cfg.blob_dir)),
        Arc::new(SqliteFileRepository::new(db.clone())),
    ));
    let identity: Arc<dyn IdentityResolver> = Arc::new(JwtIdentity::new(cfg.jwt_secret_bytes()));
    let identity = Data::from(identity);
    log::info!("Starting server at {} (blobs in {})", cfg.listen, cfg.blob_dir);

    let listen_addr = cfg.listen.clone();
    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "DELETE"])
            .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);
        for origin in &cfg.allowed_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(Data::new(cfg.clone()))
            .app_data(Data::new(db.clone()))
            .app_data(files.clone())
            .app_data(identity.clone())
            .configure(routes::configure)
    })
    .bind(listen_addr)?
    .run()
    .await
}
