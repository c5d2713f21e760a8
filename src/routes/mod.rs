pub mod files;
pub mod health;

use actix_web::web;

/// Mounts the public API onto an app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/api").service(
                web::scope("/files")
                    .route("", web::post().to(files::upload_file))
                    .route("", web::get().to(files::list_files))
                    .route("/{id}", web::delete().to(files::delete_file))
                    .route("/{id}/content", web::get().to(files::download_file)),
            ),
        );
}
