use actix_web::web;

use crate::modules::file::handle;

/// `/{filename}` matches any single segment, so it is registered last.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/upload").route(web::post().to(handle::upload_file)))
        .service(web::resource("/files").route(web::get().to(handle::list_files)))
        .service(web::resource("/info/{code}").route(web::get().to(handle::file_info)))
        .service(
            web::resource("/delete/{file_id}")
                .route(web::delete().to(handle::delete_file))
                .route(web::post().to(handle::delete_file)),
        )
        .service(web::resource("/{filename}").route(web::get().to(handle::view_file)));
}
