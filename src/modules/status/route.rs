use actix_web::web;

use crate::modules::status::handle;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(handle::home).service(handle::health);
}
