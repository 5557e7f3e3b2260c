use crate::connection::ws_index;
use crate::handlers::session::configure_session_handlers;
use actix_files::Files;
use actix_web::web;

mod session;

pub fn root(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws/").route(web::get().to(ws_index)));

    configure_session_handlers(cfg);
}

/// Serves the browser client. Mounted at `/`, so it must be registered
/// after every other route.
pub fn static_files(dir: &str) -> Files {
    Files::new("/", dir).index_file("index.html")
}
