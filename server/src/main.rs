use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};

use whiteboard_server::config::ServerConfig;
use whiteboard_server::handlers;
use whiteboard_server::server::spawn_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;

    let srv_tx = web::Data::new(spawn_server(&config));
    let bind_addr = config.bind_addr();
    let static_dir = config.static_dir.clone();
    let config = web::Data::new(config);

    if let Some(dir) = &static_dir {
        log::info!("Serving client from {}", dir);
    }
    log::info!("Server started on {}:{}", bind_addr.0, bind_addr.1);
    HttpServer::new(move || {
        let app = App::new()
            .app_data(srv_tx.clone())
            .app_data(config.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET"]),
            )
            .wrap(Logger::default())
            .configure(handlers::root);
        match &static_dir {
            Some(dir) => app.service(handlers::static_files(dir)),
            None => app,
        }
    })
    .bind(bind_addr)?
    .run()
    .await
}
