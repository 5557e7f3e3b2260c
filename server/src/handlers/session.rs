use crate::admin::{AdminCommand, SessionDescription};
use crate::server::{ServerCommand, ServerTx};
use actix_web::{error, web, HttpResponse, Responder};

pub fn configure_session_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/session").route(web::get().to(get)));
}

async fn get(srv_tx: web::Data<ServerTx>) -> Result<impl Responder, actix_web::error::Error> {
    let (tx, rx) = tokio::sync::oneshot::channel::<SessionDescription>();

    srv_tx
        .send(ServerCommand::Admin(AdminCommand::GetSessionState { tx }))
        .await
        .map_err(|_| error::ErrorInternalServerError("Internal Server Error"))?;

    let description = rx
        .await
        .map_err(|_| error::ErrorInternalServerError("Receiver await error"))?;

    Ok(HttpResponse::Ok().json(description))
}
