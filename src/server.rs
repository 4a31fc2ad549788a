use crate::models::Update;
use crate::telegram::UpdateHandler;
use actix_web::{post, web, App, HttpResponse, HttpServer, Responder};
use serde_json::json;
use std::sync::Arc;

pub struct AppState {
    pub handler: Arc<UpdateHandler>,
}

/// Telegram expects a fast 200; the real work continues in a spawned task.
#[post("/webhook")]
async fn webhook(state: web::Data<AppState>, update: web::Json<Update>) -> impl Responder {
    let handler = state.handler.clone();
    let update = update.into_inner();

    actix_web::rt::spawn(async move {
        handler.handle_update(update).await;
    });

    HttpResponse::Ok().json(json!({ "ok": true }))
}

pub async fn run(handler: Arc<UpdateHandler>, port: u16) -> std::io::Result<()> {
    let state = web::Data::new(AppState { handler });

    HttpServer::new(move || App::new().app_data(state.clone()).service(webhook))
        .bind(("0.0.0.0", port))?
        .run()
        .await
}
