use actix_web::{get, web, HttpResponse};
use askama::Template;

use crate::services::InstructionStore;

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    instructions: String,
}

#[get("/")]
pub async fn index(instruction_store: web::Data<InstructionStore>) -> HttpResponse {
    let instructions = instruction_store.load().await;

    match (IndexTemplate { instructions }).render() {
        Ok(body) => HttpResponse::Ok().content_type("text/html; charset=utf-8").body(body),
        Err(e) => {
            log::error!("Failed to render index page: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}
