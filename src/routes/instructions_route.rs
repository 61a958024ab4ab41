use actix_web::{post, web, HttpResponse};
use serde_json::json;

use crate::services::InstructionStore;

#[post("/reset-instructions")]
pub async fn reset_instructions(instruction_store: web::Data<InstructionStore>) -> HttpResponse {
    match instruction_store.default_instructions().await {
        Some(instructions) => HttpResponse::Ok().json(json!({ "instructions": instructions })),
        None => HttpResponse::NotFound().json(json!({ "error": "Default instructions file not found" })),
    }
}
