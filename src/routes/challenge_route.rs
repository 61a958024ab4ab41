use actix_web::{post, web, HttpResponse};
use serde_json::json;

use crate::services::OperatorSignal;

/// Called by the operator once the challenge in the browser window is solved.
/// Rejected with 409 when no run is waiting on a challenge.
#[post("/challenge/resolve")]
pub async fn resolve_challenge(operator_signal: web::Data<OperatorSignal>) -> HttpResponse {
    if !operator_signal.resolve() {
        log::warn!("Ignoring challenge resolution: no run is waiting");
        return HttpResponse::Conflict().json(json!({ "error": "No challenge is waiting for resolution" }));
    }

    log::info!("Operator confirmed challenge resolution");
    HttpResponse::Ok().json(json!({ "status": "resolved" }))
}
