use actix_web::{HttpResponse, Responder, get, web};

use super::models::AppState;

/// Chain length, pending count, difficulty, total score and validity.
#[get("/stats/")]
pub async fn get_stats(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.ledger.summary())
}
