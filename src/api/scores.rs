use actix_web::{HttpResponse, Responder, get, post, web};
use log::debug;

use super::models::{
    AddScoreRequest, AppState, EventRequest, PendingResponse, QueuedResponse, TotalResponse,
};

/// Queue a score delta (negative for penalties).
#[post("/scores/")]
pub async fn post_score(
    state: web::Data<AppState>,
    body: web::Json<AddScoreRequest>,
) -> impl Responder {
    let body = body.into_inner();
    debug!("POST /scores/ - delta={} description={:?}", body.delta, body.description);
    let pending = state.ledger.add_score(body.delta, body.description);
    HttpResponse::Ok().json(QueuedResponse { pending })
}

/// Queue the fixed score for a game-flow event.
#[post("/events/")]
pub async fn post_event(
    state: web::Data<AppState>,
    body: web::Json<EventRequest>,
) -> impl Responder {
    debug!("POST /events/ - {:?}", body.event);
    let pending = state.ledger.record(body.event);
    HttpResponse::Ok().json(QueuedResponse { pending })
}

/// List scores waiting to be mined.
#[get("/scores/pending/")]
pub async fn get_pending(state: web::Data<AppState>) -> impl Responder {
    let scores = state.ledger.pending();
    HttpResponse::Ok().json(PendingResponse {
        size: scores.len(),
        scores,
    })
}

#[get("/score/")]
pub async fn get_total(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(TotalResponse {
        total: state.ledger.total_score(),
    })
}

/// Per-player totals from award blocks.
#[get("/players/scores/")]
pub async fn get_player_scores(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.ledger.player_scores())
}
