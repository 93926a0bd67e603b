use std::sync::Arc;

use actix_web::{HttpResponse, Responder, post, web};
use log::{error, warn};

use super::models::{AppState, ErrorResponse, PlayerMineRequest};
use crate::error::LedgerError;

/// Mine every pending score. The search runs on the blocking pool so it
/// never stalls the async workers.
#[post("/mine/")]
pub async fn mine_pending(state: web::Data<AppState>) -> impl Responder {
    let ledger = Arc::clone(&state.ledger);
    match web::block(move || ledger.mine_pending_scores()).await {
        Ok(Ok(report)) => HttpResponse::Ok().json(report),
        Ok(Err(e)) => ledger_error(e),
        Err(e) => {
            error!("POST /mine/ - mining task failed: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            })
        }
    }
}

/// Mine an award block for one player (base points plus speed bonus).
#[post("/players/{player}/mine/")]
pub async fn mine_player(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<PlayerMineRequest>,
) -> impl Responder {
    let player = path.into_inner();
    if player.trim().is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "player required".into(),
        });
    }

    let ledger = Arc::clone(&state.ledger);
    let points = body.points;
    match web::block(move || ledger.mine_player_score(&player, points)).await {
        Ok(Ok(award)) => HttpResponse::Ok().json(award),
        Ok(Err(e)) => ledger_error(e),
        Err(e) => {
            error!("POST /players/mine/ - mining task failed: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            })
        }
    }
}

fn ledger_error(e: LedgerError) -> HttpResponse {
    warn!("mining request failed: {e}");
    let body = ErrorResponse {
        error: e.to_string(),
    };
    match e {
        LedgerError::MiningInProgress | LedgerError::ChainLinkage { .. } => {
            HttpResponse::Conflict().json(body)
        }
        LedgerError::MiningCancelled => HttpResponse::ServiceUnavailable().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}
