use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, ChainResponse, ValidateResponse};

/// Get the full chain.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    let ledger = &state.ledger;
    let chain = ledger.blocks();
    HttpResponse::Ok().json(ChainResponse {
        length: chain.len(),
        difficulty: ledger.difficulty(),
        policy: ledger.policy(),
        chain,
    })
}

/// Validate the whole chain.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> impl Responder {
    let ledger = &state.ledger;
    HttpResponse::Ok().json(ValidateResponse {
        valid: ledger.is_valid(),
        length: ledger.len(),
        difficulty: ledger.difficulty(),
    })
}
