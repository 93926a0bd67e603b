mod chain;
mod health;
mod mining;
pub mod models;
mod scores;
mod stats;

use std::future::Future;
use std::io;
use std::sync::Arc;

use actix_web::dev::ServerHandle;
use actix_web::web::{self, ServiceConfig};
use log::{info, warn};

use crate::ledger::Ledger;

pub use models::AppState;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_chain)
            .service(chain::validate_chain)
            .service(scores::post_score)
            .service(scores::post_event)
            .service(scores::get_pending)
            .service(scores::get_total)
            .service(scores::get_player_scores)
            .service(mining::mine_pending)
            .service(mining::mine_player)
            .service(stats::get_stats),
    );
}

/// Wait for `signal`, cancel in-flight mining, then stop the server gracefully.
///
/// Cancelling first lets a blocking search return before actix waits on it.
pub async fn stop_on_signal(
    ledger: Arc<Ledger>,
    handle: ServerHandle,
    signal: impl Future<Output = io::Result<()>>,
) {
    if let Err(e) = signal.await {
        warn!("could not listen for the stop signal: {e}");
        return;
    }
    info!("stop signal received; cancelling mining");
    ledger.shutdown();
    handle.stop(true).await;
}
