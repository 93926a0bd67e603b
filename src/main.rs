use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::{debug, info, warn};

use score_ledger::api::{self, AppState};
use score_ledger::blockchain::MiningProgress;
use score_ledger::ledger::{FileStore, KeyValueStore, Ledger, MemoryStore};
use score_ledger::{LedgerConfig, ServerConfig};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let server = ServerConfig::from_env();
    let config = LedgerConfig::from_env();

    let store: Arc<dyn KeyValueStore> = match &config.data_dir {
        Some(dir) => Arc::new(FileStore::open(dir)?),
        None => {
            warn!("LEDGER_DATA_DIR not set; the chain lives in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let ledger = Arc::new(Ledger::open(&config, store).with_progress_observer(Arc::new(
        |p: MiningProgress| {
            debug!(
                "Mining... hashes: {} ({:.0} h/s), time: {:.1}s",
                p.attempts,
                p.hash_rate,
                p.elapsed.as_secs_f64()
            );
        },
    )));

    info!(
        "⛓️ Starting score ledger at http://{}:{} (difficulty={}, policy={}, blocks={})",
        server.host,
        server.port,
        ledger.difficulty(),
        ledger.policy(),
        ledger.len()
    );

    let state = web::Data::new(AppState::new(Arc::clone(&ledger)));

    let http = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((server.host.as_str(), server.port))?
    .run();

    actix_web::rt::spawn(api::stop_on_signal(
        Arc::clone(&ledger),
        http.handle(),
        actix_web::rt::signal::ctrl_c(),
    ));
    let result = http.await;

    ledger.shutdown();
    if let Err(e) = ledger.save() {
        warn!("could not save chain on exit: {e}");
    }
    result
}
