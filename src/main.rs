use dotenv::dotenv;
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

use fx_dashboard::app::AppContext;
use fx_dashboard::baseline::Baseline;
use fx_dashboard::cache::storage::FileStore;
use fx_dashboard::config::{Settings, SystemClock};
use fx_dashboard::routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let settings = Settings::from_env();
    let port = settings.port;
    info!("Using PORT: {}", port);

    let baseline = Baseline::bundled()?;
    info!("Baseline loaded (reviewed {})", baseline.reviewed);

    let storage = Arc::new(FileStore::open(&settings.storage_path));
    let ctx = match AppContext::build(settings, baseline, storage, Arc::new(SystemClock)) {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            error!("Failed to build HTTP clients: {}", e);
            return Err(e.into());
        }
    };

    // First cycle and session briefs run while the server is already answering with baseline data.
    ctx.spawn_fetch();
    ctx.spawn_session_briefs();

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!("Will bind to: {}", addr);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"]);

    let api = routes::routes(ctx).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
    Ok(())
}
