// src/bin/fetch_once.rs
//
// Runs a single fetch cycle against the real sources and prints what came back.
use dotenv::dotenv;
use std::sync::Arc;

use fx_dashboard::baseline::Baseline;
use fx_dashboard::cache::storage::MemoryStore;
use fx_dashboard::config::{Settings, SystemClock};
use fx_dashboard::merge::dashboard::domain_status;
use fx_dashboard::merge::yields::yields_view;
use fx_dashboard::orchestrator::{ClientOutcome, FetchOrchestrator};
use fx_dashboard::services::default_clients;
use fx_dashboard::store::LiveStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let settings = Arc::new(Settings::from_env());
    let baseline = Baseline::bundled()?;
    let store = Arc::new(LiveStore::new(Arc::new(SystemClock), Arc::new(MemoryStore::new())));
    let orchestrator = FetchOrchestrator::new(default_clients(&settings)?, settings.clone(), store.clone());

    let report = orchestrator.fetch_all().await;
    for client in &report.clients {
        match &client.outcome {
            ClientOutcome::Applied { tag, domains, errors } => {
                println!("{:<16} {:<12} {:?} ({} sub-source errors)", client.client, tag, domains, errors)
            }
            ClientOutcome::Failed { reason } => println!("{:<16} failed       {}", client.client, reason),
            ClientOutcome::Skipped { credential } => {
                println!("{:<16} skipped      {} not set", client.client, credential)
            }
        }
    }

    let state = store.snapshot();
    println!("\nDomain status: {}", serde_json::to_string_pretty(&domain_status(&state))?);
    println!("Yields: {}", serde_json::to_string_pretty(&yields_view(&baseline, &state))?);
    Ok(())
}
