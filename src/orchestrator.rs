// src/orchestrator.rs
use futures::future::join_all;
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::error::SourceError;
use crate::models::{DataDomain, FreshnessTag};
use crate::services::SourceClient;
use crate::store::LiveStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ClientOutcome {
    Applied {
        tag: FreshnessTag,
        domains: Vec<DataDomain>,
        errors: usize,
    },
    Failed {
        reason: String,
    },
    /// Missing credential; not an error.
    Skipped {
        credential: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientReport {
    pub client: &'static str,
    pub domain: DataDomain,
    #[serde(flatten)]
    pub outcome: ClientOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub clients: Vec<ClientReport>,
}

impl CycleReport {
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, ClientOutcome::Applied { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ClientOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ClientOutcome::Skipped { .. }))
    }

    fn count(&self, f: impl Fn(&ClientOutcome) -> bool) -> usize {
        self.clients.iter().filter(|c| f(&c.outcome)).count()
    }
}

/// Fans one fetch cycle out over every eligible client and applies what comes back.
pub struct FetchOrchestrator {
    clients: Vec<Arc<dyn SourceClient>>,
    settings: Arc<Settings>,
    store: Arc<LiveStore>,
}

impl FetchOrchestrator {
    pub fn new(
        clients: Vec<Arc<dyn SourceClient>>,
        settings: Arc<Settings>,
        store: Arc<LiveStore>,
    ) -> Self {
        FetchOrchestrator {
            clients,
            settings,
            store,
        }
    }

    pub fn store(&self) -> &Arc<LiveStore> {
        &self.store
    }

    async fn run_client(&self, client: Arc<dyn SourceClient>, deadline: Duration) -> ClientReport {
        let name = client.name();
        let domain = client.domain();

        if let Some(credential) = client.credential() {
            if !self.settings.has(credential) {
                info!("[Fetch] {} skipped: {} not set", name, credential.env_var());
                return ClientReport {
                    client: name,
                    domain,
                    outcome: ClientOutcome::Skipped {
                        credential: credential.env_var(),
                    },
                };
            }
        }

        let result = match tokio::time::timeout(deadline, client.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(deadline.as_secs())),
        };

        let outcome = match result {
            Ok(patch) => {
                let tag = patch.earned_tag();
                let domains = patch.domains();
                let errors = patch.errors.len();
                if errors > 0 {
                    warn!("[Fetch] {} partial: {:?}", name, patch.errors);
                }
                self.store.apply_patch(domain, patch, tag);
                info!("[Fetch] {} applied ({})", name, tag);
                ClientOutcome::Applied {
                    tag,
                    domains,
                    errors,
                }
            }
            Err(e) => {
                error!("[Fetch] {} failed: {}", name, e);
                ClientOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        ClientReport {
            client: name,
            domain,
            outcome,
        }
    }

    /// One cycle: every eligible client concurrently, each bounded by the client deadline.
    ///
    /// Patches are applied as each client settles; a failure leaves its domain's
    /// tag and values untouched. Never retries and never fails as a whole.
    pub async fn fetch_all(&self) -> CycleReport {
        self.store.begin_cycle();
        let deadline = self.settings.client_deadline;

        let runs = self
            .clients
            .iter()
            .cloned()
            .map(|client| self.run_client(client, deadline));
        let report = CycleReport {
            clients: join_all(runs).await,
        };

        self.store.finish_cycle();
        info!(
            "[Fetch] cycle done: {} applied, {} failed, {} skipped",
            report.applied(),
            report.failed(),
            report.skipped()
        );
        report
    }
}
