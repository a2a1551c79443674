// src/cache/inflight.rs
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::SourceError;

type SharedCall<T> = Shared<BoxFuture<'static, Result<T, Arc<SourceError>>>>;

/// Builds the identity of an external call: entity, hashed inputs, refresh tick.
pub fn request_signature(entity: &str, input: &str, tick: u64) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hash = hex::encode(digest);
    format!("{}::{}::{}", entity, &hash[..16], tick)
}

/// At most one outstanding call per signature; concurrent callers share its result.
pub struct InFlight<T: Clone> {
    calls: Mutex<HashMap<String, (u64, SharedCall<T>)>>,
    next_id: AtomicU64,
    launched: AtomicU64,
}

impl<T: Clone> Default for InFlight<T> {
    fn default() -> Self {
        InFlight {
            calls: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            launched: AtomicU64::new(0),
        }
    }
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.calls.lock().contains_key(signature)
    }

    /// Number of calls actually started since creation.
    pub fn launched(&self) -> u64 {
        self.launched.load(Ordering::SeqCst)
    }

    /// Joins the outstanding call for `signature`, or starts one with `make`.
    pub async fn run<F, Fut>(&self, signature: &str, make: F) -> Result<T, Arc<SourceError>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SourceError>> + Send + 'static,
    {
        let (id, call) = {
            let mut calls = self.calls.lock();
            match calls.get(signature) {
                Some((id, call)) => (*id, call.clone()),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                    self.launched.fetch_add(1, Ordering::SeqCst);
                    let fut = make();
                    let call = async move { fut.await.map_err(Arc::new) }.boxed().shared();
                    calls.insert(signature.to_string(), (id, call.clone()));
                    (id, call)
                }
            }
        };

        let result = call.await;

        // Whoever finishes first clears the slot, unless a newer call already took it.
        let mut calls = self.calls.lock();
        if calls.get(signature).map(|(current, _)| *current == id).unwrap_or(false) {
            calls.remove(signature);
        }
        result
    }
}
