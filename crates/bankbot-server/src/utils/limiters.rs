use anyhow::{anyhow, Result};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::LimitsConfig;

/// Concurrency caps on outbound provider calls, shared by every session.
#[derive(Clone)]
pub struct Limiters {
    pub embedding: Arc<Semaphore>,
    pub generation: Arc<Semaphore>,
    pub acquire_timeout: Duration,
}

impl Limiters {
    pub fn new(cfg: &LimitsConfig) -> Self {
        Self {
            embedding: Arc::new(Semaphore::new(cfg.embedding_concurrency.max(1))),
            generation: Arc::new(Semaphore::new(cfg.generation_concurrency.max(1))),
            acquire_timeout: Duration::from_millis(cfg.acquire_timeout_ms.max(1)),
        }
    }

    /// Permit for one generation call, plus how long the caller queued.
    pub async fn generation_permit(&self) -> Result<(OwnedSemaphorePermit, Duration)> {
        Self::acquire_timed(self.generation.clone(), self.acquire_timeout, "generation").await
    }

    /// Permit for one embedding call, plus how long the caller queued.
    pub async fn embedding_permit(&self) -> Result<(OwnedSemaphorePermit, Duration)> {
        Self::acquire_timed(self.embedding.clone(), self.acquire_timeout, "embedding").await
    }

    pub async fn acquire_timed(
        sem: Arc<Semaphore>,
        acquire_timeout: Duration,
        op: &'static str,
    ) -> Result<(OwnedSemaphorePermit, Duration)> {
        let queued_at = Instant::now();

        match tokio::time::timeout(acquire_timeout, sem.acquire_owned()).await {
            Ok(Ok(permit)) => Ok((permit, queued_at.elapsed())),
            Ok(Err(_closed)) => Err(anyhow!("{} limiter is closed", op)),
            Err(_elapsed) => Err(anyhow!(
                "{} limiter busy: no permit within {:?}",
                op,
                acquire_timeout
            )),
        }
    }
}
