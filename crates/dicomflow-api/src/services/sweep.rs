//! Removal of abandoned chunk sessions.
//!
//! A session that received no chunk for [`CHUNK_SESSION_IDLE_SECS`] is dropped
//! along with its staged chunks. Retried files arrive under a new file id, so
//! their old session is only ever reclaimed here.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dicomflow_core::constants::{CHUNK_SESSION_IDLE_SECS, CHUNK_SWEEP_INTERVAL_SECS};
use dicomflow_core::AppError;
use dicomflow_db::ChunkSessionRepository;
use dicomflow_storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Delete sessions idle since `idle_since` together with their staged chunks.
/// Returns the number of sessions removed.
#[tracing::instrument(skip(sessions, storage), fields(sweep.operation = "chunk_sessions"))]
pub async fn sweep_stale_chunks(
    sessions: &dyn ChunkSessionRepository,
    storage: &dyn Storage,
    idle_since: DateTime<Utc>,
) -> Result<usize, AppError> {
    let stale = sessions.take_stale(idle_since).await?;

    for session in &stale {
        tracing::info!(
            file_id = %session.file_id,
            order_id = %session.order_id,
            received_chunks = session.received_chunks,
            total_chunks = session.total_chunks,
            last_activity = %session.updated_at,
            "Discarding abandoned upload"
        );
        // Keys past `received_chunks` may hold a chunk whose count was never recorded
        for key in session.chunk_keys() {
            if let Err(e) = storage.delete(&key).await {
                tracing::warn!(key = %key, error = %e, "Failed to delete staged chunk");
            }
        }
    }

    Ok(stale.len())
}

/// Background task running [`sweep_stale_chunks`] on a fixed period
#[derive(Clone)]
pub struct ChunkSweeper {
    sessions: Arc<dyn ChunkSessionRepository>,
    storage: Arc<dyn Storage>,
    idle_for: ChronoDuration,
    period: Duration,
}

impl ChunkSweeper {
    pub fn new(sessions: Arc<dyn ChunkSessionRepository>, storage: Arc<dyn Storage>) -> Self {
        Self {
            sessions,
            storage,
            idle_for: ChronoDuration::seconds(CHUNK_SESSION_IDLE_SECS),
            period: Duration::from_secs(CHUNK_SWEEP_INTERVAL_SECS),
        }
    }

    /// Sweep immediately, then once per period, until the runtime shuts down.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.run_once(Utc::now()).await;
            }
        })
    }

    async fn run_once(&self, now: DateTime<Utc>) -> usize {
        match sweep_stale_chunks(
            self.sessions.as_ref(),
            self.storage.as_ref(),
            now - self.idle_for,
        )
        .await
        {
            Ok(0) => 0,
            Ok(removed) => {
                tracing::info!(removed, "Abandoned chunk sessions swept");
                removed
            }
            Err(e) => {
                tracing::error!(error = %e, "Chunk session sweep failed");
                0
            }
        }
    }
}
