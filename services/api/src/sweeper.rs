//! services/api/src/sweeper.rs
//!
//! Background task that deletes expired auth sessions on a fixed interval.

use chrono::Utc;
use clinic_core::ports::DatabaseService;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// `tokio::time::interval` panics on a zero period.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Runs one purge and logs the outcome. Failures are logged, not propagated,
/// so a transient database error does not stop the sweeper.
pub async fn sweep_once(db: &dyn DatabaseService) -> u64 {
    match db.purge_expired_sessions(Utc::now()).await {
        Ok(0) => {
            debug!("No expired sessions to purge");
            0
        }
        Ok(purged) => {
            info!("Purged {} expired auth sessions", purged);
            purged
        }
        Err(e) => {
            error!("Failed to purge expired sessions: {}", e);
            0
        }
    }
}

/// Spawns the sweeper loop. It exits when `shutdown` is cancelled.
pub fn spawn_session_sweeper(
    db: Arc<dyn DatabaseService>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    if every < MIN_SWEEP_INTERVAL {
        warn!("Session sweep interval {:?} is too short, using {:?}", every, MIN_SWEEP_INTERVAL);
    }
    let every = every.max(MIN_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Session sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    sweep_once(db.as_ref()).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryDb;
    use chrono::Duration as ChronoDuration;
    use clinic_core::domain::Principal;
    use uuid::Uuid;

    #[tokio::test]
    async fn sweeper_purges_and_stops_on_cancel() {
        let db: Arc<dyn DatabaseService> = Arc::new(MemoryDb::new());
        db.create_auth_session("stale", Principal::Admin, Utc::now() - ChronoDuration::minutes(1))
            .await
            .unwrap();
        db.create_auth_session(
            "fresh",
            Principal::Patient(Uuid::new_v4()),
            Utc::now() + ChronoDuration::days(1),
        )
        .await
        .unwrap();

        let shutdown = CancellationToken::new();
        let handle = spawn_session_sweeper(db.clone(), Duration::from_millis(10), shutdown.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(sweep_once(db.as_ref()).await, 0);
        assert!(db.validate_auth_session("fresh").await.is_ok());
    }

    #[tokio::test]
    async fn zero_interval_is_clamped_instead_of_panicking() {
        let db: Arc<dyn DatabaseService> = Arc::new(MemoryDb::new());
        let shutdown = CancellationToken::new();
        let handle = spawn_session_sweeper(db, Duration::ZERO, shutdown.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();
        handle.await.unwrap();
    }
}
