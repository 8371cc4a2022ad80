use std::sync::Arc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use crate::{AppState, ads};

/// Job scheduler for background tasks
pub struct JobScheduler {
    state: AppState,
}

impl JobScheduler {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::ad_expiry_job(Arc::clone(&self)));
        tokio::spawn(Self::expired_session_cleanup_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Expire ads past their end date (every `AD_SWEEP_INTERVAL_SECS`)
    async fn ad_expiry_job(scheduler: Arc<Self>) {
        let mut ticker = interval(scheduler.state.config.ad_sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match ads::sweep(&scheduler.state.repo, &scheduler.state.audit).await {
                Ok(count) if count > 0 => info!("Ad sweep expired {} ads", count),
                Ok(_) => {}
                Err(e) => error!("Ad sweep failed: {}", e),
            }
        }
    }

    /// Drop sessions past their TTL (every `SESSION_SWEEP_INTERVAL_SECS`)
    async fn expired_session_cleanup_job(scheduler: Arc<Self>) {
        let mut ticker = interval(scheduler.state.config.session_sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let purged = scheduler.state.sessions.purge_expired().await;
            if purged > 0 {
                info!("Cleaned up {} expired sessions", purged);
            }
        }
    }
}
