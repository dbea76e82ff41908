//! Background loop that keeps artifacts fresh without waiting for a request

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::service::MergeService;

pub struct MergeScheduler {
    service: Arc<MergeService>,
    service_delay: Duration,
    check_interval: Duration,
}

impl MergeScheduler {
    pub fn new(
        service: Arc<MergeService>,
        service_delay: Duration,
        check_interval: Duration,
    ) -> Self {
        Self {
            service,
            service_delay,
            check_interval: check_interval.max(Duration::from_secs(1)),
        }
    }

    /// Wait `service_delay`, then ask the freshness gate on every tick until cancelled
    pub async fn run(self, cancellation_token: CancellationToken) {
        info!(
            "Merge scheduler starting in {}, checking every {}",
            humantime::format_duration(self.service_delay),
            humantime::format_duration(self.check_interval)
        );

        tokio::select! {
            _ = sleep(self.service_delay) => {}
            _ = cancellation_token.cancelled() => {
                info!("Merge scheduler cancelled before start");
                return;
            }
        }

        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.service.ensure_fresh().await {
                        Ok(Some(report)) => debug!("Scheduled merge completed: {:?}", report),
                        Ok(None) => {}
                        Err(e) => error!("Scheduled merge failed: {}", e),
                    }
                }
                _ = cancellation_token.cancelled() => {
                    info!("Merge scheduler received cancellation signal, shutting down");
                    break;
                }
            }
        }
    }
}
