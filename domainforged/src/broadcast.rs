use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use crate::registry::Registry;

/// Periodically re-advertise every registered domain so advertisements follow
/// local address changes (e.g. a DHCP renewal).
///
/// A tick where the local address cannot be resolved is skipped; the next
/// tick tries again.
pub async fn run(registry: Arc<Registry>, period: Duration, cancel: CancellationToken) {
    tracing::info!("Broadcaster started, refreshing every {:?}", period);

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match registry.refresh().await {
                    Ok(report) => {
                        tracing::debug!(
                            "Refreshed {} advertisements ({} failed)",
                            report.refreshed,
                            report.failed
                        );
                    }
                    Err(e) => {
                        tracing::warn!("Skipping advertisement refresh: {}", e);
                    }
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Broadcaster shutting down");
                break;
            }
        }
    }
}
