//! Background recheck loop.
//!
//! A single tokio task that wakes on a fixed interval or a cron cadence and
//! runs one engine recheck per wakeup. Shutdown is cooperative through a
//! [`CancellationToken`]; a failed recheck is logged and retried on the
//! next wakeup.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule as CronSchedule;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::SchedulerEngine;

enum Cadence {
    Interval(Duration),
    Cron(Box<CronSchedule>),
}

fn cadence_from(cron_expr: Option<&str>, interval_secs: u64) -> Cadence {
    let fallback = Duration::from_secs(interval_secs.max(1));
    match cron_expr {
        Some(expr) => match CronSchedule::from_str(expr) {
            Ok(schedule) => Cadence::Cron(Box::new(schedule)),
            Err(e) => {
                warn!(
                    "Invalid recheck cron expression '{}', falling back to {}s interval: {}",
                    expr, interval_secs, e
                );
                Cadence::Interval(fallback)
            }
        },
        None => Cadence::Interval(fallback),
    }
}

/// Periodic driver for [`SchedulerEngine::recheck`].
pub struct RecheckService {
    engine: Arc<SchedulerEngine>,
    cadence: Cadence,
    shutdown: CancellationToken,
}

impl RecheckService {
    pub fn new(engine: Arc<SchedulerEngine>, shutdown: CancellationToken) -> Self {
        let settings = engine.settings();
        let cadence = cadence_from(
            settings.recheck_cron.as_deref(),
            settings.recheck_interval_secs,
        );
        Self { engine, cadence, shutdown }
    }

    /// Spawns the service onto the current runtime.
    pub fn spawn(engine: Arc<SchedulerEngine>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Self::new(engine, shutdown).run())
    }

    pub async fn run(self) {
        info!("recording recheck service started");
        loop {
            let delay = self.next_delay();
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("recording recheck service stopping");
                    break;
                }
                _ = tokio::time::sleep(delay) => {
                    if let Err(e) = self.engine.recheck(Utc::now()).await {
                        warn!("Scheduled recheck failed: {}", e);
                    }
                }
            }
        }
    }

    fn next_delay(&self) -> Duration {
        match &self.cadence {
            Cadence::Interval(interval) => *interval,
            Cadence::Cron(schedule) => schedule
                .upcoming(Utc)
                .next()
                .and_then(|next| (next - Utc::now()).to_std().ok())
                // A cron schedule with no upcoming fire date means it lies
                // entirely in the past; poll slowly rather than spin.
                .unwrap_or(Duration::from_secs(60)),
        }
    }
}
