//! Trigger host
//!
//! Waits for the next cron occurrence (UTC), performs one run, repeats. A run
//! in progress is never interrupted; shutdown is observed between runs.

use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tracing::{error, info, warn};

use crate::error::IngestError;
use crate::ingest::IngestService;

/// Parse a cron expression, accepting 5-field standard cron as well
pub fn parse_schedule(cron_expr: &str) -> crate::Result<Schedule> {
    let expr = normalize_cron_expr(cron_expr);
    Schedule::from_str(&expr)
        .map_err(|e| IngestError::config(format!("Invalid cron expression '{cron_expr}': {e}")))
}

/// Normalise a cron expression to 6-field format.
///
/// The `cron` crate expects 6 fields (sec min hr dom month dow). An expression
/// with exactly 5 fields gets "0 " prepended to pin the seconds to zero.
fn normalize_cron_expr(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Next occurrence strictly after `after`
#[must_use]
pub fn next_run_after(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

/// Run `service` on its configured schedule until `shutdown` resolves
pub async fn run_scheduler<F>(service: &IngestService, shutdown: F) -> crate::Result<()>
where
    F: Future<Output = ()>,
{
    let schedule = parse_schedule(&service.config().schedule.cron)?;
    tokio::pin!(shutdown);

    info!(cron = %service.config().schedule.cron, "Scheduler started");

    if service.config().schedule.run_on_start {
        run_logged(service).await;
    }

    loop {
        let now = Utc::now();
        let Some(next) = next_run_after(&schedule, now) else {
            warn!("Schedule has no further occurrences, stopping");
            return Ok(());
        };
        let wait = (next - now).to_std().unwrap_or_default();
        info!("Next run at {}", next.to_rfc3339());

        tokio::select! {
            () = tokio::time::sleep(wait) => run_logged(service).await,
            () = &mut shutdown => {
                info!("Shutdown signal received, exiting");
                return Ok(());
            }
        }
    }
}

async fn run_logged(service: &IngestService) {
    if let Err(e) = service.run_once().await {
        error!(stage = %e.stage(), "Run aborted: {}", e);
    }
}
