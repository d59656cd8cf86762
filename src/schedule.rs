use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::config::{Config, RepoContext};
use crate::pipeline::{self, Trigger};
use crate::zotero::EntrySource;

/// Daily firing hour, matching the original `0 8 * * *` schedule.
pub const FIRE_HOUR_UTC: u32 = 8;

/// Next 08:00:00 UTC instant strictly after `after`.
pub fn next_fire(after: DateTime<Utc>) -> DateTime<Utc> {
    let today = after
        .date_naive()
        .and_hms_opt(FIRE_HOUR_UTC, 0, 0)
        .unwrap()
        .and_utc();
    if today > after {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

/// Stay resident and run the pipeline once per scheduled firing.
///
/// A failed run surfaces in the logs; the schedule itself survives, the same
/// way the hosting platform starts a fresh run on the next trigger. Missed
/// firings are not caught up.
pub async fn watch(
    config: &Config,
    context: &RepoContext,
    source: &mut dyn EntrySource,
    repo: &Path,
) -> Result<()> {
    tracing::info!(
        "watch mode: firing daily at {:02}:00 UTC",
        FIRE_HOUR_UTC
    );
    loop {
        let now = Utc::now();
        let fire = next_fire(now);
        let wait = (fire - now).to_std().unwrap_or(std::time::Duration::ZERO);
        tracing::info!(at = %fire, "sleeping until next scheduled run");
        tokio::time::sleep(wait).await;

        let trigger = Trigger::Schedule {
            fired_at: Utc::now(),
        };
        match pipeline::run_once(config, context, source, repo, trigger).await {
            Ok(outcome) => {
                tracing::info!(
                    entries = outcome.entries,
                    committed = outcome.committed,
                    "scheduled run finished"
                );
            }
            Err(e) => {
                tracing::error!("scheduled run failed: {:#}", e);
            }
        }
    }
}
