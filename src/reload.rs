//! Periodic reloading of the route rules file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::ratelimit::{RouteRules, SharedRules};

/// Reload the rules file once, swapping the table in if it changed.
///
/// Returns whether the table was replaced. On error the current table is
/// left in place.
pub async fn reload_rules(path: &Path, rules: &SharedRules) -> Result<bool> {
    let contents = tokio::fs::read_to_string(path).await?;
    let fresh = RouteRules::from_yaml(&contents)?;

    let mut current = rules.write();
    if *current == fresh {
        return Ok(false);
    }
    *current = fresh;
    Ok(true)
}

/// Spawn a task that reloads the rules file every `interval`.
///
/// The first reload happens one interval after spawning, since the caller
/// has already loaded the file at startup.
pub fn spawn_rules_reload(path: PathBuf, interval: Duration, rules: SharedRules) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match reload_rules(&path, &rules).await {
                Ok(true) => info!(path = %path.display(), "Route rules reloaded"),
                Ok(false) => debug!(path = %path.display(), "Route rules unchanged"),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to reload route rules, keeping previous table"
                ),
            }
        }
    })
}
