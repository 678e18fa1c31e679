use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::state::AppState;

/// Cron job that periodically checks the relay can still read its channel
pub struct Heartbeat {
    _scheduler: JobScheduler,
}

impl Heartbeat {
    pub async fn start(cron_expr: &str, state: Arc<AppState>) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;

        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let state = state.clone();
            Box::pin(async move {
                match check(&state).await {
                    Ok(status) => info!("Heartbeat: {}", status),
                    Err(e) => warn!("Heartbeat: {:#}", e),
                }
            })
        })
        .with_context(|| format!("Failed to create heartbeat job with cron: {cron_expr}"))?;

        scheduler
            .add(job)
            .await
            .context("Failed to add heartbeat job")?;
        scheduler
            .start()
            .await
            .context("Failed to start scheduler")?;

        info!("Heartbeat scheduled with cron: {}", cron_expr);
        Ok(Self {
            _scheduler: scheduler,
        })
    }
}

/// Probe the bound channel with a one-message fetch.
async fn check(state: &AppState) -> Result<String> {
    let Some(connection) = state.connection().await else {
        return Ok("relay alive, Discord channel not connected".to_string());
    };
    connection
        .channel
        .fetch(1)
        .await
        .with_context(|| format!("#{} is not readable", connection.channel_name))?;
    Ok(format!(
        "relay alive as {} on #{}",
        connection.bot_tag, connection.channel_name
    ))
}
