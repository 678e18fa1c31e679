//! Wishes poller.
//!
//! Polls `GET /wishes` on a running relay every 10 seconds, the same cadence
//! as the invitation page, and logs wishes and replies it has not seen
//! before. A failed poll is logged and simply retried on the next tick.
//!
//! Usage: `watch [BASE_URL]` (default `http://localhost:3001`).

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Wish {
    id: String,
    name: String,
    message: String,
    attendance: String,
    created_at: i64,
    #[serde(default)]
    replies: Vec<Reply>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reply {
    id: String,
    author: String,
    message: String,
    created_at: i64,
}

#[derive(Debug, Deserialize)]
struct WishList {
    #[serde(default)]
    wishes: Vec<Wish>,
}

async fn fetch_wishes(client: &reqwest::Client, url: &str) -> Result<Vec<Wish>> {
    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to reach relay")?
        .error_for_status()
        .context("Relay returned an error")?;
    let list: WishList = response.json().await.context("Invalid wish list")?;
    Ok(list.wishes)
}

/// Something that appeared since the previous poll
#[derive(Debug)]
enum Update {
    Wish(Wish),
    /// A reply posted on a wish that was already reported
    Reply { to: String, reply: Reply },
}

impl Update {
    fn created_at(&self) -> i64 {
        match self {
            Update::Wish(wish) => wish.created_at,
            Update::Reply { reply, .. } => reply.created_at,
        }
    }
}

/// Ids of the wishes and replies reported so far
#[derive(Debug, Default)]
struct Seen {
    wishes: HashSet<String>,
    replies: HashSet<String>,
}

impl Seen {
    /// New wishes, and new replies on known wishes, oldest first. Marks them
    /// as seen. A new wish carries its replies along with it.
    fn take_updates(&mut self, wishes: Vec<Wish>) -> Vec<Update> {
        let mut updates = Vec::new();
        for wish in wishes {
            if self.wishes.insert(wish.id.clone()) {
                self.replies
                    .extend(wish.replies.iter().map(|r| r.id.clone()));
                updates.push(Update::Wish(wish));
                continue;
            }
            for reply in wish.replies {
                if self.replies.insert(reply.id.clone()) {
                    updates.push(Update::Reply {
                        to: wish.name.clone(),
                        reply,
                    });
                }
            }
        }
        updates.sort_by_key(Update::created_at);
        updates
    }
}

fn format_time(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.with_timezone(&Local).format("%d %b %H:%M").to_string())
        .unwrap_or_default()
}

fn format_update(update: &Update) -> String {
    match update {
        Update::Wish(wish) => {
            let mut line = format!(
                "[{}] {} ({}): {}",
                format_time(wish.created_at),
                wish.name,
                wish.attendance,
                wish.message
            );
            for reply in &wish.replies {
                line.push_str(&format!("\n    ↳ {}: {}", reply.author, reply.message));
            }
            line
        }
        Update::Reply { to, reply } => format!(
            "[{}] ↳ {} replied to {}: {}",
            format_time(reply.created_at),
            reply.author,
            to,
            reply.message
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let base_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:3001".to_string());
    let url = format!("{}/wishes", base_url.trim_end_matches('/'));

    info!("Polling {} every {}s", url, POLL_INTERVAL.as_secs());

    let client = reqwest::Client::new();
    let mut seen = Seen::default();
    let mut ticker = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping poller");
                return Ok(());
            }
        }

        match fetch_wishes(&client, &url).await {
            Ok(wishes) => {
                for update in seen.take_updates(wishes) {
                    info!("{}", format_update(&update));
                }
            }
            Err(e) => warn!("Failed to fetch wishes: {:#}", e),
        }
    }
}
