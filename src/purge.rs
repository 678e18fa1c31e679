//! `!purge` confirmation flow and the batched channel wipe behind it.
//!
//! The flow is a pure state machine ([`step`]) driven by whatever transport
//! delivers commands and button presses; see `commands::run_purge`.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::platform::ChatChannel;

pub const CONFIRM_ID: &str = "purge_confirm";
pub const CANCEL_ID: &str = "purge_cancel";

/// Messages fetched per purge batch (the platform's page size)
const BATCH_SIZE: u8 = 100;
/// Bulk deletion only accepts messages younger than this
const MAX_BULK_DELETE_AGE_DAYS: i64 = 14;
/// Headroom so a message does not age past the limit between fetch and delete
const BULK_DELETE_MARGIN_SECS: i64 = 60;

/// Which confirmation button was pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Confirm,
    Cancel,
}

impl Choice {
    pub fn from_custom_id(id: &str) -> Option<Self> {
        match id {
            CONFIRM_ID => Some(Choice::Confirm),
            CANCEL_ID => Some(Choice::Cancel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeState {
    Idle,
    AwaitingConfirmation { invoker: u64 },
    Purging { invoker: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeEvent {
    /// `!purge` was sent by `user`
    Invoked { user: u64, privileged: bool },
    Pressed { user: u64, choice: Choice },
    TimedOut,
    Completed { deleted: usize },
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeAction {
    /// Nothing to do; keep waiting if the state says so
    Ignore,
    Deny,
    Prompt,
    Cancel,
    CancelTimedOut,
    Start,
    Report { deleted: usize },
    ReportFailure,
}

/// Advance the purge flow by one event.
pub fn step(state: PurgeState, event: PurgeEvent) -> (PurgeAction, PurgeState) {
    use PurgeAction as A;
    use PurgeEvent as E;
    use PurgeState as S;

    match (state, event) {
        (S::Idle, E::Invoked { privileged: false, .. }) => (A::Deny, S::Idle),
        (S::Idle, E::Invoked { user, .. }) => (A::Prompt, S::AwaitingConfirmation { invoker: user }),

        (S::AwaitingConfirmation { invoker }, E::Pressed { user, .. }) if user != invoker => {
            (A::Ignore, state)
        }
        (S::AwaitingConfirmation { .. }, E::Pressed { choice: Choice::Cancel, .. }) => {
            (A::Cancel, S::Idle)
        }
        (S::AwaitingConfirmation { invoker }, E::Pressed { choice: Choice::Confirm, .. }) => {
            (A::Start, S::Purging { invoker })
        }
        (S::AwaitingConfirmation { .. }, E::TimedOut) => (A::CancelTimedOut, S::Idle),

        (S::Purging { .. }, E::Completed { deleted }) => (A::Report { deleted }, S::Idle),

        (S::Idle, E::Failed) => (A::Ignore, S::Idle),
        (_, E::Failed) => (A::ReportFailure, S::Idle),

        (state, _) => (A::Ignore, state),
    }
}

/// Delete everything in the channel that bulk deletion can reach.
///
/// Fetches batches of up to 100 messages and deletes the ones younger than
/// 14 days, sleeping `pace` between batches. Stops when a fetch comes back
/// empty or a batch has nothing young enough to delete. Returns the number
/// of messages deleted.
pub async fn purge_channel(channel: &dyn ChatChannel, pace: Duration) -> Result<usize> {
    let max_age = (chrono::Duration::days(MAX_BULK_DELETE_AGE_DAYS)
        - chrono::Duration::seconds(BULK_DELETE_MARGIN_SECS))
    .num_milliseconds();
    let mut deleted = 0;

    loop {
        let batch = channel
            .fetch(BATCH_SIZE)
            .await
            .context("Failed to fetch messages to purge")?;
        if batch.is_empty() {
            break;
        }

        let now = chrono::Utc::now().timestamp_millis();
        let deletable: Vec<u64> = batch
            .iter()
            .filter(|m| now - m.created_at < max_age)
            .map(|m| m.id)
            .collect();
        if deletable.is_empty() {
            debug!(
                "Purge stopped: {} remaining message(s) are too old for bulk deletion",
                batch.len()
            );
            break;
        }

        channel
            .bulk_delete(&deletable)
            .await
            .with_context(|| format!("Failed to bulk delete {} messages", deletable.len()))?;
        deleted += deletable.len();
        debug!("Purged batch of {} (total {})", deletable.len(), deleted);

        tokio::time::sleep(pace).await;
    }

    info!("Purge finished: {} message(s) deleted", deleted);
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::{user_message, FakeChannel};
    use std::sync::atomic::Ordering;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    /// `young` messages from the last day and `old` ones from three weeks ago
    fn channel_with(young: u64, old: u64) -> FakeChannel {
        let now = chrono::Utc::now().timestamp_millis();
        let mut messages = Vec::new();
        for i in 0..young {
            messages.push(user_message(10_000 + i, 77, now - DAY_MS + i as i64));
        }
        for i in 0..old {
            messages.push(user_message(20_000 + i, 77, now - 21 * DAY_MS + i as i64));
        }
        FakeChannel::with_messages(messages)
    }

    #[test]
    fn test_non_privileged_invocation_is_denied() {
        let (action, next) = step(
            PurgeState::Idle,
            PurgeEvent::Invoked {
                user: 5,
                privileged: false,
            },
        );
        assert_eq!(action, PurgeAction::Deny);
        assert_eq!(next, PurgeState::Idle);
    }

    #[test]
    fn test_confirmation_flow() {
        let (action, state) = step(
            PurgeState::Idle,
            PurgeEvent::Invoked {
                user: 5,
                privileged: true,
            },
        );
        assert_eq!(action, PurgeAction::Prompt);
        assert_eq!(state, PurgeState::AwaitingConfirmation { invoker: 5 });

        let (action, state) = step(
            state,
            PurgeEvent::Pressed {
                user: 5,
                choice: Choice::Confirm,
            },
        );
        assert_eq!(action, PurgeAction::Start);
        assert_eq!(state, PurgeState::Purging { invoker: 5 });

        let (action, state) = step(state, PurgeEvent::Completed { deleted: 12 });
        assert_eq!(action, PurgeAction::Report { deleted: 12 });
        assert_eq!(state, PurgeState::Idle);
    }

    #[test]
    fn test_presses_from_other_users_are_ignored() {
        let awaiting = PurgeState::AwaitingConfirmation { invoker: 5 };
        for choice in [Choice::Confirm, Choice::Cancel] {
            let (action, state) = step(awaiting, PurgeEvent::Pressed { user: 6, choice });
            assert_eq!(action, PurgeAction::Ignore);
            assert_eq!(state, awaiting);
        }
    }

    #[test]
    fn test_cancel_and_timeout_return_to_idle() {
        let awaiting = PurgeState::AwaitingConfirmation { invoker: 5 };
        assert_eq!(
            step(
                awaiting,
                PurgeEvent::Pressed {
                    user: 5,
                    choice: Choice::Cancel
                }
            ),
            (PurgeAction::Cancel, PurgeState::Idle)
        );
        assert_eq!(
            step(awaiting, PurgeEvent::TimedOut),
            (PurgeAction::CancelTimedOut, PurgeState::Idle)
        );
    }

    #[test]
    fn test_failure_reports_once() {
        assert_eq!(
            step(PurgeState::Purging { invoker: 5 }, PurgeEvent::Failed),
            (PurgeAction::ReportFailure, PurgeState::Idle)
        );
        assert_eq!(
            step(PurgeState::Idle, PurgeEvent::Failed),
            (PurgeAction::Ignore, PurgeState::Idle)
        );
    }

    #[test]
    fn test_stray_events_leave_state_alone() {
        assert_eq!(
            step(PurgeState::Idle, PurgeEvent::TimedOut),
            (PurgeAction::Ignore, PurgeState::Idle)
        );
        let purging = PurgeState::Purging { invoker: 5 };
        assert_eq!(
            step(
                purging,
                PurgeEvent::Pressed {
                    user: 5,
                    choice: Choice::Cancel
                }
            ),
            (PurgeAction::Ignore, purging)
        );
    }

    #[test]
    fn test_custom_ids() {
        assert_eq!(Choice::from_custom_id("purge_confirm"), Some(Choice::Confirm));
        assert_eq!(Choice::from_custom_id("purge_cancel"), Some(Choice::Cancel));
        assert_eq!(Choice::from_custom_id("other"), None);
    }

    #[tokio::test]
    async fn test_purge_deletes_only_young_messages() {
        let channel = channel_with(120, 30);

        let deleted = purge_channel(&channel, Duration::ZERO).await.unwrap();

        assert_eq!(deleted, 120);
        assert_eq!(channel.deleted_count(), 120);
        assert_eq!(channel.remaining(), 30);
    }

    #[tokio::test]
    async fn test_purge_skips_messages_at_the_age_limit() {
        let now = chrono::Utc::now().timestamp_millis();
        let channel = FakeChannel::with_messages(vec![
            user_message(1, 77, now - DAY_MS),
            user_message(2, 77, now - 14 * DAY_MS + 30_000),
        ]);

        let deleted = purge_channel(&channel, Duration::ZERO).await.unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(*channel.deleted.lock().unwrap(), vec![1]);
        assert_eq!(channel.remaining(), 1);
    }

    #[tokio::test]
    async fn test_purge_empty_channel() {
        let channel = FakeChannel::new();
        assert_eq!(purge_channel(&channel, Duration::ZERO).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_stops_on_delete_failure() {
        let channel = channel_with(10, 0);
        channel.fail_delete.store(true, Ordering::SeqCst);

        assert!(purge_channel(&channel, Duration::ZERO).await.is_err());
        assert_eq!(channel.remaining(), 10);
    }
}
