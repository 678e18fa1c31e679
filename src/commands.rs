use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::platform::{ChannelMessage, ChatChannel, Embed, EmbedField};
use crate::purge::{self, Choice, PurgeAction, PurgeEvent, PurgeState};

const DENIED: &str = "❌ Kamu tidak punya izin untuk menghapus pesan!";
const CONFIRM_PROMPT: &str =
    "⚠️ **Yakin mau hapus SEMUA pesan di channel ini?**\nAksi ini tidak bisa dibatalkan!";
const CANCELLED: &str = "❌ Purge dibatalkan.";
const TIMED_OUT: &str = "❌ Purge dibatalkan (timeout).";
const PURGING: &str = "🗑️ Menghapus pesan...";
const FAILED: &str = "❌ Gagal menghapus pesan. Coba lagi nanti.";

const HELP_COLOUR: u32 = 0xC5A059;

/// Chat commands recognised in the wishes channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Purge,
    Help,
}

impl Command {
    /// Exact, case-insensitive match on the whole message text.
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_lowercase().as_str() {
            "!purge" => Some(Command::Purge),
            "!help" => Some(Command::Help),
            _ => None,
        }
    }
}

/// Settings the command handlers need from the config
#[derive(Debug, Clone)]
pub struct CommandSettings {
    pub channel_id: u64,
    pub confirm_timeout: Duration,
    pub pace: Duration,
    pub help_footer: String,
}

/// Everything a command handler can do in response to one triggering message.
#[async_trait]
pub trait CommandContext: Send + Sync {
    fn channel(&self) -> &dyn ChatChannel;

    /// Whether the author of the triggering message may manage messages here
    async fn is_privileged(&self) -> Result<bool>;

    async fn reply_text(&self, text: &str) -> Result<()>;

    async fn reply_embed(&self, embed: &Embed) -> Result<()>;

    /// Post the confirm/cancel prompt as a reply
    async fn prompt_confirmation(&mut self, text: &str) -> Result<()>;

    /// Next confirm/cancel press on the prompt as `(user id, choice)`,
    /// or `None` once `timeout` elapses.
    async fn next_choice(&mut self, timeout: Duration) -> Result<Option<(u64, Choice)>>;

    /// Replace the prompt text and remove its buttons
    async fn resolve_prompt(&mut self, text: &str) -> Result<()>;
}

pub fn help_embed(footer: &str) -> Embed {
    Embed {
        title: Some("📖 Bot Commands".to_string()),
        description: Some("Daftar perintah yang tersedia:".to_string()),
        colour: Some(HELP_COLOUR),
        fields: vec![
            EmbedField {
                name: "!purge".to_string(),
                value: "Hapus semua pesan di channel ini (perlu konfirmasi)".to_string(),
                inline: false,
            },
            EmbedField {
                name: "!help".to_string(),
                value: "Tampilkan daftar perintah ini".to_string(),
                inline: false,
            },
        ],
        footer: Some(footer.to_string()),
        timestamped: false,
    }
}

fn purge_summary(deleted: usize) -> String {
    format!("✅ Berhasil menghapus {deleted} pesan! Channel siap untuk undangan.")
}

/// Handle a message posted in the wishes channel.
pub async fn dispatch<C: CommandContext>(
    cx: &mut C,
    message: &ChannelMessage,
    settings: &CommandSettings,
) -> Result<()> {
    if message.author_is_bot || message.channel_id != settings.channel_id {
        return Ok(());
    }

    match Command::parse(&message.content) {
        Some(Command::Help) => {
            info!("!help from {} ({})", message.author_name, message.author_id);
            cx.reply_embed(&help_embed(&settings.help_footer)).await
        }
        Some(Command::Purge) => {
            info!("!purge from {} ({})", message.author_name, message.author_id);
            if let Err(e) = run_purge(cx, message.author_id, settings).await {
                error!("Purge error: {:#}", e);
                cx.reply_text(FAILED).await?;
            }
            Ok(())
        }
        None => Ok(()),
    }
}

/// Drive the purge state machine for one invocation by `invoker`.
pub async fn run_purge<C: CommandContext>(
    cx: &mut C,
    invoker: u64,
    settings: &CommandSettings,
) -> Result<()> {
    let mut state = PurgeState::Idle;
    let mut event = PurgeEvent::Invoked {
        user: invoker,
        privileged: cx.is_privileged().await?,
    };
    let mut deadline = Instant::now() + settings.confirm_timeout;

    loop {
        let (action, next) = purge::step(state, event);
        state = next;

        event = match action {
            PurgeAction::Deny => {
                info!("Purge denied for {}: missing Manage Messages", invoker);
                cx.reply_text(DENIED).await?;
                return Ok(());
            }
            PurgeAction::Prompt => {
                cx.prompt_confirmation(CONFIRM_PROMPT).await?;
                deadline = Instant::now() + settings.confirm_timeout;
                await_choice(cx, deadline).await?
            }
            PurgeAction::Ignore => match state {
                PurgeState::AwaitingConfirmation { .. } => {
                    warn!("Ignoring purge button press from someone other than {}", invoker);
                    await_choice(cx, deadline).await?
                }
                _ => return Ok(()),
            },
            PurgeAction::Cancel => {
                info!("Purge cancelled by {}", invoker);
                cx.resolve_prompt(CANCELLED).await?;
                return Ok(());
            }
            PurgeAction::CancelTimedOut => {
                info!("Purge confirmation timed out");
                cx.resolve_prompt(TIMED_OUT).await?;
                return Ok(());
            }
            PurgeAction::Start => {
                cx.resolve_prompt(PURGING).await?;
                match purge::purge_channel(cx.channel(), settings.pace).await {
                    Ok(deleted) => PurgeEvent::Completed { deleted },
                    Err(e) => {
                        error!("Purge error: {:#}", e);
                        PurgeEvent::Failed
                    }
                }
            }
            PurgeAction::Report { deleted } => {
                cx.channel().send_text(&purge_summary(deleted)).await?;
                return Ok(());
            }
            PurgeAction::ReportFailure => {
                // Reported here only; dispatch must not reply again
                if let Err(e) = cx.reply_text(FAILED).await {
                    error!("Failed to report purge failure: {:#}", e);
                }
                return Ok(());
            }
        };
    }
}

async fn await_choice<C: CommandContext>(cx: &mut C, deadline: Instant) -> Result<PurgeEvent> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Ok(PurgeEvent::TimedOut);
    }
    Ok(match cx.next_choice(remaining).await? {
        Some((user, choice)) => PurgeEvent::Pressed { user, choice },
        None => PurgeEvent::TimedOut,
    })
}
