pub mod discord;
#[cfg(test)]
pub mod fake;

use anyhow::Result;
use async_trait::async_trait;

/// Discord epoch (2015-01-01T00:00:00Z) in Unix milliseconds
const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

/// Creation time in Unix milliseconds encoded in a Discord snowflake id.
pub fn snowflake_timestamp(id: u64) -> i64 {
    (id >> 22) as i64 + DISCORD_EPOCH_MS
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Platform-agnostic rich content block, used both for messages read from
/// the channel and for messages the relay composes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub colour: Option<u32>,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
    /// Stamp the embed with the send time
    pub timestamped: bool,
}

impl Embed {
    pub fn field(&self, name: &str) -> Option<&EmbedField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A message read from the channel
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub id: u64,
    pub channel_id: u64,
    pub author_id: u64,
    pub author_is_bot: bool,
    /// Display name of the author, falling back to the username
    pub author_name: String,
    pub content: String,
    pub embeds: Vec<Embed>,
    /// Id of the message this one replies to
    pub reply_to: Option<u64>,
    /// Unix milliseconds
    pub created_at: i64,
}

/// What the platform assigned to a message the relay just sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub id: u64,
    pub created_at: i64,
}

impl SentMessage {
    pub fn from_id(id: u64) -> Self {
        Self {
            id,
            created_at: snowflake_timestamp(id),
        }
    }
}

/// The one channel the relay is bound to.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// User id of the relay's own bot account
    fn bot_id(&self) -> u64;

    /// Most recent messages, newest first, at most `limit` (≤ 100).
    async fn fetch(&self, limit: u8) -> Result<Vec<ChannelMessage>>;

    async fn send_embed(&self, embed: &Embed) -> Result<SentMessage>;

    async fn send_text(&self, content: &str) -> Result<SentMessage>;

    /// Delete the given messages in one call. All must be younger than 14 days.
    async fn bulk_delete(&self, ids: &[u64]) -> Result<()>;
}
