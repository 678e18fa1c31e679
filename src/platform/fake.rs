//! In-memory `ChatChannel` used by unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{ChannelMessage, ChatChannel, Embed, SentMessage, DISCORD_EPOCH_MS};

pub const BOT_ID: u64 = 1;
pub const CHANNEL_ID: u64 = 500;

pub struct FakeChannel {
    bot_id: u64,
    messages: Mutex<Vec<ChannelMessage>>,
    sequence: AtomicU64,
    pub sent_embeds: Mutex<Vec<Embed>>,
    pub sent_texts: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<u64>>,
    pub fail_fetch: AtomicBool,
    pub fail_send: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self::with_messages(Vec::new())
    }

    pub fn with_messages(messages: Vec<ChannelMessage>) -> Self {
        Self {
            bot_id: BOT_ID,
            messages: Mutex::new(messages),
            sequence: AtomicU64::new(0),
            sent_embeds: Mutex::new(Vec::new()),
            sent_texts: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            fail_fetch: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    pub fn remaining(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.lock().unwrap().len()
    }

    fn next_id(&self) -> u64 {
        let now = chrono::Utc::now().timestamp_millis() - DISCORD_EPOCH_MS;
        ((now as u64) << 22) | (self.sequence.fetch_add(1, Ordering::SeqCst) & 0x3f_ffff)
    }

    fn store_sent(&self, content: &str, embeds: Vec<Embed>) -> SentMessage {
        let sent = SentMessage::from_id(self.next_id());
        self.messages.lock().unwrap().push(ChannelMessage {
            id: sent.id,
            channel_id: CHANNEL_ID,
            author_id: self.bot_id,
            author_is_bot: true,
            author_name: "relay".to_string(),
            content: content.to_string(),
            embeds,
            reply_to: None,
            created_at: sent.created_at,
        });
        sent
    }
}

#[async_trait]
impl ChatChannel for FakeChannel {
    fn bot_id(&self) -> u64 {
        self.bot_id
    }

    async fn fetch(&self, limit: u8) -> Result<Vec<ChannelMessage>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            anyhow::bail!("fetch rejected");
        }
        let mut messages = self.messages.lock().unwrap().clone();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages.truncate(limit as usize);
        Ok(messages)
    }

    async fn send_embed(&self, embed: &Embed) -> Result<SentMessage> {
        if self.fail_send.load(Ordering::SeqCst) {
            anyhow::bail!("send rejected");
        }
        self.sent_embeds.lock().unwrap().push(embed.clone());
        Ok(self.store_sent("", vec![embed.clone()]))
    }

    async fn send_text(&self, content: &str) -> Result<SentMessage> {
        if self.fail_send.load(Ordering::SeqCst) {
            anyhow::bail!("send rejected");
        }
        self.sent_texts.lock().unwrap().push(content.to_string());
        Ok(self.store_sent(content, Vec::new()))
    }

    async fn bulk_delete(&self, ids: &[u64]) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            anyhow::bail!("bulk delete rejected");
        }
        self.messages.lock().unwrap().retain(|m| !ids.contains(&m.id));
        self.deleted.lock().unwrap().extend_from_slice(ids);
        Ok(())
    }
}

/// A plain text message from a guest.
pub fn user_message(id: u64, author_id: u64, created_at: i64) -> ChannelMessage {
    ChannelMessage {
        id,
        channel_id: CHANNEL_ID,
        author_id,
        author_is_bot: false,
        author_name: format!("guest-{author_id}"),
        content: format!("message {id}"),
        embeds: Vec::new(),
        reply_to: None,
        created_at,
    }
}
