use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use serenity::all::{
    ButtonStyle, Channel, ChannelId, Client, ComponentInteraction, Context, CreateActionRow,
    CreateButton, CreateEmbed, CreateEmbedFooter, CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateMessage, EditMessage, EventHandler, GatewayIntents,
    GetMessages, Http, Message, MessageId, MessageReference, Ready, Timestamp, UserId,
};
use serenity::async_trait;
use tracing::{debug, error, info, warn};

use super::{ChannelMessage, ChatChannel, Embed, EmbedField, SentMessage};
use crate::commands::{self, CommandContext};
use crate::purge::{Choice, CANCEL_ID, CONFIRM_ID};
use crate::state::{AppState, Connection};

/// The configured wishes channel, reached over Discord's REST API
pub struct DiscordChannel {
    http: Arc<Http>,
    channel_id: ChannelId,
    bot_id: UserId,
}

impl DiscordChannel {
    pub fn new(http: Arc<Http>, channel_id: ChannelId, bot_id: UserId) -> Self {
        Self {
            http,
            channel_id,
            bot_id,
        }
    }
}

#[async_trait]
impl ChatChannel for DiscordChannel {
    fn bot_id(&self) -> u64 {
        self.bot_id.get()
    }

    async fn fetch(&self, limit: u8) -> Result<Vec<ChannelMessage>> {
        let messages = self
            .channel_id
            .messages(&*self.http, GetMessages::new().limit(limit))
            .await
            .context("Failed to fetch channel messages")?;
        Ok(messages.iter().map(convert_message).collect())
    }

    async fn send_embed(&self, embed: &Embed) -> Result<SentMessage> {
        let sent = self
            .channel_id
            .send_message(&*self.http, CreateMessage::new().embed(build_embed(embed)))
            .await
            .context("Failed to send embed")?;
        Ok(SentMessage::from_id(sent.id.get()))
    }

    async fn send_text(&self, content: &str) -> Result<SentMessage> {
        let sent = self
            .channel_id
            .say(&*self.http, content)
            .await
            .context("Failed to send message")?;
        Ok(SentMessage::from_id(sent.id.get()))
    }

    async fn bulk_delete(&self, ids: &[u64]) -> Result<()> {
        let ids: Vec<MessageId> = ids.iter().map(|&id| MessageId::new(id)).collect();
        self.channel_id
            .delete_messages(&*self.http, &ids)
            .await
            .with_context(|| format!("Failed to bulk delete {} messages", ids.len()))
    }
}

fn convert_message(msg: &Message) -> ChannelMessage {
    ChannelMessage {
        id: msg.id.get(),
        channel_id: msg.channel_id.get(),
        author_id: msg.author.id.get(),
        author_is_bot: msg.author.bot,
        author_name: msg
            .author
            .global_name
            .clone()
            .unwrap_or_else(|| msg.author.name.clone()),
        content: msg.content.clone(),
        embeds: msg
            .embeds
            .iter()
            .map(|embed| Embed {
                title: embed.title.clone(),
                description: embed.description.clone(),
                colour: embed.colour.map(|c| c.0),
                fields: embed
                    .fields
                    .iter()
                    .map(|f| EmbedField {
                        name: f.name.clone(),
                        value: f.value.clone(),
                        inline: f.inline,
                    })
                    .collect(),
                footer: embed.footer.as_ref().map(|f| f.text.clone()),
                timestamped: embed.timestamp.is_some(),
            })
            .collect(),
        reply_to: msg
            .message_reference
            .as_ref()
            .and_then(|r| r.message_id)
            .map(|id| id.get()),
        created_at: super::snowflake_timestamp(msg.id.get()),
    }
}

fn build_embed(embed: &Embed) -> CreateEmbed {
    let mut builder = CreateEmbed::new().fields(
        embed
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.value.clone(), f.inline)),
    );
    if let Some(title) = &embed.title {
        builder = builder.title(title);
    }
    if let Some(description) = &embed.description {
        builder = builder.description(description);
    }
    if let Some(colour) = embed.colour {
        builder = builder.colour(colour);
    }
    if let Some(footer) = &embed.footer {
        builder = builder.footer(CreateEmbedFooter::new(footer));
    }
    if embed.timestamped {
        builder = builder.timestamp(Timestamp::now());
    }
    builder
}

/// Reply reference to `msg` that degrades to a plain message once `msg` is
/// gone, as the trigger is after a purge batch has run.
fn reply_reference(msg: &Message) -> MessageReference {
    MessageReference::from(msg).fail_if_not_exists(false)
}

/// One `!purge`/`!help` invocation on Discord
struct DiscordCommand<'a> {
    ctx: &'a Context,
    trigger: &'a Message,
    channel: Arc<dyn ChatChannel>,
    prompt: Option<Message>,
    /// Last button press, answered when the prompt is resolved
    pending: Option<ComponentInteraction>,
}

impl<'a> DiscordCommand<'a> {
    fn new(ctx: &'a Context, trigger: &'a Message, channel: Arc<dyn ChatChannel>) -> Self {
        Self {
            ctx,
            trigger,
            channel,
            prompt: None,
            pending: None,
        }
    }
}

#[async_trait]
impl<'a> CommandContext for DiscordCommand<'a> {
    fn channel(&self) -> &dyn ChatChannel {
        self.channel.as_ref()
    }

    async fn is_privileged(&self) -> Result<bool> {
        let Some(guild_id) = self.trigger.guild_id else {
            return Ok(false);
        };
        let member = guild_id
            .member(self.ctx, self.trigger.author.id)
            .await
            .context("Failed to look up invoking member")?;

        let permissions = {
            let guild = self
                .ctx
                .cache
                .guild(guild_id)
                .context("Guild is not cached")?;
            let channel = guild
                .channels
                .get(&self.trigger.channel_id)
                .context("Channel is not cached")?;
            guild.user_permissions_in(channel, &member)
        };
        Ok(permissions.manage_messages())
    }

    async fn reply_text(&self, text: &str) -> Result<()> {
        self.trigger
            .channel_id
            .send_message(
                self.ctx,
                CreateMessage::new()
                    .content(text)
                    .reference_message(reply_reference(self.trigger)),
            )
            .await
            .context("Failed to reply")?;
        Ok(())
    }

    async fn reply_embed(&self, embed: &Embed) -> Result<()> {
        self.trigger
            .channel_id
            .send_message(
                self.ctx,
                CreateMessage::new()
                    .embed(build_embed(embed))
                    .reference_message(reply_reference(self.trigger)),
            )
            .await
            .context("Failed to reply with embed")?;
        Ok(())
    }

    async fn prompt_confirmation(&mut self, text: &str) -> Result<()> {
        let buttons = CreateActionRow::Buttons(vec![
            CreateButton::new(CONFIRM_ID)
                .label("🗑️ Ya, Hapus Semua")
                .style(ButtonStyle::Danger),
            CreateButton::new(CANCEL_ID)
                .label("❌ Batal")
                .style(ButtonStyle::Secondary),
        ]);
        let prompt = self
            .trigger
            .channel_id
            .send_message(
                self.ctx,
                CreateMessage::new()
                    .content(text)
                    .components(vec![buttons])
                    .reference_message(reply_reference(self.trigger)),
            )
            .await
            .context("Failed to post purge confirmation")?;
        self.prompt = Some(prompt);
        Ok(())
    }

    async fn next_choice(&mut self, timeout: Duration) -> Result<Option<(u64, Choice)>> {
        // A press we are still holding came from someone other than the invoker
        if let Some(stale) = self.pending.take() {
            if let Err(e) = stale
                .create_response(self.ctx, CreateInteractionResponse::Acknowledge)
                .await
            {
                warn!("Failed to acknowledge ignored button press: {e}");
            }
        }

        let prompt = self
            .prompt
            .as_ref()
            .context("Confirmation prompt was never posted")?;
        let interaction = prompt
            .await_component_interaction(&self.ctx.shard)
            .filter(|i| Choice::from_custom_id(&i.data.custom_id).is_some())
            .timeout(timeout)
            .await;

        let Some(interaction) = interaction else {
            return Ok(None);
        };
        let choice = Choice::from_custom_id(&interaction.data.custom_id)
            .context("Unrecognised confirmation button")?;
        let user = interaction.user.id.get();
        self.pending = Some(interaction);
        Ok(Some((user, choice)))
    }

    async fn resolve_prompt(&mut self, text: &str) -> Result<()> {
        if let Some(interaction) = self.pending.take() {
            interaction
                .create_response(
                    self.ctx,
                    CreateInteractionResponse::UpdateMessage(
                        CreateInteractionResponseMessage::new()
                            .content(text)
                            .components(vec![]),
                    ),
                )
                .await
                .context("Failed to update purge prompt")?;
        } else if let Some(prompt) = self.prompt.as_mut() {
            prompt
                .edit(self.ctx, EditMessage::new().content(text).components(vec![]))
                .await
                .context("Failed to edit purge prompt")?;
        }
        Ok(())
    }
}

struct Handler {
    state: Arc<AppState>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Bot logged in as {}", ready.user.tag());

        let channel_id = ChannelId::new(self.state.config.discord.channel_id);
        let channel_name = match channel_id.to_channel(&ctx).await {
            Ok(Channel::Guild(channel)) => channel.name,
            Ok(_) => {
                error!("Channel {} is not a guild channel", channel_id);
                return;
            }
            Err(e) => {
                error!("Channel not found! Check DISCORD_CHANNEL_ID: {}", e);
                return;
            }
        };
        info!("Connected to channel: #{}", channel_name);

        let channel = DiscordChannel::new(ctx.http.clone(), channel_id, ready.user.id);
        self.state
            .connect(Connection {
                bot_tag: ready.user.tag(),
                channel_name,
                channel: Arc::new(channel),
            })
            .await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || msg.channel_id.get() != self.state.config.discord.channel_id {
            return;
        }

        let Some(connection) = self.state.connection().await else {
            debug!("Ignoring message before the channel is resolved");
            return;
        };

        let incoming = convert_message(&msg);
        let settings = self.state.command_settings();
        let mut command = DiscordCommand::new(&ctx, &msg, connection.channel);
        if let Err(e) = commands::dispatch(&mut command, &incoming, &settings).await {
            error!("Error handling command: {:#}", e);
        }
    }
}

/// Log in and process gateway events until the connection ends.
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let token = state.config.discord.bot_token.clone();
    let mut client = Client::builder(&token, intents)
        .event_handler(Handler { state })
        .await
        .context("Failed to create Discord client")?;

    info!("Logging in to Discord...");
    client
        .start()
        .await
        .context("Failed to login Discord bot")?;
    Ok(())
}
