use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::commands::CommandSettings;
use crate::config::Config;
use crate::platform::ChatChannel;

/// The resolved wishes channel, available once the bot is ready
#[derive(Clone)]
pub struct Connection {
    pub bot_tag: String,
    pub channel_name: String,
    pub channel: Arc<dyn ChatChannel>,
}

/// Shared application state, handed to both the HTTP handlers and the
/// Discord event handler
pub struct AppState {
    pub config: Config,
    connection: RwLock<Option<Connection>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            connection: RwLock::new(None),
        }
    }

    pub async fn connect(&self, connection: Connection) {
        info!(
            "Relay bound to #{} as {}",
            connection.channel_name, connection.bot_tag
        );
        *self.connection.write().await = Some(connection);
    }

    /// `None` until the bot has logged in and resolved the channel
    pub async fn connection(&self) -> Option<Connection> {
        self.connection.read().await.clone()
    }

    pub fn command_settings(&self) -> CommandSettings {
        CommandSettings {
            channel_id: self.config.discord.channel_id,
            confirm_timeout: self.config.purge.confirm_timeout(),
            pace: self.config.purge.pace(),
            help_footer: self.config.invitation.help_footer(),
        }
    }
}
