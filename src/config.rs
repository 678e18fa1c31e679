use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
    #[serde(default)]
    pub invitation: InvitationConfig,
    #[serde(default = "default_purge_config")]
    pub purge: PurgeConfig,
    #[serde(default = "default_heartbeat_config")]
    pub heartbeat: HeartbeatConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DiscordConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub channel_id: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct InvitationConfig {
    /// Couple names shown in embed footers (e.g. "Etin & Aji")
    #[serde(default)]
    pub couple: Option<String>,
}

impl InvitationConfig {
    /// Footer stamped on every wish embed.
    pub fn wish_footer(&self) -> String {
        match self.couple.as_deref() {
            Some(couple) if !couple.is_empty() => format!("Wedding Invitation - {couple}"),
            _ => "Wedding Invitation".to_string(),
        }
    }

    /// Footer stamped on the `!help` embed.
    pub fn help_footer(&self) -> String {
        match self.couple.as_deref() {
            Some(couple) if !couple.is_empty() => format!("Wedding Invitation Bot - {couple}"),
            _ => "Wedding Invitation Bot".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PurgeConfig {
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
    #[serde(default = "default_pace_ms")]
    pub pace_ms: u64,
}

impl PurgeConfig {
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_cron")]
    pub cron: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_confirm_timeout_secs() -> u64 {
    30
}

fn default_pace_ms() -> u64 {
    1000
}

fn default_heartbeat_cron() -> String {
    "0 0 * * * *".to_string()
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_purge_config() -> PurgeConfig {
    PurgeConfig {
        confirm_timeout_secs: default_confirm_timeout_secs(),
        pace_ms: default_pace_ms(),
    }
}

fn default_heartbeat_config() -> HeartbeatConfig {
    HeartbeatConfig {
        cron: default_heartbeat_cron(),
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        default_server_config()
    }
}

impl Default for PurgeConfig {
    fn default() -> Self {
        default_purge_config()
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        default_heartbeat_config()
    }
}

impl Config {
    /// Load the config file if it exists, then apply environment overrides.
    /// The bot token and channel id are usually supplied only via the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)?
        } else {
            Config::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Apply `DISCORD_BOT_TOKEN`, `DISCORD_CHANNEL_ID` and `PORT` from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("DISCORD_BOT_TOKEN") {
            self.discord.bot_token = token.trim().to_string();
        }
        if let Some(channel_id) = lookup("DISCORD_CHANNEL_ID") {
            self.discord.channel_id = channel_id
                .trim()
                .parse()
                .with_context(|| format!("Invalid DISCORD_CHANNEL_ID: {channel_id}"))?;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT: {port}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.discord.bot_token.is_empty() {
            anyhow::bail!("Discord bot token is not set (DISCORD_BOT_TOKEN)");
        }
        if self.discord.channel_id == 0 {
            anyhow::bail!("Discord channel id is not set (DISCORD_CHANNEL_ID)");
        }
        Ok(())
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.purge.confirm_timeout(), Duration::from_secs(30));
        assert_eq!(config.purge.pace(), Duration::from_millis(1000));
        assert_eq!(config.heartbeat.cron, "0 0 * * * *");
        assert!(config.invitation.couple.is_none());
    }

    #[test]
    fn test_parse_full_file() {
        let config = Config::parse(
            r#"
            [discord]
            bot_token = "file-token"
            channel_id = 1234

            [server]
            port = 8080

            [invitation]
            couple = "Etin & Aji"

            [purge]
            confirm_timeout_secs = 10
            pace_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.discord.bot_token, "file-token");
        assert_eq!(config.discord.channel_id, 1234);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.purge.confirm_timeout(), Duration::from_secs(10));
        assert_eq!(config.purge.pace(), Duration::from_millis(250));
        assert_eq!(config.invitation.wish_footer(), "Wedding Invitation - Etin & Aji");
        assert_eq!(
            config.invitation.help_footer(),
            "Wedding Invitation Bot - Etin & Aji"
        );
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut config = Config::parse("[discord]\nbot_token = \"file\"\nchannel_id = 1").unwrap();
        config
            .apply_overrides(lookup_from(&[
                ("DISCORD_BOT_TOKEN", "env-token"),
                ("DISCORD_CHANNEL_ID", " 987654321 "),
                ("PORT", "9000"),
            ]))
            .unwrap();
        assert_eq!(config.discord.bot_token, "env-token");
        assert_eq!(config.discord.channel_id, 987654321);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.listen_address(), "0.0.0.0:9000");
    }

    #[test]
    fn test_invalid_channel_id_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(lookup_from(&[("DISCORD_CHANNEL_ID", "general")]))
            .unwrap_err();
        assert!(err.to_string().contains("DISCORD_CHANNEL_ID"));
    }

    #[test]
    fn test_validate_requires_token_and_channel() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.discord.bot_token = "token".to_string();
        assert!(config.validate().is_err());

        config.discord.channel_id = 42;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_footers_without_couple() {
        let invitation = InvitationConfig::default();
        assert_eq!(invitation.wish_footer(), "Wedding Invitation");
        assert_eq!(invitation.help_footer(), "Wedding Invitation Bot");
    }
}
