use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub slack: SlackConfig,
    pub github: GitHubConfig,
    pub claude: ClaudeConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    pub signing_secret: String,
    /// The bot's own user id; `<@id>` mentions of it route to the default agent.
    #[serde(default)]
    pub bot_user_id: Option<String>,
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
}

// Manual Debug impl to avoid leaking the bot token and signing secret
impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"[REDACTED]")
            .field("signing_secret", &"[REDACTED]")
            .field("bot_user_id", &self.bot_user_id)
            .field("dedup_capacity", &self.dedup_capacity)
            .finish()
    }
}

#[derive(Deserialize, Clone)]
pub struct GitHubConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub app_id: Option<u64>,
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    #[serde(default)]
    pub installation_id: Option<u64>,
    #[serde(default)]
    pub api_base_url: Option<String>,
}

// Manual Debug impl to avoid leaking the token
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("app_id", &self.app_id)
            .field("private_key_path", &self.private_key_path)
            .field("installation_id", &self.installation_id)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// How the GitHub adapter authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitHubAuth {
    Token,
    App {
        app_id: u64,
        private_key_path: PathBuf,
        installation_id: u64,
    },
}

impl GitHubConfig {
    /// Resolve the configured credentials. Exactly one of `token` or the full
    /// set of App credentials must be present.
    pub fn auth(&self) -> Result<GitHubAuth> {
        let app = (
            self.app_id,
            self.private_key_path.as_ref(),
            self.installation_id,
        );

        match (&self.token, app) {
            (Some(_), (None, None, None)) => Ok(GitHubAuth::Token),
            (None, (Some(app_id), Some(path), Some(installation_id))) => Ok(GitHubAuth::App {
                app_id,
                private_key_path: path.clone(),
                installation_id,
            }),
            (Some(_), _) => Err(AppError::Config(
                "github.token and GitHub App credentials are mutually exclusive".to_string(),
            )),
            (None, _) => Err(AppError::Config(
                "github requires either `token` or `app_id`, `private_key_path` and `installation_id`"
                    .to_string(),
            )),
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct ClaudeConfig {
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for ClaudeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_agent_id")]
    pub default_agent: String,
    /// TOML file with `[[agents]]` tables. A built-in developer agent is used when absent.
    #[serde(default)]
    pub definitions_path: Option<PathBuf>,
    #[serde(default = "default_max_history_messages")]
    pub max_history_messages: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_agent: default_agent_id(),
            definitions_path: None,
            max_history_messages: default_max_history_messages(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_dedup_capacity() -> usize {
    1000
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_agent_id() -> String {
    "developer".to_string()
}

fn default_max_history_messages() -> usize {
    20
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("forgebot").required(false));
        }

        // Environment variable overrides with FORGEBOT_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("FORGEBOT")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.github.auth()?;

        if self.slack.dedup_capacity == 0 {
            return Err(AppError::Config(
                "slack.dedup_capacity must be greater than zero".to_string(),
            ));
        }

        if self.agent.max_history_messages == 0 {
            return Err(AppError::Config(
                "agent.max_history_messages must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn signing_secret(&self) -> &str {
        &self.slack.signing_secret
    }

    pub fn claude_api_key(&self) -> &str {
        &self.claude.api_key
    }
}
