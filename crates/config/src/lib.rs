use anyhow::{bail, Context};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "tuber.toml",
    "config/tuber.toml",
    "crates/config/tuber.toml",
    "../tuber.toml",
    "../config/tuber.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

/// Which broker backs the room log and the room broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatBackend {
    #[default]
    Redis,
    /// Single-process only. Sessions on other instances never see these messages.
    Memory,
}

/// Chat relay behaviour.
///
/// ```
/// use tuber_config::{ChatBackend, ChatConfig};
///
/// let chat = ChatConfig::default();
/// assert_eq!(chat.backend, ChatBackend::Redis);
/// assert!(chat.allow_anonymous);
/// assert_eq!(chat.history_max_len, Some(1000));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub backend: ChatBackend,
    /// Attribute unresolved identities to the anonymous participant instead of
    /// rejecting the connection.
    #[serde(default = "ChatConfig::default_allow_anonymous")]
    pub allow_anonymous: bool,
    /// Maximum number of events retained per room log. `None` keeps everything;
    /// files and environment spell that as `0`.
    #[serde(
        default = "ChatConfig::default_history_max_len",
        deserialize_with = "deserialize_history_max_len"
    )]
    pub history_max_len: Option<usize>,
    #[serde(default = "ChatConfig::default_subscription_capacity")]
    pub subscription_capacity: usize,
    #[serde(default = "ChatConfig::default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl ChatConfig {
    const fn default_allow_anonymous() -> bool {
        true
    }

    const fn default_history_max_len() -> Option<usize> {
        Some(1000)
    }

    const fn default_subscription_capacity() -> usize {
        256
    }

    const fn default_shutdown_grace_ms() -> u64 {
        2000
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.subscription_capacity == 0 {
            bail!("chat.subscription_capacity must be greater than zero");
        }
        if self.history_max_len == Some(0) {
            bail!("chat.history_max_len must be greater than zero when set, use None for unbounded");
        }
        Ok(())
    }
}

fn deserialize_history_max_len<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<usize>::deserialize(deserializer)?.filter(|max_len| *max_len > 0))
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            backend: ChatBackend::default(),
            allow_anonymous: Self::default_allow_anonymous(),
            history_max_len: Self::default_history_max_len(),
            subscription_capacity: Self::default_subscription_capacity(),
            shutdown_grace_ms: Self::default_shutdown_grace_ms(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "AuthConfig::default_issuer")]
    pub issuer: String,
}

impl AuthConfig {
    fn default_jwt_secret() -> String {
        "default_secret_change_in_production".to_string()
    }

    fn default_issuer() -> String {
        "tuber".to_string()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: Self::default_jwt_secret(),
            issuer: Self::default_issuer(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use tuber_config::load;
///
/// std::env::remove_var("TUBER_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("redis.url", defaults.redis.url.clone())?
        .set_default("chat.backend", "redis")?
        .set_default("chat.allow_anonymous", defaults.chat.allow_anonymous)?
        .set_default(
            "chat.subscription_capacity",
            i64::try_from(defaults.chat.subscription_capacity).unwrap_or(i64::MAX),
        )?
        .set_default(
            "chat.shutdown_grace_ms",
            i64::try_from(defaults.chat.shutdown_grace_ms).unwrap_or(i64::MAX),
        )?
        .set_default("auth.jwt_secret", defaults.auth.jwt_secret.clone())?
        .set_default("auth.issuer", defaults.auth.issuer.clone())?;

    if let Some(max_len) = defaults.chat.history_max_len {
        builder = builder.set_default(
            "chat.history_max_len",
            i64::try_from(max_len).unwrap_or(i64::MAX),
        )?;
    }

    let environment_overrides = config::Environment::with_prefix("TUBER").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("TUBER_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via TUBER_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    config.chat.validate().context("invalid chat configuration")?;

    debug!(?config, "loaded relay configuration");
    Ok(config)
}
