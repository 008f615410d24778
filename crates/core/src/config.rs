use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::intent::{
    RoutingPolicy, DEFAULT_CONFIDENCE_THRESHOLD, ENTITY_MAIL_COUNT, ENTITY_MAIL_FROM,
    ENTITY_MAIL_SUBJECT, INTENT_HELLO, INTENT_MAIL_GET, INTENT_NONE,
};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub channel: ChannelConfig,
    pub auth: AuthConfig,
    pub intent: IntentConfig,
    pub mail: MailConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// Channel identifier that invoke-type turns must originate from.
    pub trusted_channel_id: String,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Name of the delegated-login connection at the identity provider.
    pub connection_name: String,
    pub login_timeout_secs: u64,
    pub client_secret: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct IntentConfig {
    pub confidence_threshold: f64,
    pub none_intent: String,
    pub hello_intent: String,
    pub mail_intent: String,
    pub from_entity: String,
    pub subject_entity: String,
    pub count_entity: String,
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    pub inbox_endpoint: String,
    pub page_size: u32,
    pub timeout_secs: u64,
    pub logo_url: String,
    pub timezone: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub storage_backend: Option<StorageBackend>,
    pub trusted_channel_id: Option<String>,
    pub auth_connection_name: Option<String>,
    pub confidence_threshold: Option<f64>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackend::Sqlite,
                database_url: "sqlite://mailseek.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            channel: ChannelConfig { trusted_channel_id: "msteams".to_string() },
            auth: AuthConfig {
                connection_name: String::new(),
                login_timeout_secs: 300,
                client_secret: None,
            },
            intent: IntentConfig {
                confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
                none_intent: INTENT_NONE.to_string(),
                hello_intent: INTENT_HELLO.to_string(),
                mail_intent: INTENT_MAIL_GET.to_string(),
                from_entity: ENTITY_MAIL_FROM.to_string(),
                subject_entity: ENTITY_MAIL_SUBJECT.to_string(),
                count_entity: ENTITY_MAIL_COUNT.to_string(),
            },
            mail: MailConfig {
                inbox_endpoint: "https://graph.microsoft.com/v1.0/me/mailFolders/inbox/messages"
                    .to_string(),
                page_size: 100,
                timeout_secs: 30,
                logo_url: "https://botframeworksamples.blob.core.windows.net/samples/OutlookLogo.jpg"
                    .to_string(),
                timezone: "UTC".to_string(),
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl From<&IntentConfig> for RoutingPolicy {
    fn from(intent: &IntentConfig) -> Self {
        Self {
            confidence_threshold: intent.confidence_threshold,
            none_intent: intent.none_intent.clone(),
            hello_intent: intent.hello_intent.clone(),
            mail_intent: intent.mail_intent.clone(),
            from_entity: intent.from_entity.clone(),
            subject_entity: intent.subject_entity.clone(),
            count_entity: intent.count_entity.clone(),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::Validation(format!(
                "unsupported storage backend `{other}` (expected memory|sqlite)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("mailseek.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn routing_policy(&self) -> RoutingPolicy {
        RoutingPolicy::from(&self.intent)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(storage) = patch.storage {
            if let Some(backend) = storage.backend {
                self.storage.backend = backend;
            }
            if let Some(database_url) = storage.database_url {
                self.storage.database_url = database_url;
            }
            if let Some(max_connections) = storage.max_connections {
                self.storage.max_connections = max_connections;
            }
            if let Some(timeout_secs) = storage.timeout_secs {
                self.storage.timeout_secs = timeout_secs;
            }
        }

        if let Some(channel) = patch.channel {
            if let Some(trusted_channel_id) = channel.trusted_channel_id {
                self.channel.trusted_channel_id = trusted_channel_id;
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(connection_name) = auth.connection_name {
                self.auth.connection_name = connection_name;
            }
            if let Some(login_timeout_secs) = auth.login_timeout_secs {
                self.auth.login_timeout_secs = login_timeout_secs;
            }
            if let Some(client_secret_value) = auth.client_secret {
                self.auth.client_secret = Some(client_secret_value.into());
            }
        }

        if let Some(intent) = patch.intent {
            if let Some(confidence_threshold) = intent.confidence_threshold {
                self.intent.confidence_threshold = confidence_threshold;
            }
            if let Some(none_intent) = intent.none_intent {
                self.intent.none_intent = none_intent;
            }
            if let Some(hello_intent) = intent.hello_intent {
                self.intent.hello_intent = hello_intent;
            }
            if let Some(mail_intent) = intent.mail_intent {
                self.intent.mail_intent = mail_intent;
            }
            if let Some(from_entity) = intent.from_entity {
                self.intent.from_entity = from_entity;
            }
            if let Some(subject_entity) = intent.subject_entity {
                self.intent.subject_entity = subject_entity;
            }
            if let Some(count_entity) = intent.count_entity {
                self.intent.count_entity = count_entity;
            }
        }

        if let Some(mail) = patch.mail {
            if let Some(inbox_endpoint) = mail.inbox_endpoint {
                self.mail.inbox_endpoint = inbox_endpoint;
            }
            if let Some(page_size) = mail.page_size {
                self.mail.page_size = page_size;
            }
            if let Some(timeout_secs) = mail.timeout_secs {
                self.mail.timeout_secs = timeout_secs;
            }
            if let Some(logo_url) = mail.logo_url {
                self.mail.logo_url = logo_url;
            }
            if let Some(timezone) = mail.timezone {
                self.mail.timezone = timezone;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("MAILSEEK_STORAGE_BACKEND") {
            self.storage.backend = value.parse()?;
        }
        if let Some(value) = read_env("MAILSEEK_DATABASE_URL") {
            self.storage.database_url = value;
        }
        if let Some(value) = read_env("MAILSEEK_DATABASE_MAX_CONNECTIONS") {
            self.storage.max_connections = parse_u32("MAILSEEK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("MAILSEEK_DATABASE_TIMEOUT_SECS") {
            self.storage.timeout_secs = parse_u64("MAILSEEK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("MAILSEEK_TRUSTED_CHANNEL_ID") {
            self.channel.trusted_channel_id = value;
        }

        if let Some(value) = read_env("MAILSEEK_AUTH_CONNECTION_NAME") {
            self.auth.connection_name = value;
        }
        if let Some(value) = read_env("MAILSEEK_AUTH_LOGIN_TIMEOUT_SECS") {
            self.auth.login_timeout_secs = parse_u64("MAILSEEK_AUTH_LOGIN_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("MAILSEEK_AUTH_CLIENT_SECRET") {
            self.auth.client_secret = Some(value.into());
        }

        if let Some(value) = read_env("MAILSEEK_INTENT_CONFIDENCE_THRESHOLD") {
            self.intent.confidence_threshold =
                parse_f64("MAILSEEK_INTENT_CONFIDENCE_THRESHOLD", &value)?;
        }

        if let Some(value) = read_env("MAILSEEK_MAIL_INBOX_ENDPOINT") {
            self.mail.inbox_endpoint = value;
        }
        if let Some(value) = read_env("MAILSEEK_MAIL_PAGE_SIZE") {
            self.mail.page_size = parse_u32("MAILSEEK_MAIL_PAGE_SIZE", &value)?;
        }

        if let Some(value) = read_env("MAILSEEK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("MAILSEEK_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("MAILSEEK_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        if let Some(value) = read_env("MAILSEEK_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("MAILSEEK_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.storage.database_url = database_url;
        }
        if let Some(backend) = overrides.storage_backend {
            self.storage.backend = backend;
        }
        if let Some(trusted_channel_id) = overrides.trusted_channel_id {
            self.channel.trusted_channel_id = trusted_channel_id;
        }
        if let Some(connection_name) = overrides.auth_connection_name {
            self.auth.connection_name = connection_name;
        }
        if let Some(confidence_threshold) = overrides.confidence_threshold {
            self.intent.confidence_threshold = confidence_threshold;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::Sqlite {
            let url = self.storage.database_url.trim();
            let sqlite_url =
                url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
            if !sqlite_url {
                return Err(ConfigError::Validation(
                    "storage.database_url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                        .to_string(),
                ));
            }
        }
        if self.storage.max_connections == 0 {
            return Err(ConfigError::Validation(
                "storage.max_connections must be at least 1".to_string(),
            ));
        }

        if self.channel.trusted_channel_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "channel.trusted_channel_id must not be empty".to_string(),
            ));
        }

        if self.auth.connection_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "auth.connection_name is required (the delegated-login connection at the identity provider)"
                    .to_string(),
            ));
        }
        if self.auth.login_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "auth.login_timeout_secs must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.intent.confidence_threshold) {
            return Err(ConfigError::Validation(
                "intent.confidence_threshold must be within 0.0..=1.0".to_string(),
            ));
        }
        for (key, value) in [
            ("intent.none_intent", &self.intent.none_intent),
            ("intent.hello_intent", &self.intent.hello_intent),
            ("intent.mail_intent", &self.intent.mail_intent),
            ("intent.from_entity", &self.intent.from_entity),
            ("intent.subject_entity", &self.intent.subject_entity),
            ("intent.count_entity", &self.intent.count_entity),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }

        if self.mail.page_size == 0 {
            return Err(ConfigError::Validation("mail.page_size must be at least 1".to_string()));
        }
        if self.mail.inbox_endpoint.trim().is_empty() {
            return Err(ConfigError::Validation(
                "mail.inbox_endpoint must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    storage: Option<StoragePatch>,
    channel: Option<ChannelPatch>,
    auth: Option<AuthPatch>,
    intent: Option<IntentPatch>,
    mail: Option<MailPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    backend: Option<StorageBackend>,
    database_url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelPatch {
    trusted_channel_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    connection_name: Option<String>,
    login_timeout_secs: Option<u64>,
    client_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IntentPatch {
    confidence_threshold: Option<f64>,
    none_intent: Option<String>,
    hello_intent: Option<String>,
    mail_intent: Option<String>,
    from_entity: Option<String>,
    subject_entity: Option<String>,
    count_entity: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MailPatch {
    inbox_endpoint: Option<String>,
    page_size: Option<u32>,
    timeout_secs: Option<u64>,
    logo_url: Option<String>,
    timezone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("mailseek.toml"), PathBuf::from("config/mailseek.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_owned(), value: value.to_owned() })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_owned(), value: value.to_owned() })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_owned(), value: value.to_owned() })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_owned(), value: value.to_owned() })
}
