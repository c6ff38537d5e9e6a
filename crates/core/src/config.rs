use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const LLM_API_KEY_ENV: &str = "CLAUDE_API_KEY";
pub const BOOKING_API_KEY_ENV: &str = "RAPIDAPI_KEY";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub booking: BookingConfig,
    pub conversation: ConversationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BookingConfig {
    pub api_key: SecretString,
    pub api_host: String,
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub location_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub max_turns: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub booking_api_key: Option<String>,
    pub booking_base_url: Option<String>,
    pub max_turns: Option<usize>,
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
    #[error("missing required credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: String::new().into(),
                base_url: "https://api.anthropic.com/v1".to_string(),
                model: "claude-sonnet-4-20250514".to_string(),
                temperature: 0.3,
                max_tokens: 2048,
                timeout_secs: 60,
            },
            booking: BookingConfig {
                api_key: String::new().into(),
                api_host: "booking-com15.p.rapidapi.com".to_string(),
                base_url: "https://booking-com15.p.rapidapi.com/api/v1".to_string(),
                request_timeout_secs: 30,
                location_timeout_secs: 15,
                max_retries: 3,
                retry_delay_ms: 2_000,
            },
            conversation: ConversationConfig { max_turns: 20 },
            logging: LoggingConfig { level: "warn".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tripwise.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = secret_value(llm_api_key_value);
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(booking) = patch.booking {
            if let Some(booking_api_key_value) = booking.api_key {
                self.booking.api_key = secret_value(booking_api_key_value);
            }
            if let Some(api_host) = booking.api_host {
                self.booking.api_host = api_host;
            }
            if let Some(base_url) = booking.base_url {
                self.booking.base_url = base_url;
            }
            if let Some(request_timeout_secs) = booking.request_timeout_secs {
                self.booking.request_timeout_secs = request_timeout_secs;
            }
            if let Some(location_timeout_secs) = booking.location_timeout_secs {
                self.booking.location_timeout_secs = location_timeout_secs;
            }
            if let Some(max_retries) = booking.max_retries {
                self.booking.max_retries = max_retries;
            }
            if let Some(retry_delay_ms) = booking.retry_delay_ms {
                self.booking.retry_delay_ms = retry_delay_ms;
            }
        }

        if let Some(conversation) = patch.conversation {
            if let Some(max_turns) = conversation.max_turns {
                self.conversation.max_turns = max_turns;
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
        let llm_api_key = read_env(LLM_API_KEY_ENV).or_else(|| read_env("TRIPWISE_LLM_API_KEY"));
        if let Some(value) = llm_api_key {
            self.llm.api_key = secret_value(value);
        }
        if let Some(value) = read_env("TRIPWISE_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("TRIPWISE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("TRIPWISE_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("TRIPWISE_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("TRIPWISE_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("TRIPWISE_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("TRIPWISE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("TRIPWISE_LLM_TIMEOUT_SECS", &value)?;
        }

        let booking_api_key =
            read_env(BOOKING_API_KEY_ENV).or_else(|| read_env("TRIPWISE_BOOKING_API_KEY"));
        if let Some(value) = booking_api_key {
            self.booking.api_key = secret_value(value);
        }
        if let Some(value) = read_env("TRIPWISE_BOOKING_API_HOST") {
            self.booking.api_host = value;
        }
        if let Some(value) = read_env("TRIPWISE_BOOKING_BASE_URL") {
            self.booking.base_url = value;
        }
        if let Some(value) = read_env("TRIPWISE_BOOKING_REQUEST_TIMEOUT_SECS") {
            self.booking.request_timeout_secs =
                parse_u64("TRIPWISE_BOOKING_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("TRIPWISE_BOOKING_LOCATION_TIMEOUT_SECS") {
            self.booking.location_timeout_secs =
                parse_u64("TRIPWISE_BOOKING_LOCATION_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("TRIPWISE_BOOKING_MAX_RETRIES") {
            self.booking.max_retries = parse_u32("TRIPWISE_BOOKING_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("TRIPWISE_BOOKING_RETRY_DELAY_MS") {
            self.booking.retry_delay_ms = parse_u64("TRIPWISE_BOOKING_RETRY_DELAY_MS", &value)?;
        }

        if let Some(value) = read_env("TRIPWISE_CONVERSATION_MAX_TURNS") {
            self.conversation.max_turns = parse_usize("TRIPWISE_CONVERSATION_MAX_TURNS", &value)?;
        }

        let log_level =
            read_env("TRIPWISE_LOGGING_LEVEL").or_else(|| read_env("TRIPWISE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TRIPWISE_LOGGING_FORMAT").or_else(|| read_env("TRIPWISE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = secret_value(llm_api_key);
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(booking_api_key) = overrides.booking_api_key {
            self.booking.api_key = secret_value(booking_api_key);
        }
        if let Some(booking_base_url) = overrides.booking_base_url {
            self.booking.base_url = booking_base_url;
        }
        if let Some(max_turns) = overrides.max_turns {
            self.conversation.max_turns = max_turns;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_credentials(self)?;
        validate_llm(&self.llm)?;
        validate_booking(&self.booking)?;
        validate_conversation(&self.conversation)?;
        validate_logging(&self.logging)?;
        Ok(())
    }

    /// Names of required credentials that are absent or blank.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.llm.api_key.expose_secret().trim().is_empty() {
            missing.push(LLM_API_KEY_ENV);
        }
        if self.booking.api_key.expose_secret().trim().is_empty() {
            missing.push(BOOKING_API_KEY_ENV);
        }
        missing
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tripwise.toml"), PathBuf::from("config/tripwise.toml")]
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

fn validate_credentials(config: &AppConfig) -> Result<(), ConfigError> {
    let missing = config.missing_credentials();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::MissingCredentials(missing))
    }
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=600".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=1.0".to_string(),
        ));
    }
    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    validate_http_url("llm.base_url", &llm.base_url)
}

fn validate_booking(booking: &BookingConfig) -> Result<(), ConfigError> {
    if booking.request_timeout_secs == 0 || booking.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "booking.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if booking.location_timeout_secs == 0 || booking.location_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "booking.location_timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if booking.max_retries > 10 {
        return Err(ConfigError::Validation(
            "booking.max_retries must be at most 10".to_string(),
        ));
    }
    if booking.api_host.trim().is_empty() {
        return Err(ConfigError::Validation("booking.api_host must not be empty".to_string()));
    }
    validate_http_url("booking.base_url", &booking.base_url)
}

fn validate_conversation(conversation: &ConversationConfig) -> Result<(), ConfigError> {
    if conversation.max_turns == 0 {
        return Err(ConfigError::Validation(
            "conversation.max_turns must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    booking: Option<BookingPatch>,
    conversation: Option<ConversationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BookingPatch {
    api_key: Option<String>,
    api_host: Option<String>,
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    location_timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    max_turns: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
