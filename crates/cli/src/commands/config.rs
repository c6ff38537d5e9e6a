use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use toml::Value;
use tripwise_core::config::{AppConfig, ConfigOverrides, LoadOptions};

use super::{load_config, CommandResult};

struct FieldSources<'a> {
    doc: Option<Value>,
    path: Option<PathBuf>,
    overrides: &'a ConfigOverrides,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let overrides = options.overrides.clone();
    let path = detect_config_path(options.config_path.as_deref());
    let config = match load_config("config", options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let sources = FieldSources {
        doc: load_config_file_doc(path.as_deref()),
        path,
        overrides: &overrides,
    };
    CommandResult::text(render(&config, &sources))
}

fn render(config: &AppConfig, sources: &FieldSources<'_>) -> String {
    let fields = vec![
        field(
            "llm.api_key",
            &["CLAUDE_API_KEY", "TRIPWISE_LLM_API_KEY"],
            redact_token(config.llm.api_key.expose_secret()),
        ),
        field("llm.base_url", &["TRIPWISE_LLM_BASE_URL"], config.llm.base_url.clone()),
        field("llm.model", &["TRIPWISE_LLM_MODEL"], config.llm.model.clone()),
        field("llm.temperature", &["TRIPWISE_LLM_TEMPERATURE"], config.llm.temperature.to_string()),
        field("llm.max_tokens", &["TRIPWISE_LLM_MAX_TOKENS"], config.llm.max_tokens.to_string()),
        field("llm.timeout_secs", &["TRIPWISE_LLM_TIMEOUT_SECS"], config.llm.timeout_secs.to_string()),
        field(
            "booking.api_key",
            &["RAPIDAPI_KEY", "TRIPWISE_BOOKING_API_KEY"],
            redact_token(config.booking.api_key.expose_secret()),
        ),
        field("booking.api_host", &["TRIPWISE_BOOKING_API_HOST"], config.booking.api_host.clone()),
        field("booking.base_url", &["TRIPWISE_BOOKING_BASE_URL"], config.booking.base_url.clone()),
        field(
            "booking.request_timeout_secs",
            &["TRIPWISE_BOOKING_REQUEST_TIMEOUT_SECS"],
            config.booking.request_timeout_secs.to_string(),
        ),
        field(
            "booking.location_timeout_secs",
            &["TRIPWISE_BOOKING_LOCATION_TIMEOUT_SECS"],
            config.booking.location_timeout_secs.to_string(),
        ),
        field(
            "booking.max_retries",
            &["TRIPWISE_BOOKING_MAX_RETRIES"],
            config.booking.max_retries.to_string(),
        ),
        field(
            "booking.retry_delay_ms",
            &["TRIPWISE_BOOKING_RETRY_DELAY_MS"],
            config.booking.retry_delay_ms.to_string(),
        ),
        field(
            "conversation.max_turns",
            &["TRIPWISE_CONVERSATION_MAX_TURNS"],
            config.conversation.max_turns.to_string(),
        ),
        field(
            "logging.level",
            &["TRIPWISE_LOGGING_LEVEL", "TRIPWISE_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        field(
            "logging.format",
            &["TRIPWISE_LOGGING_FORMAT", "TRIPWISE_LOG_FORMAT"],
            format!("{:?}", config.logging.format).to_lowercase(),
        ),
    ];

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    lines.extend(
        fields
            .into_iter()
            .map(|(key, env_keys, value)| render_line(key, &value, field_source(key, env_keys, sources))),
    );
    lines.join("\n")
}

type Field = (&'static str, &'static [&'static str], String);

fn field(key: &'static str, env_keys: &'static [&'static str], value: String) -> Field {
    (key, env_keys, value)
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    [PathBuf::from("tripwise.toml"), PathBuf::from("config/tripwise.toml")]
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(key_path: &str, env_keys: &[&str], sources: &FieldSources<'_>) -> String {
    if overridden(key_path, sources.overrides) {
        return "flag".to_string();
    }

    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = &sources.doc {
        if contains_path(doc, key_path) {
            let file_path = sources
                .path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn overridden(key_path: &str, overrides: &ConfigOverrides) -> bool {
    match key_path {
        "llm.api_key" => overrides.llm_api_key.is_some(),
        "llm.model" => overrides.llm_model.is_some(),
        "booking.api_key" => overrides.booking_api_key.is_some(),
        "booking.base_url" => overrides.booking_base_url.is_some(),
        "conversation.max_turns" => overrides.max_turns.is_some(),
        "logging.level" => overrides.log_level.is_some(),
        _ => false,
    }
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the vendor prefix of dash-separated keys (`sk-***`) and nothing else.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
