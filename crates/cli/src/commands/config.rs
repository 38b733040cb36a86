use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use roomwise_core::config::{AppConfig, LoadOptions};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in effective_values(&config) {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    CommandResult::success("config", lines.join("\n"))
}

type EffectiveValue = (&'static str, String, &'static [&'static str]);

fn field(key: &'static str, value: String, env_keys: &'static [&'static str]) -> EffectiveValue {
    (key, value, env_keys)
}

fn effective_values(config: &AppConfig) -> Vec<EffectiveValue> {
    let scheduling = &config.scheduling;
    vec![
        field("database.url", config.database.url.clone(), &["ROOMWISE_DATABASE_URL"]),
        field(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["ROOMWISE_DATABASE_MAX_CONNECTIONS"],
        ),
        field(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["ROOMWISE_DATABASE_TIMEOUT_SECS"],
        ),
        field("server.bind_address", config.server.bind_address.clone(), &["ROOMWISE_SERVER_BIND_ADDRESS"]),
        field("server.port", config.server.port.to_string(), &["ROOMWISE_SERVER_PORT"]),
        field(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["ROOMWISE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        field("scheduling.timezone", scheduling.timezone.clone(), &["ROOMWISE_SCHEDULING_TIMEZONE"]),
        field(
            "scheduling.business_start_hour",
            scheduling.business_start_hour.to_string(),
            &["ROOMWISE_SCHEDULING_BUSINESS_START_HOUR"],
        ),
        field(
            "scheduling.business_end_hour",
            scheduling.business_end_hour.to_string(),
            &["ROOMWISE_SCHEDULING_BUSINESS_END_HOUR"],
        ),
        field("scheduling.slot_step_minutes", scheduling.slot_step_minutes.to_string(), &[]),
        field("scheduling.team_slot_limit", scheduling.team_slot_limit.to_string(), &[]),
        field("scheduling.instant_rounding_minutes", scheduling.instant_rounding_minutes.to_string(), &[]),
        field("scheduling.instant_option_limit", scheduling.instant_option_limit.to_string(), &[]),
        field(
            "scheduling.recurrence_cap",
            scheduling.recurrence_cap.to_string(),
            &["ROOMWISE_SCHEDULING_RECURRENCE_CAP"],
        ),
        field(
            "scheduling.store_timeout_ms",
            scheduling.store_timeout_ms.to_string(),
            &["ROOMWISE_SCHEDULING_STORE_TIMEOUT_MS"],
        ),
        field(
            "guardrails.writes_enabled",
            config.guardrails.writes_enabled.to_string(),
            &["ROOMWISE_GUARDRAILS_WRITES_ENABLED"],
        ),
        field(
            "guardrails.guests_can_search",
            config.guardrails.guests_can_search.to_string(),
            &["ROOMWISE_GUARDRAILS_GUESTS_CAN_SEARCH"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["ROOMWISE_LOGGING_LEVEL", "ROOMWISE_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["ROOMWISE_LOGGING_FORMAT", "ROOMWISE_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("roomwise.toml"), PathBuf::from("config/roomwise.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
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
