use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub scheduling: SchedulingConfig,
    pub guardrails: GuardrailsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SchedulingConfig {
    /// IANA zone used for business hours, opening hours and recurrence arithmetic.
    pub timezone: String,
    pub business_start_hour: u32,
    pub business_end_hour: u32,
    pub slot_step_minutes: u32,
    pub team_slot_limit: usize,
    pub instant_rounding_minutes: u32,
    pub instant_option_limit: usize,
    pub recurrence_cap: u32,
    pub store_timeout_ms: u64,
}

/// Deployment switches applied to every session before a tool runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailsConfig {
    pub writes_enabled: bool,
    pub guests_can_search: bool,
}

impl Default for GuardrailsConfig {
    fn default() -> Self {
        Self { writes_enabled: true, guests_can_search: true }
    }
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
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub timezone: Option<String>,
    pub server_port: Option<u16>,
    pub store_timeout_ms: Option<u64>,
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
            database: DatabaseConfig {
                url: "sqlite://roomwise.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            scheduling: SchedulingConfig::default(),
            guardrails: GuardrailsConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/Paris".to_string(),
            business_start_hour: 9,
            business_end_hour: 18,
            slot_step_minutes: 60,
            team_slot_limit: 3,
            instant_rounding_minutes: 5,
            instant_option_limit: 3,
            recurrence_cap: 12,
            store_timeout_ms: 5_000,
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("roomwise.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(scheduling) = patch.scheduling {
            let target = &mut self.scheduling;
            if let Some(timezone) = scheduling.timezone {
                target.timezone = timezone;
            }
            if let Some(hour) = scheduling.business_start_hour {
                target.business_start_hour = hour;
            }
            if let Some(hour) = scheduling.business_end_hour {
                target.business_end_hour = hour;
            }
            if let Some(step) = scheduling.slot_step_minutes {
                target.slot_step_minutes = step;
            }
            if let Some(limit) = scheduling.team_slot_limit {
                target.team_slot_limit = limit;
            }
            if let Some(rounding) = scheduling.instant_rounding_minutes {
                target.instant_rounding_minutes = rounding;
            }
            if let Some(limit) = scheduling.instant_option_limit {
                target.instant_option_limit = limit;
            }
            if let Some(cap) = scheduling.recurrence_cap {
                target.recurrence_cap = cap;
            }
            if let Some(timeout) = scheduling.store_timeout_ms {
                target.store_timeout_ms = timeout;
            }
        }

        if let Some(guardrails) = patch.guardrails {
            if let Some(enabled) = guardrails.writes_enabled {
                self.guardrails.writes_enabled = enabled;
            }
            if let Some(enabled) = guardrails.guests_can_search {
                self.guardrails.guests_can_search = enabled;
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
        if let Some(value) = read_env("ROOMWISE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ROOMWISE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_num("ROOMWISE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ROOMWISE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_num("ROOMWISE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ROOMWISE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ROOMWISE_SERVER_PORT") {
            self.server.port = parse_num("ROOMWISE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("ROOMWISE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_num("ROOMWISE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("ROOMWISE_SCHEDULING_TIMEZONE") {
            self.scheduling.timezone = value;
        }
        if let Some(value) = read_env("ROOMWISE_SCHEDULING_BUSINESS_START_HOUR") {
            self.scheduling.business_start_hour =
                parse_num("ROOMWISE_SCHEDULING_BUSINESS_START_HOUR", &value)?;
        }
        if let Some(value) = read_env("ROOMWISE_SCHEDULING_BUSINESS_END_HOUR") {
            self.scheduling.business_end_hour =
                parse_num("ROOMWISE_SCHEDULING_BUSINESS_END_HOUR", &value)?;
        }
        if let Some(value) = read_env("ROOMWISE_SCHEDULING_STORE_TIMEOUT_MS") {
            self.scheduling.store_timeout_ms =
                parse_num("ROOMWISE_SCHEDULING_STORE_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("ROOMWISE_SCHEDULING_RECURRENCE_CAP") {
            self.scheduling.recurrence_cap = parse_num("ROOMWISE_SCHEDULING_RECURRENCE_CAP", &value)?;
        }

        if let Some(value) = read_env("ROOMWISE_GUARDRAILS_WRITES_ENABLED") {
            self.guardrails.writes_enabled = parse_bool("ROOMWISE_GUARDRAILS_WRITES_ENABLED", &value)?;
        }
        if let Some(value) = read_env("ROOMWISE_GUARDRAILS_GUESTS_CAN_SEARCH") {
            self.guardrails.guests_can_search =
                parse_bool("ROOMWISE_GUARDRAILS_GUESTS_CAN_SEARCH", &value)?;
        }

        let log_level =
            read_env("ROOMWISE_LOGGING_LEVEL").or_else(|| read_env("ROOMWISE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ROOMWISE_LOGGING_FORMAT").or_else(|| read_env("ROOMWISE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(timezone) = overrides.timezone {
            self.scheduling.timezone = timezone;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(timeout) = overrides.store_timeout_ms {
            self.scheduling.store_timeout_ms = timeout;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_scheduling(&self.scheduling)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("roomwise.toml"), PathBuf::from("config/roomwise.toml")]
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

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_scheduling(scheduling: &SchedulingConfig) -> Result<(), ConfigError> {
    if scheduling.timezone.trim().parse::<chrono_tz::Tz>().is_err() {
        return Err(ConfigError::Validation(format!(
            "scheduling.timezone `{}` is not a known IANA time zone",
            scheduling.timezone
        )));
    }

    if scheduling.business_start_hour >= scheduling.business_end_hour
        || scheduling.business_end_hour > 24
    {
        return Err(ConfigError::Validation(
            "scheduling.business_start_hour must be before business_end_hour (max 24)".to_string(),
        ));
    }

    if !(5..=240).contains(&scheduling.slot_step_minutes) {
        return Err(ConfigError::Validation(
            "scheduling.slot_step_minutes must be in range 5..=240".to_string(),
        ));
    }

    if scheduling.team_slot_limit == 0 || scheduling.instant_option_limit == 0 {
        return Err(ConfigError::Validation(
            "scheduling.team_slot_limit and instant_option_limit must be greater than zero"
                .to_string(),
        ));
    }

    if !(1..=60).contains(&scheduling.instant_rounding_minutes) {
        return Err(ConfigError::Validation(
            "scheduling.instant_rounding_minutes must be in range 1..=60".to_string(),
        ));
    }

    if !(1..=52).contains(&scheduling.recurrence_cap) {
        return Err(ConfigError::Validation(
            "scheduling.recurrence_cap must be in range 1..=52".to_string(),
        ));
    }

    if !(1..=60_000).contains(&scheduling.store_timeout_ms) {
        return Err(ConfigError::Validation(
            "scheduling.store_timeout_ms must be in range 1..=60000".to_string(),
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

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    scheduling: Option<SchedulingPatch>,
    guardrails: Option<GuardrailsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulingPatch {
    timezone: Option<String>,
    business_start_hour: Option<u32>,
    business_end_hour: Option<u32>,
    slot_step_minutes: Option<u32>,
    team_slot_limit: Option<usize>,
    instant_rounding_minutes: Option<u32>,
    instant_option_limit: Option<usize>,
    recurrence_cap: Option<u32>,
    store_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct GuardrailsPatch {
    writes_enabled: Option<bool>,
    guests_can_search: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
