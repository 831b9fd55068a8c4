use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub recommender: RecommenderConfig,
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
    pub admin_token: Option<SecretString>,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RecommenderConfig {
    pub default_max_results: usize,
    pub max_results_cap: usize,
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
    pub admin_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file is missing: `{0}`")]
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
                url: "sqlite://tandem.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                admin_token: None,
                graceful_shutdown_secs: 15,
            },
            recommender: RecommenderConfig { default_max_results: 1, max_results_cap: 100 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tandem.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        patch.database.unwrap_or_default().apply_to(&mut self.database);
        patch.server.unwrap_or_default().apply_to(&mut self.server);
        patch.recommender.unwrap_or_default().apply_to(&mut self.recommender);
        patch.logging.unwrap_or_default().apply_to(&mut self.logging);
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TANDEM_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TANDEM_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("TANDEM_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TANDEM_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("TANDEM_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TANDEM_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TANDEM_SERVER_PORT") {
            self.server.port = parse_env("TANDEM_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("TANDEM_SERVER_ADMIN_TOKEN") {
            self.server.admin_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("TANDEM_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("TANDEM_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("TANDEM_RECOMMENDER_DEFAULT_MAX_RESULTS") {
            self.recommender.default_max_results =
                parse_env("TANDEM_RECOMMENDER_DEFAULT_MAX_RESULTS", &value)?;
        }
        if let Some(value) = read_env("TANDEM_RECOMMENDER_MAX_RESULTS_CAP") {
            self.recommender.max_results_cap =
                parse_env("TANDEM_RECOMMENDER_MAX_RESULTS_CAP", &value)?;
        }

        // `TANDEM_LOG_*` is accepted as a short alias for `TANDEM_LOGGING_*`.
        let log_level = read_env("TANDEM_LOGGING_LEVEL").or_else(|| read_env("TANDEM_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TANDEM_LOGGING_FORMAT").or_else(|| read_env("TANDEM_LOG_FORMAT"));
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
        if let Some(admin_token) = overrides.admin_token {
            self.server.admin_token = Some(secret_value(admin_token));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_recommender(&self.recommender)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tandem.toml"), PathBuf::from("config/tandem.toml")]
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

/// Replaces every `${NAME}` in the raw file with the value of that
/// environment variable. A missing variable or an unclosed expression is
/// an error rather than a silently empty value.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let expression = &rest[start + 2..];
        let end = expression.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let key = &expression[..end];

        let value = env::var(key)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.to_string() })?;
        output.push_str(&value);
        rest = &expression[end + 1..];
    }

    output.push_str(rest);
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

    if let Some(token) = &server.admin_token {
        if token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "server.admin_token must not be empty when set (unset it to disable admin calls)"
                    .to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_recommender(recommender: &RecommenderConfig) -> Result<(), ConfigError> {
    if recommender.default_max_results == 0 {
        return Err(ConfigError::Validation(
            "recommender.default_max_results must be at least 1".to_string(),
        ));
    }

    if recommender.max_results_cap < recommender.default_max_results {
        return Err(ConfigError::Validation(
            "recommender.max_results_cap must be at least recommender.default_max_results"
                .to_string(),
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

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Partial view of the config file. Absent keys fall through to the
/// defaults, so `apply_to` only touches fields the file actually set.
#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    recommender: Option<RecommenderPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

impl DatabasePatch {
    fn apply_to(self, config: &mut DatabaseConfig) {
        let Self { url, max_connections, timeout_secs } = self;
        if let Some(url) = url {
            config.url = url;
        }
        if let Some(max_connections) = max_connections {
            config.max_connections = max_connections;
        }
        if let Some(timeout_secs) = timeout_secs {
            config.timeout_secs = timeout_secs;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    admin_token: Option<String>,
    graceful_shutdown_secs: Option<u64>,
}

impl ServerPatch {
    fn apply_to(self, config: &mut ServerConfig) {
        let Self { bind_address, port, admin_token, graceful_shutdown_secs } = self;
        if let Some(bind_address) = bind_address {
            config.bind_address = bind_address;
        }
        if let Some(port) = port {
            config.port = port;
        }
        if let Some(token) = admin_token {
            config.admin_token = Some(secret_value(token));
        }
        if let Some(graceful_shutdown_secs) = graceful_shutdown_secs {
            config.graceful_shutdown_secs = graceful_shutdown_secs;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RecommenderPatch {
    default_max_results: Option<usize>,
    max_results_cap: Option<usize>,
}

impl RecommenderPatch {
    fn apply_to(self, config: &mut RecommenderConfig) {
        let Self { default_max_results, max_results_cap } = self;
        if let Some(default_max_results) = default_max_results {
            config.default_max_results = default_max_results;
        }
        if let Some(max_results_cap) = max_results_cap {
            config.max_results_cap = max_results_cap;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl LoggingPatch {
    fn apply_to(self, config: &mut LoggingConfig) {
        let Self { level, format } = self;
        if let Some(level) = level {
            config.level = level;
        }
        if let Some(format) = format {
            config.format = format;
        }
    }
}
