use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpq::summary::TaxScheme;
use crate::domain::catalog::BusinessModel;
use crate::revisions::QuotingSettings;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub sales: SalesConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SalesConfig {
    pub default_business_model: BusinessModel,
    pub quote_validity_days: u32,
    /// Invoice tax is charged as IGST instead of the CGST/SGST split.
    pub invoice_interstate: bool,
}

impl SalesConfig {
    pub fn quoting_settings(&self) -> QuotingSettings {
        QuotingSettings {
            quote_validity_days: self.quote_validity_days,
            tax_scheme: TaxScheme::Quote,
        }
    }

    pub fn invoice_scheme(&self) -> TaxScheme {
        TaxScheme::Invoice { interstate: self.invoice_interstate }
    }
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
    pub default_business_model: Option<BusinessModel>,
    pub quote_validity_days: Option<u32>,
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
                url: "sqlite://loomline.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            sales: SalesConfig {
                default_business_model: BusinessModel::Sales,
                quote_validity_days: 15,
                invoice_interstate: false,
            },
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("loomline.toml"));
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

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(sales) = patch.sales {
            if let Some(model) = sales.default_business_model {
                self.sales.default_business_model = model;
            }
            if let Some(days) = sales.quote_validity_days {
                self.sales.quote_validity_days = days;
            }
            if let Some(interstate) = sales.invoice_interstate {
                self.sales.invoice_interstate = interstate;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LOOMLINE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("LOOMLINE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("LOOMLINE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("LOOMLINE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("LOOMLINE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("LOOMLINE_LOGGING_LEVEL").or_else(|| read_env("LOOMLINE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LOOMLINE_LOGGING_FORMAT").or_else(|| read_env("LOOMLINE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("LOOMLINE_SALES_DEFAULT_BUSINESS_MODEL") {
            self.sales.default_business_model =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "LOOMLINE_SALES_DEFAULT_BUSINESS_MODEL".to_string(),
                    value: value.clone(),
                })?;
        }
        if let Some(value) = read_env("LOOMLINE_SALES_QUOTE_VALIDITY_DAYS") {
            self.sales.quote_validity_days =
                parse_u32("LOOMLINE_SALES_QUOTE_VALIDITY_DAYS", &value)?;
        }
        if let Some(value) = read_env("LOOMLINE_SALES_INVOICE_INTERSTATE") {
            self.sales.invoice_interstate =
                parse_bool("LOOMLINE_SALES_INVOICE_INTERSTATE", &value)?;
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
        if let Some(model) = overrides.default_business_model {
            self.sales.default_business_model = model;
        }
        if let Some(days) = overrides.quote_validity_days {
            self.sales.quote_validity_days = days;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_logging(&self.logging)?;
        validate_sales(&self.sales)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("loomline.toml"), PathBuf::from("config/loomline.toml")]
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

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_sales(sales: &SalesConfig) -> Result<(), ConfigError> {
    if sales.quote_validity_days == 0 || sales.quote_validity_days > 365 {
        return Err(ConfigError::Validation(
            "sales.quote_validity_days must be in range 1..=365".to_string(),
        ));
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    logging: Option<LoggingPatch>,
    sales: Option<SalesPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct SalesPatch {
    default_business_model: Option<BusinessModel>,
    quote_validity_days: Option<u32>,
    invoice_interstate: Option<bool>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::cpq::summary::TaxScheme;
    use crate::domain::catalog::BusinessModel;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid() -> Result<(), String> {
        let config = AppConfig::default();
        config.validate().map_err(|err| err.to_string())?;

        ensure(config.sales.quote_validity_days == 15, "default validity should be 15 days")?;
        ensure(
            config.sales.quoting_settings().tax_scheme == TaxScheme::Quote,
            "quotes should use the quote tax scheme",
        )?;
        ensure(
            config.sales.invoice_scheme() == TaxScheme::Invoice { interstate: false },
            "invoices should default to intra-state",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_LOOMLINE_DB_PATH", "/tmp/loomline-interp.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("loomline.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://${TEST_LOOMLINE_DB_PATH}"

[sales]
default_business_model = "job_work"
quote_validity_days = 30
invoice_interstate = true
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite:///tmp/loomline-interp.db",
                "database url should be interpolated from environment",
            )?;
            ensure(
                config.sales.default_business_model == BusinessModel::JobWork,
                "business model should come from the file",
            )?;
            ensure(config.sales.quote_validity_days == 30, "validity should come from the file")?;
            ensure(config.sales.invoice_interstate, "interstate flag should come from the file")
        })();

        clear_vars(&["TEST_LOOMLINE_DB_PATH"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["TEST_LOOMLINE_UNSET"]);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("loomline.toml");
        fs::write(&path, "[database]\nurl = \"${TEST_LOOMLINE_UNSET}\"\n")
            .map_err(|err| err.to_string())?;

        let error =
            match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            {
                Ok(_) => return Err("expected interpolation failure".to_string()),
                Err(error) => error,
            };
        let names_variable = matches!(
            error,
            ConfigError::MissingEnvInterpolation { ref var } if var == "TEST_LOOMLINE_UNSET"
        );
        ensure(names_variable, "interpolation failure should name the variable")
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LOOMLINE_LOG_LEVEL", "warn");
        env::set_var("LOOMLINE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["LOOMLINE_LOG_LEVEL", "LOOMLINE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LOOMLINE_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("LOOMLINE_SALES_QUOTE_VALIDITY_DAYS", "45");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("loomline.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[logging]
level = "warn"

[sales]
quote_validity_days = 20
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.sales.quote_validity_days == 45,
                "env validity should win over file and defaults",
            )?;
            Ok(())
        })();

        clear_vars(&["LOOMLINE_DATABASE_URL", "LOOMLINE_SALES_QUOTE_VALIDITY_DAYS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LOOMLINE_SALES_QUOTE_VALIDITY_DAYS", "0");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message)
                    if message.contains("sales.quote_validity_days")
            );
            ensure(has_message, "validation failure should mention sales.quote_validity_days")
        })();

        clear_vars(&["LOOMLINE_SALES_QUOTE_VALIDITY_DAYS"]);
        result
    }

    #[test]
    fn invalid_env_business_model_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LOOMLINE_SALES_DEFAULT_BUSINESS_MODEL", "barter");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };
            let names_variable = matches!(
                error,
                ConfigError::InvalidEnvOverride { ref key, .. }
                    if key == "LOOMLINE_SALES_DEFAULT_BUSINESS_MODEL"
            );
            ensure(names_variable, "error should name the offending variable")
        })();

        clear_vars(&["LOOMLINE_SALES_DEFAULT_BUSINESS_MODEL"]);
        result
    }

    #[test]
    fn required_file_must_exist() -> Result<(), String> {
        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("absent.toml");

        let error = match AppConfig::load(LoadOptions {
            config_path: Some(path.clone()),
            require_file: true,
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected missing file failure".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(error, ConfigError::MissingConfigFile(ref missing) if missing == &path),
            "missing file error should carry the path",
        )
    }
}
