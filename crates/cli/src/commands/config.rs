use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use loomline_core::config::{AppConfig, LoadOptions};
use serde::Serialize;
use toml::Value;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let entries = effective_values(&config)
        .into_iter()
        .map(|(key, value, env_keys)| ConfigEntry {
            key,
            value,
            source: field_source(
                key,
                env_keys,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        })
        .collect::<Vec<_>>();

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(entries.iter().map(render_line));

    match serde_json::to_value(&entries) {
        Ok(data) => CommandResult::success_with_data("config", lines.join("\n"), Some(data)),
        Err(_) => CommandResult::success("config", lines.join("\n")),
    }
}

type EffectiveValue = (&'static str, String, &'static [&'static str]);

fn effective_values(config: &AppConfig) -> Vec<EffectiveValue> {
    let database = &config.database;
    let logging = &config.logging;
    let sales = &config.sales;
    let format = format!("{:?}", logging.format).to_ascii_lowercase();

    vec![
        value("database.url", database.url.clone(), &["LOOMLINE_DATABASE_URL"]),
        value(
            "database.max_connections",
            database.max_connections.to_string(),
            &["LOOMLINE_DATABASE_MAX_CONNECTIONS"],
        ),
        value(
            "database.timeout_secs",
            database.timeout_secs.to_string(),
            &["LOOMLINE_DATABASE_TIMEOUT_SECS"],
        ),
        value(
            "logging.level",
            logging.level.clone(),
            &["LOOMLINE_LOGGING_LEVEL", "LOOMLINE_LOG_LEVEL"],
        ),
        value("logging.format", format, &["LOOMLINE_LOGGING_FORMAT", "LOOMLINE_LOG_FORMAT"]),
        value(
            "sales.default_business_model",
            sales.default_business_model.to_string(),
            &["LOOMLINE_SALES_DEFAULT_BUSINESS_MODEL"],
        ),
        value(
            "sales.quote_validity_days",
            sales.quote_validity_days.to_string(),
            &["LOOMLINE_SALES_QUOTE_VALIDITY_DAYS"],
        ),
        value(
            "sales.invoice_interstate",
            sales.invoice_interstate.to_string(),
            &["LOOMLINE_SALES_INVOICE_INTERSTATE"],
        ),
    ]
}

fn value(key: &'static str, current: String, env_keys: &'static [&'static str]) -> EffectiveValue {
    (key, current, env_keys)
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("loomline.toml"), PathBuf::from("config/loomline.toml")]
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

fn render_line(entry: &ConfigEntry) -> String {
    format!("- {} = {} (source: {})", entry.key, entry.value, entry.source)
}
