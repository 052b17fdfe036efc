use std::env;
use std::fs;
use std::path::Path;

use pricebook_core::config::resolve_config_path;
use pricebook_core::pricing::LaborCostCurrency;
use toml::Value;

use crate::commands::{CommandResult, GlobalArgs, EXIT_CONFIG};

pub fn run(args: &GlobalArgs) -> CommandResult {
    let config = match args.load_config() {
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

    let config_file_path = resolve_config_path(args.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines =
        vec!["effective config (source precedence: cli > env > file > default):".to_string()];

    let data_dir_source = if args.data_dir.is_some() {
        "cli (--data-dir)".to_string()
    } else {
        source("reference.data_dir", &["PRICEBOOK_DATA_DIR"])
    };
    lines.push(render_line(
        "reference.data_dir",
        &config.reference.data_dir.display().to_string(),
        data_dir_source,
    ));
    lines.push(render_line(
        "reference.strict",
        &config.reference.strict.to_string(),
        source("reference.strict", &["PRICEBOOK_REFERENCE_STRICT"]),
    ));

    let labor_cost_currency = match config.pricing.labor_cost_currency {
        LaborCostCurrency::Local => "local (divided by exchange rate)",
        LaborCostCurrency::Usd => "usd (no conversion)",
    };
    lines.push(render_line(
        "pricing.labor_cost_currency",
        labor_cost_currency,
        source("pricing.labor_cost_currency", &["PRICEBOOK_LABOR_COST_CURRENCY"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["PRICEBOOK_LOGGING_LEVEL", "PRICEBOOK_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["PRICEBOOK_LOGGING_FORMAT", "PRICEBOOK_LOG_FORMAT"]),
    ));

    CommandResult { exit_code: 0, output: lines.join("\n") }
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
