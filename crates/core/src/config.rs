use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::{LaborCostCurrency, PricingPolicy};
use crate::reference::LoadMode;

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["pricebook.toml", "config/pricebook.toml"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub reference: ReferenceConfig,
    pub pricing: PricingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceConfig {
    pub data_dir: PathBuf,
    pub strict: bool,
}

impl ReferenceConfig {
    pub fn load_mode(&self) -> LoadMode {
        if self.strict {
            LoadMode::Strict
        } else {
            LoadMode::Lenient
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricingConfig {
    pub labor_cost_currency: LaborCostCurrency,
}

impl PricingConfig {
    pub fn policy(&self) -> PricingPolicy {
        PricingPolicy { labor_cost_currency: self.labor_cost_currency }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
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
    pub data_dir: Option<PathBuf>,
    pub strict: Option<bool>,
    pub labor_cost_currency: Option<LaborCostCurrency>,
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
            reference: ReferenceConfig { data_dir: PathBuf::from("."), strict: false },
            pricing: PricingConfig { labor_cost_currency: LaborCostCurrency::Local },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
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
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(reference) = patch.reference {
            if let Some(data_dir) = reference.data_dir {
                self.reference.data_dir = data_dir;
            }
            if let Some(strict) = reference.strict {
                self.reference.strict = strict;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(labor_cost_currency) = pricing.labor_cost_currency {
                self.pricing.labor_cost_currency = labor_cost_currency;
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
        if let Some(value) = read_env("PRICEBOOK_DATA_DIR") {
            self.reference.data_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("PRICEBOOK_REFERENCE_STRICT") {
            self.reference.strict = parse_bool("PRICEBOOK_REFERENCE_STRICT", &value)?;
        }

        if let Some(value) = read_env("PRICEBOOK_LABOR_COST_CURRENCY") {
            self.pricing.labor_cost_currency =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "PRICEBOOK_LABOR_COST_CURRENCY".to_string(),
                    value: value.clone(),
                })?;
        }

        let log_level =
            read_env("PRICEBOOK_LOGGING_LEVEL").or_else(|| read_env("PRICEBOOK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = ["PRICEBOOK_LOGGING_FORMAT", "PRICEBOOK_LOG_FORMAT"]
            .into_iter()
            .find_map(|key| read_env(key).map(|value| (key.to_string(), value)));
        if let Some((key, value)) = log_format {
            self.logging.format =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride { key, value })?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(data_dir) = overrides.data_dir {
            self.reference.data_dir = data_dir;
        }
        if let Some(strict) = overrides.strict {
            self.reference.strict = strict;
        }
        if let Some(labor_cost_currency) = overrides.labor_cost_currency {
            self.pricing.labor_cost_currency = labor_cost_currency;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_reference(&self.reference)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Explicit path if it exists, otherwise the first default location present.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
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

fn validate_reference(reference: &ReferenceConfig) -> Result<(), ConfigError> {
    if reference.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation("reference.data_dir must not be empty".to_string()));
    }
    if reference.data_dir.exists() && !reference.data_dir.is_dir() {
        return Err(ConfigError::Validation(format!(
            "reference.data_dir `{}` is not a directory",
            reference.data_dir.display()
        )));
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

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    reference: Option<ReferencePatch>,
    pricing: Option<PricingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ReferencePatch {
    data_dir: Option<PathBuf>,
    strict: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    labor_cost_currency: Option<LaborCostCurrency>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
