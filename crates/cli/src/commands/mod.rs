pub mod config;
pub mod doctor;
pub mod fields;
pub mod quote;

use std::path::PathBuf;

use pricebook_core::config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
use pricebook_core::errors::{ApplicationError, ConfigurationError};
use pricebook_core::reference::ReferenceDataStore;
use pricebook_core::schema::FieldSchema;
use serde::Serialize;

use crate::tables;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_REFERENCE: u8 = 3;
pub const EXIT_INPUT: u8 = 4;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        AppConfig::load(LoadOptions {
            config_path: self.config_path.clone(),
            require_file: self.config_path.is_some(),
            overrides: ConfigOverrides {
                data_dir: self.data_dir.clone(),
                ..ConfigOverrides::default()
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Successful command whose output is a structured report.
    pub fn report<T: Serialize>(command: &str, report: &T) -> Self {
        match serde_json::to_string_pretty(report) {
            Ok(output) => Self { exit_code: 0, output },
            Err(error) => Self::failure(command, "serialization", error.to_string(), 1),
        }
    }

    pub fn application_error(
        command: &str,
        error: impl Into<ApplicationError>,
        correlation_id: &str,
    ) -> Self {
        let interface = error.into().into_interface(correlation_id);
        let exit_code = if interface.is_blocking() { EXIT_REFERENCE } else { EXIT_INPUT };
        Self::failure(command, interface.error_class(), interface.to_string(), exit_code)
    }
}

/// Configuration, reference store and field schema every session is built from.
#[derive(Debug)]
pub struct Workspace {
    pub config: AppConfig,
    pub store: ReferenceDataStore,
    pub schema: FieldSchema,
}

impl Workspace {
    pub fn load(command: &str, args: &GlobalArgs) -> Result<Self, CommandResult> {
        let config = args.load_config().map_err(|error| {
            CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            )
        })?;

        let data_dir = &config.reference.data_dir;
        let discovered = tables::discover(data_dir).map_err(|error| {
            CommandResult::failure(command, "reference_data", format!("{error:#}"), EXIT_REFERENCE)
        })?;
        let ui_config = discovered.ui_config.ok_or_else(|| {
            let error = ConfigurationError::MalformedSchema(format!(
                "no UI config file (`*ui_config*.csv`) found in `{}`",
                data_dir.display()
            ));
            CommandResult::application_error(command, error, "startup")
        })?;

        let store = ReferenceDataStore::load(discovered.reference, config.reference.load_mode())
            .map_err(|error| CommandResult::application_error(command, error, "startup"))?;
        let schema = FieldSchema::parse(ui_config)
            .map_err(|error| CommandResult::application_error(command, error, "startup"))?;

        Ok(Self { config, store, schema })
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
