use thiserror::Error;

use crate::reference::TableName;
use crate::schema::{FieldId, FieldRole};

/// Broken reference data or field configuration. Fatal at startup.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("required reference table `{0}` is missing")]
    MissingTable(TableName),
    #[error("field schema is malformed: {0}")]
    MalformedSchema(String),
    #[error("field `{0}` is defined more than once")]
    DuplicateField(FieldId),
    #[error("field `{field}` depends on unknown field `{dependency}`")]
    UnknownDependency { field: FieldId, dependency: FieldId },
    #[error("cyclic field dependency: {}", render_cycle(.cycle))]
    CyclicDependency { cycle: Vec<FieldId> },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("country `{0}` has no exchange rate in reference data")]
    UnknownCountry(String),
}

/// A rejected field assignment. The session keeps its previous state.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("unknown field `{0}`")]
    UnknownField(FieldId),
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: FieldId, reason: String },
    #[error("`{value}` is not an available option for `{field}`")]
    InvalidOption { field: FieldId, value: String },
    #[error("field `{0}` is computed and cannot be assigned")]
    ReadOnlyField(FieldId),
    #[error("no value available for {0:?}")]
    MissingValue(FieldRole),
}

impl InputError {
    pub fn field(&self) -> Option<&FieldId> {
        match self {
            Self::UnknownField(field)
            | Self::InvalidValue { field, .. }
            | Self::InvalidOption { field, .. }
            | Self::ReadOnlyField(field) => Some(field),
            Self::MissingValue(_) => None,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Input(#[from] InputError),
}

/// Error shape handed to a presentation layer: blocking vs. inline.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("configuration error: {message}")]
    Blocking { message: String, correlation_id: String },
    #[error("rejected input: {message}")]
    Rejected { message: String, field: Option<String>, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Blocking { .. } => {
                "Reference data or field configuration is invalid. Fix the configuration and restart."
            }
            Self::Rejected { .. } => "The value was not accepted. Check the field and try again.",
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Blocking { .. } => "configuration",
            Self::Rejected { .. } => "invalid_input",
        }
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Blocking { .. })
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::Blocking { correlation_id: id, .. }
            | InterfaceError::Rejected { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let message = value.to_string();
        match value {
            ApplicationError::Configuration(_) => {
                Self::Blocking { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Lookup(_) => {
                Self::Rejected { message, field: None, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Input(error) => Self::Rejected {
                message,
                field: error.field().map(ToString::to_string),
                correlation_id: "unassigned".to_owned(),
            },
        }
    }
}

fn render_cycle(cycle: &[FieldId]) -> String {
    cycle.iter().map(FieldId::as_str).collect::<Vec<_>>().join(" -> ")
}
