pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod reference;
pub mod schema;
pub mod session;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::{AppConfig, ConfigError, LoadOptions, LogFormat};
pub use domain::{CurrencyMode, LaborMode, QuoteMetric};
pub use errors::{ApplicationError, ConfigurationError, InputError, InterfaceError, LookupError};
pub use pricing::{
    compute_quote, compute_quote_with_policy, DeterministicPricingEngine, LaborCostCurrency,
    PricingEngine, PricingPolicy, PricingTrace, QuoteInputs, QuoteOutcome, QuoteResult,
};
pub use reference::{LoadMode, Lookup, LookupWarning, RawTable, ReferenceDataStore, TableName};
pub use schema::{FieldDefinition, FieldId, FieldRole, FieldSchema, Section, ValueSource};
pub use session::{FieldValue, FormSession, SessionId};
