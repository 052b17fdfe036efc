pub mod modes;

pub use modes::{CurrencyMode, LaborMode, ParseModeError, QuoteMetric};
