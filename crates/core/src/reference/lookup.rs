use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::reference::TableName;

/// Non-fatal diagnostic attached to a lookup that fell back to a default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LookupWarning {
    MissingTable { table: TableName },
    MissingColumn { table: TableName, column: String },
    UnknownCountry { country: String },
    UnknownRiskTier { tier: String },
    UnknownCategory { table: TableName, category: String },
    MalformedNumber { table: TableName, column: String, value: String },
    ZeroExchangeRate { exchange_rate: Decimal },
    ArithmeticOverflow { stage: String },
}

impl fmt::Display for LookupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTable { table } => write!(f, "reference table `{table}` was not loaded"),
            Self::MissingColumn { table, column } => {
                write!(f, "column `{column}` not found in table `{table}`")
            }
            Self::UnknownCountry { country } if country.is_empty() => {
                f.write_str("no country selected")
            }
            Self::UnknownCountry { country } => {
                write!(f, "country `{country}` not found in reference data")
            }
            Self::UnknownRiskTier { tier } if tier.is_empty() => {
                f.write_str("no risk tier selected; contingency defaults to 0")
            }
            Self::UnknownRiskTier { tier } => {
                write!(f, "risk tier `{tier}` not found; contingency defaults to 0")
            }
            Self::UnknownCategory { table, category } if category.is_empty() => {
                write!(f, "no labor category selected for `{table}`; labor cost defaults to 0")
            }
            Self::UnknownCategory { table, category } => {
                write!(
                    f,
                    "labor category `{category}` not found in `{table}`; labor cost defaults to 0"
                )
            }
            Self::MalformedNumber { table, column, value } => {
                write!(f, "value `{value}` in `{table}`.`{column}` is not a number; using 0")
            }
            Self::ZeroExchangeRate { exchange_rate } => write!(
                f,
                "exchange rate {exchange_rate} is not positive; managed labor contributes 0"
            ),
            Self::ArithmeticOverflow { stage } => {
                write!(f, "`{stage}` is out of range; it contributes 0 to the quote")
            }
        }
    }
}

/// A looked-up value plus the warning explaining why it is a fallback, if it is one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lookup<T> {
    pub value: T,
    pub warning: Option<LookupWarning>,
}

impl<T> Lookup<T> {
    pub fn found(value: T) -> Self {
        Self { value, warning: None }
    }

    pub fn degraded(value: T, warning: LookupWarning) -> Self {
        tracing::warn!(
            event_name = "reference.lookup_miss",
            warning = %warning,
            "lookup fell back to a default value"
        );
        Self { value, warning: Some(warning) }
    }

    pub fn is_miss(&self) -> bool {
        self.warning.is_some()
    }

    pub fn into_parts(self) -> (T, Option<LookupWarning>) {
        (self.value, self.warning)
    }
}
