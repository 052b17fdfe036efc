use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reference::TableName;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unrecognised {kind} `{value}`")]
pub struct ParseModeError {
    pub kind: &'static str,
    pub value: String,
}

/// Currency the quote is presented in. `Usd` pins the exchange rate to 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyMode {
    #[default]
    Usd,
    Local,
}

impl CurrencyMode {
    pub const OPTIONS: [CurrencyMode; 2] = [CurrencyMode::Usd, CurrencyMode::Local];

    pub fn label(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Local => "Local",
        }
    }
}

impl fmt::Display for CurrencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CurrencyMode {
    type Err = ParseModeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "usd" => Ok(Self::Usd),
            "local" => Ok(Self::Local),
            _ => Err(ParseModeError { kind: "currency mode", value: value.trim().to_string() }),
        }
    }
}

/// Labor classification scheme; each one is backed by its own rate table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaborMode {
    #[default]
    MachineCategory,
    BandRate,
}

impl LaborMode {
    pub const OPTIONS: [LaborMode; 2] = [LaborMode::MachineCategory, LaborMode::BandRate];

    pub fn label(self) -> &'static str {
        match self {
            Self::MachineCategory => "Machine Category",
            Self::BandRate => "Band Rate",
        }
    }

    pub fn table(self) -> TableName {
        match self {
            Self::MachineCategory => TableName::LaborByMachineCategory,
            Self::BandRate => TableName::LaborByBandRate,
        }
    }
}

impl fmt::Display for LaborMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LaborMode {
    type Err = ParseModeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "mc" => return Ok(Self::MachineCategory),
            "br" | "rr" => return Ok(Self::BandRate),
            _ => {}
        }

        if normalized.contains("machine") {
            Ok(Self::MachineCategory)
        } else if normalized.contains("band") || normalized.contains("brand") {
            Ok(Self::BandRate)
        } else {
            Err(ParseModeError { kind: "labor mode", value: value.trim().to_string() })
        }
    }
}

/// Read-only totals a summary field can display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteMetric {
    TotalServiceCost,
    TotalManageCost,
    GrandTotal,
}
