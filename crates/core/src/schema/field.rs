use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::QuoteMetric;
use crate::reference::{TableName, OFFERING_COLUMN, RISK_COLUMN, SLC_COLUMN};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub String);

impl FieldId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldId {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Sidebar,
    ServiceModule,
    LaborModule,
    Summary,
    Unclassified,
}

impl Section {
    pub const RENDERED: [Section; 4] =
        [Section::Sidebar, Section::ServiceModule, Section::LaborModule, Section::Summary];

    pub fn is_rendered(self) -> bool {
        self != Self::Unclassified
    }
}

/// What a field means to the quote, independent of how it is labelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    QuoteReference,
    CustomerName,
    Country,
    Currency,
    RiskTier,
    ExchangeRate,
    Offering,
    Slc,
    Quantity,
    Duration,
    UnitCost,
    Date,
    LaborMode,
    LaborCategory,
    LaborCost,
    Output(QuoteMetric),
    FreeText,
}

impl FieldRole {
    pub fn value_source(self) -> ValueSource {
        match self {
            Self::QuoteReference | Self::CustomerName | Self::FreeText => ValueSource::StaticText,
            Self::Country => ValueSource::CountryList,
            Self::Currency => ValueSource::CurrencyModes,
            Self::RiskTier => table_column(TableName::Risk, RISK_COLUMN),
            Self::ExchangeRate => ValueSource::ComputedExchangeRate,
            Self::Offering => table_column(TableName::Offering, OFFERING_COLUMN),
            Self::Slc => table_column(TableName::Slc, SLC_COLUMN),
            Self::Quantity | Self::Duration => {
                ValueSource::NumericInput(NumericRule { minimum: Decimal::ONE, integer: true })
            }
            Self::UnitCost => {
                ValueSource::NumericInput(NumericRule { minimum: Decimal::ZERO, integer: false })
            }
            Self::Date => ValueSource::DateInput,
            Self::LaborMode => ValueSource::LaborModes,
            Self::LaborCategory => ValueSource::LaborCategories,
            Self::LaborCost => ValueSource::ComputedLaborCost,
            Self::Output(metric) => ValueSource::QuoteOutput { metric },
        }
    }

    /// Roles whose change invalidates a field of this role.
    pub fn implicit_dependencies(self) -> &'static [FieldRole] {
        match self {
            Self::ExchangeRate => &[Self::Country, Self::Currency],
            Self::LaborCategory => &[Self::LaborMode],
            Self::LaborCost => &[Self::LaborMode, Self::LaborCategory, Self::Country],
            _ => &[],
        }
    }
}

fn table_column(table: TableName, column: &str) -> ValueSource {
    ValueSource::EnumFromTable { table, column: column.to_string() }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericRule {
    pub minimum: Decimal,
    pub integer: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueSource {
    StaticText,
    NumericInput(NumericRule),
    DateInput,
    EnumFromTable { table: TableName, column: String },
    CountryList,
    CurrencyModes,
    LaborModes,
    LaborCategories,
    ComputedExchangeRate,
    ComputedLaborCost,
    QuoteOutput { metric: QuoteMetric },
}

impl ValueSource {
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            Self::EnumFromTable { .. }
                | Self::CountryList
                | Self::CurrencyModes
                | Self::LaborModes
                | Self::LaborCategories
        )
    }

    /// Derived by the session or the pricing engine; never assigned directly.
    pub fn is_computed(&self) -> bool {
        matches!(
            self,
            Self::ComputedExchangeRate | Self::ComputedLaborCost | Self::QuoteOutput { .. }
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: FieldId,
    pub label: String,
    pub section: Section,
    pub role: FieldRole,
    pub value_source: ValueSource,
    pub depends_on: Vec<FieldId>,
    pub annotation: Option<String>,
}

impl FieldDefinition {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        section: Section,
        role: FieldRole,
    ) -> Self {
        Self {
            id: FieldId(id.into()),
            label: label.into(),
            section,
            role,
            value_source: role.value_source(),
            depends_on: Vec::new(),
            annotation: None,
        }
    }

    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        let dependency = FieldId(dependency.into());
        if !self.depends_on.contains(&dependency) {
            self.depends_on.push(dependency);
        }
        self
    }
}
