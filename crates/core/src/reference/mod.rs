pub mod lookup;
pub mod table;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::LaborMode;
use crate::errors::{ConfigurationError, LookupError};

pub use lookup::{Lookup, LookupWarning};
pub use table::{RawTable, ReferenceTable, TableName};

use table::parse_decimal;

pub const RISK_COLUMN: &str = "Risk";
pub const CONTINGENCY_COLUMN: &str = "Contingency";
pub const OFFERING_COLUMN: &str = "Offering";
pub const SLC_COLUMN: &str = "SLC";
pub const LABOR_CATEGORY_COLUMN: &str = "MC/RR";

/// The first two `Countries` columns are a row label and a field name.
const COUNTRY_COLUMN_OFFSET: usize = 2;
const EXCHANGE_RATE_ROW: usize = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    Strict,
    #[default]
    Lenient,
}

/// Read-only reference data shared by every session and the pricing engine.
#[derive(Clone, Debug, Default)]
pub struct ReferenceDataStore {
    countries: ReferenceTable,
    risk: ReferenceTable,
    offering: ReferenceTable,
    slc: ReferenceTable,
    labor_machine_category: ReferenceTable,
    labor_band_rate: ReferenceTable,
    missing: Vec<TableName>,
}

impl ReferenceDataStore {
    pub fn load<I>(tables: I, mode: LoadMode) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (TableName, RawTable)>,
    {
        let mut raw = tables.into_iter().collect::<Vec<_>>();
        let mut store = Self::default();

        for name in TableName::ALL {
            // a table supplied twice keeps its first copy
            let table = raw
                .iter()
                .position(|(candidate, _)| *candidate == name)
                .map(|index| raw.remove(index).1);

            match table {
                Some(table) => *store.table_mut(name) = ReferenceTable::from_raw(table),
                None if mode == LoadMode::Strict => {
                    return Err(ConfigurationError::MissingTable(name));
                }
                None => {
                    warn!(
                        event_name = "reference.table_missing",
                        table = %name,
                        "reference table absent; substituting an empty table"
                    );
                    store.missing.push(name);
                }
            }
        }

        Ok(store)
    }

    pub fn table(&self, name: TableName) -> &ReferenceTable {
        match name {
            TableName::Countries => &self.countries,
            TableName::Risk => &self.risk,
            TableName::Offering => &self.offering,
            TableName::Slc => &self.slc,
            TableName::LaborByMachineCategory => &self.labor_machine_category,
            TableName::LaborByBandRate => &self.labor_band_rate,
        }
    }

    fn table_mut(&mut self, name: TableName) -> &mut ReferenceTable {
        match name {
            TableName::Countries => &mut self.countries,
            TableName::Risk => &mut self.risk,
            TableName::Offering => &mut self.offering,
            TableName::Slc => &mut self.slc,
            TableName::LaborByMachineCategory => &mut self.labor_machine_category,
            TableName::LaborByBandRate => &mut self.labor_band_rate,
        }
    }

    /// Tables replaced by empty ones during a lenient load.
    pub fn missing_tables(&self) -> &[TableName] {
        &self.missing
    }

    pub fn list_countries(&self) -> Vec<String> {
        self.countries
            .columns()
            .iter()
            .skip(COUNTRY_COLUMN_OFFSET)
            .filter(|country| !country.is_empty())
            .cloned()
            .collect()
    }

    /// Exchange rate for `country`. An empty or non-numeric cell degrades to 0.
    pub fn exchange_rate(&self, country: &str) -> Result<Lookup<Decimal>, LookupError> {
        let country = country.trim();
        let column = self
            .countries
            .column_index_from(country, COUNTRY_COLUMN_OFFSET)
            .filter(|_| !country.is_empty())
            .ok_or_else(|| LookupError::UnknownCountry(country.to_string()))?;
        let cell = self
            .countries
            .cell_at(EXCHANGE_RATE_ROW, column)
            .ok_or_else(|| LookupError::UnknownCountry(country.to_string()))?;

        Ok(self.number_or_zero(TableName::Countries, country, cell))
    }

    /// Contingency fraction for `tier`; unknown tiers default to 0.
    pub fn contingency(&self, tier: &str) -> Lookup<Decimal> {
        let tier = tier.trim();
        if let Some(lookup) = self.require_column(TableName::Risk, RISK_COLUMN, Decimal::ZERO) {
            return lookup;
        }
        if let Some(lookup) =
            self.require_column(TableName::Risk, CONTINGENCY_COLUMN, Decimal::ZERO)
        {
            return lookup;
        }

        let Some(row) = self.risk.find_row(RISK_COLUMN, tier) else {
            return Lookup::degraded(
                Decimal::ZERO,
                LookupWarning::UnknownRiskTier { tier: tier.to_string() },
            );
        };
        let cell = self.risk.cell(row, CONTINGENCY_COLUMN).unwrap_or_default();
        self.number_or_zero(TableName::Risk, CONTINGENCY_COLUMN, cell)
    }

    /// Monthly labor cost in local currency. Every miss degrades to 0.
    pub fn labor_monthly_cost(
        &self,
        mode: LaborMode,
        category: &str,
        country: &str,
    ) -> Lookup<Decimal> {
        let name = mode.table();
        let table = self.table(name);
        let category = category.trim();
        let country = country.trim();

        if let Some(lookup) = self.require_column(name, LABOR_CATEGORY_COLUMN, Decimal::ZERO) {
            return lookup;
        }
        let Some(row) = table.find_row(LABOR_CATEGORY_COLUMN, category) else {
            return Lookup::degraded(
                Decimal::ZERO,
                LookupWarning::UnknownCategory { table: name, category: category.to_string() },
            );
        };
        let Some(cell) = table.cell(row, country).filter(|_| !country.is_empty()) else {
            return Lookup::degraded(
                Decimal::ZERO,
                LookupWarning::UnknownCountry { country: country.to_string() },
            );
        };

        self.number_or_zero(name, country, cell)
    }

    /// Distinct, ordered values of `column`, used as enum options.
    pub fn options(&self, name: TableName, column: &str) -> Lookup<Vec<String>> {
        if let Some(lookup) = self.require_column(name, column, Vec::new()) {
            return lookup;
        }
        Lookup::found(self.table(name).distinct_values(column).unwrap_or_default())
    }

    pub fn labor_categories(&self, mode: LaborMode) -> Lookup<Vec<String>> {
        self.options(mode.table(), LABOR_CATEGORY_COLUMN)
    }

    fn require_column<T>(&self, name: TableName, column: &str, fallback: T) -> Option<Lookup<T>> {
        if self.missing.contains(&name) {
            return Some(Lookup::degraded(fallback, LookupWarning::MissingTable { table: name }));
        }
        if self.table(name).column_index(column).is_none() {
            return Some(Lookup::degraded(
                fallback,
                LookupWarning::MissingColumn { table: name, column: column.to_string() },
            ));
        }
        None
    }

    fn number_or_zero(&self, name: TableName, column: &str, cell: &str) -> Lookup<Decimal> {
        match parse_decimal(cell) {
            Some(value) => Lookup::found(value),
            None => Lookup::degraded(
                Decimal::ZERO,
                LookupWarning::MalformedNumber {
                    table: name,
                    column: column.to_string(),
                    value: cell.to_string(),
                },
            ),
        }
    }
}
