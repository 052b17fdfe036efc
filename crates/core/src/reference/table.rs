use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    Countries,
    Risk,
    Offering,
    Slc,
    #[serde(rename = "labor_machine_category")]
    LaborByMachineCategory,
    #[serde(rename = "labor_band_rate")]
    LaborByBandRate,
}

impl TableName {
    pub const ALL: [TableName; 6] = [
        TableName::Countries,
        TableName::Risk,
        TableName::Offering,
        TableName::Slc,
        TableName::LaborByMachineCategory,
        TableName::LaborByBandRate,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Countries => "countries",
            Self::Risk => "risk",
            Self::Offering => "offering",
            Self::Slc => "slc",
            Self::LaborByMachineCategory => "labor_machine_category",
            Self::LaborByBandRate => "labor_band_rate",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TableName {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|name| name.key() == normalized)
            .ok_or_else(|| format!("unknown reference table `{}`", value.trim()))
    }
}

/// Tabular data as handed over by whatever loaded it: a header row plus string cells.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new<H, R, C>(headers: H, rows: R) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: rows.into_iter().map(|row| row.into_iter().map(Into::into).collect()).collect(),
        }
    }
}

/// Immutable, whitespace-normalized table. Every row has exactly one cell per column.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ReferenceTable {
    pub fn from_raw(raw: RawTable) -> Self {
        let columns = raw.headers.iter().map(|header| normalize(header)).collect::<Vec<_>>();
        let width = columns.len();
        let rows = raw
            .rows
            .into_iter()
            .map(|row| {
                let mut cells = row.iter().map(|cell| normalize(cell)).collect::<Vec<_>>();
                cells.resize(width, String::new());
                cells
            })
            .collect();

        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.column_index_from(column, 0)
    }

    /// Position of `column`, ignoring the first `skip` columns.
    pub fn column_index_from(&self, column: &str, skip: usize) -> Option<usize> {
        let column = column.trim();
        self.columns.iter().skip(skip).position(|name| name == column).map(|index| index + skip)
    }

    pub fn cell_at(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        self.cell_at(row, self.column_index(column)?)
    }

    /// First row whose `column` equals `key`. Later duplicates are never consulted.
    pub fn find_row(&self, column: &str, key: &str) -> Option<usize> {
        let index = self.column_index(column)?;
        let key = key.trim();
        self.rows.iter().position(|row| row.get(index).is_some_and(|cell| cell == key))
    }

    /// Non-empty values of `column` in table order, duplicates dropped.
    pub fn distinct_values(&self, column: &str) -> Option<Vec<String>> {
        let index = self.column_index(column)?;
        let mut values: Vec<String> = Vec::new();
        for row in &self.rows {
            let Some(cell) = row.get(index) else {
                continue;
            };
            if !cell.is_empty() && !values.contains(cell) {
                values.push(cell.clone());
            }
        }
        Some(values)
    }
}

pub(crate) fn normalize(value: &str) -> String {
    value.trim().to_string()
}

pub(crate) fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw).or_else(|_| Decimal::from_scientific(raw)).ok()
}
