//! In-memory reference tables and UI config shared by the unit tests.

use crate::reference::{LoadMode, RawTable, ReferenceDataStore, TableName};
use crate::schema::FieldSchema;

pub(crate) fn reference_tables() -> Vec<(TableName, RawTable)> {
    vec![
        (
            TableName::Countries,
            RawTable::new(
                ["Field", "Name", " Brazil ", "Mexico", "Argentina"],
                [
                    vec!["Currency", "currency", "BRL", "MXN", "ARS"],
                    vec!["Exchange Rate", "er", "5.25", "17.10", "0"],
                ],
            ),
        ),
        (
            TableName::Risk,
            RawTable::new(
                ["Risk", "Contingency"],
                [
                    vec!["Low", "0.05"],
                    vec![" Medium ", "0.10"],
                    vec!["High", "0.20"],
                    vec!["Medium", "0.50"],
                ],
            ),
        ),
        (
            TableName::Offering,
            RawTable::new(
                ["Offering", "Description"],
                [
                    vec!["Managed Print", "Fleet management"],
                    vec!["Device Support", "Break/fix"],
                    vec!["Managed Print ", "Duplicate row"],
                    vec!["", "Blank row"],
                ],
            ),
        ),
        (TableName::Slc, RawTable::new(["SLC"], [vec!["Gold"], vec!["Silver"]])),
        (
            TableName::LaborByMachineCategory,
            RawTable::new(
                ["MC/RR", "Brazil", "Mexico", "Argentina"],
                [
                    vec!["MC-1", "1050", "21000", "300000"],
                    vec!["MC-2", "1575", "31500", "450000"],
                    vec!["Common", "800", "16000", "240000"],
                ],
            ),
        ),
        (
            TableName::LaborByBandRate,
            RawTable::new(
                ["MC/RR", "Brazil", "Mexico", "Argentina"],
                [
                    vec!["Band 6", "2100", "42000", "600000"],
                    vec!["Band 7", "2600", "n/a", "750000"],
                    vec!["Common", "900", "18000", "270000"],
                ],
            ),
        ),
    ]
}

pub(crate) fn store() -> ReferenceDataStore {
    ReferenceDataStore::load(reference_tables(), LoadMode::Strict).expect("fixture tables load")
}

pub(crate) fn ui_config() -> RawTable {
    RawTable::new(
        ["Field", "Label", "Section", "Source"],
        [
            vec!["quote_id", "Quote ID", "1. Sidebar", "generated"],
            vec!["country", "Country", "1. Sidebar", "countries.csv header"],
            vec!["currency", "Currency", "1. Sidebar", "USD / Local"],
            vec!["exchange_rate", "Exchange Rate", "1. Sidebar", "countries.csv row 1"],
            vec!["risk", "QA Risk", "1. Sidebar", "risk.csv"],
            vec!["customer", "Customer Name", "2. Service Module", "free text"],
            vec!["offering", "Offering", "2. Service Module", "offering.csv"],
            vec!["qty", "QTY", "2. Service Module", "numeric"],
            vec!["slc", "SLC", "2. Service Module", "slc.csv"],
            vec!["unit_cost", "Unit Cost USD", "2. Service Module", "numeric"],
            vec!["duration", "Duration (Months)", "2. Service Module", "numeric"],
            vec!["start_date", "Start Date", "2. Service Module", "date picker"],
            vec!["labor_mode", "MachCat / BandRate", "3. Management Module", "toggle"],
            vec!["labor_category", "MC / RR", "3. Management Module", "lplat.csv / lband.csv"],
            vec!["labor_cost", "Monthly Labor Cost", "3. Management Module", "lookup"],
            vec!["total_service", "Total Service", "4. Summary", "computed"],
            vec!["total_manage", "Total Manage", "4. Summary", "computed"],
            vec!["grand_total", "Grand Total", "4. Summary", "computed"],
            vec!["notes", "Internal Notes", "Hidden", ""],
        ],
    )
}

pub(crate) fn schema() -> FieldSchema {
    FieldSchema::parse(ui_config()).expect("fixture ui config parses")
}
