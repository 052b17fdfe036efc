use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pricebook_core::reference::{RawTable, TableName};
use tracing::debug;

/// File-name keywords for the UI config, including a misspelling found in the wild.
pub const UI_CONFIG_KEYWORDS: [&str; 2] = ["ui_config", "ui_congif"];

pub fn table_keyword(name: TableName) -> &'static str {
    match name {
        TableName::Countries => "countries",
        TableName::Risk => "risk",
        TableName::Offering => "offering",
        TableName::Slc => "slc",
        TableName::LaborByMachineCategory => "lplat",
        TableName::LaborByBandRate => "lband",
    }
}

#[derive(Debug, Default)]
pub struct DiscoveredTables {
    pub ui_config: Option<RawTable>,
    pub reference: Vec<(TableName, RawTable)>,
    pub files: Vec<(String, PathBuf)>,
}

/// Reads every `.csv` file in `dir` whose name carries a known keyword. Files
/// are visited in name order and the first file per table wins.
pub fn discover(dir: &Path) -> Result<DiscoveredTables> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read reference directory `{}`", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to list reference directory `{}`", dir.display()))?
            .path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            paths.push(path);
        }
    }
    paths.sort();

    let mut discovered = DiscoveredTables::default();
    for path in paths {
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if UI_CONFIG_KEYWORDS.iter().any(|keyword| stem.contains(keyword)) {
            if discovered.ui_config.is_none() {
                discovered.ui_config = Some(read_csv(&path)?);
                discovered.files.push(("ui_config".to_string(), path));
            }
            continue;
        }

        let matched = TableName::ALL.into_iter().find(|name| stem.contains(table_keyword(*name)));
        let Some(name) = matched else {
            debug!(event_name = "reference.file_ignored", path = %path.display(), "no keyword");
            continue;
        };
        if discovered.reference.iter().any(|(existing, _)| *existing == name) {
            continue;
        }

        let table = read_csv(&path)?;
        debug!(
            event_name = "reference.file_loaded",
            table = %name,
            path = %path.display(),
            rows = table.rows.len(),
            "reference file loaded"
        );
        discovered.reference.push((name, table));
        discovered.files.push((name.key().to_string(), path));
    }

    Ok(discovered)
}

/// Whole file as strings; ragged rows are kept and padded later by the store.
pub fn read_csv(path: &Path) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open `{}`", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read header row of `{}`", path.display()))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record
            .with_context(|| format!("failed to read row {} of `{}`", line + 1, path.display()))?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    Ok(RawTable::new(headers, rows))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pricebook_core::reference::TableName;
    use tempfile::TempDir;

    use super::{discover, read_csv};

    #[test]
    fn discovery_matches_keywords_case_insensitively() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("UI_Congif.csv"), "Field,Section\nqty,Service Module\n")
            .expect("ui config");
        fs::write(dir.path().join("Data_LPLAT.csv"), "MC/RR,Brazil\nMC-1,1050\n").expect("lplat");
        fs::write(dir.path().join("notes.txt"), "risk").expect("notes");

        let discovered = discover(dir.path()).expect("discover");
        assert!(discovered.ui_config.is_some());
        assert_eq!(discovered.reference.len(), 1);
        assert_eq!(discovered.reference[0].0, TableName::LaborByMachineCategory);
    }

    #[test]
    fn csv_cells_are_trimmed_and_ragged_rows_survive() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("countries.csv");
        fs::write(&path, "Field, Name , Brazil \nExchange Rate,er,5.25\nshort\n").expect("write");

        let table = read_csv(&path).expect("read");
        assert_eq!(table.headers, vec!["Field", "Name", "Brazil"]);
        assert_eq!(table.rows, vec![vec!["Exchange Rate", "er", "5.25"], vec!["short"]]);
    }
}
