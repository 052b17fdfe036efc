use pricebook_core::config::AppConfig;
use pricebook_core::reference::{LoadMode, ReferenceDataStore, TableName};
use pricebook_core::schema::FieldSchema;
use pricebook_core::session::FormSession;
use serde::Serialize;

use crate::commands::{CommandResult, GlobalArgs, EXIT_CONFIG, EXIT_REFERENCE};
use crate::tables::{self, table_keyword, DiscoveredTables};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, because: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {because}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(args: &GlobalArgs, json_output: bool) -> CommandResult {
    let (report, exit_code) = build_report(args);

    if json_output {
        let mut result = CommandResult::report("doctor", &report);
        if result.exit_code == 0 {
            result.exit_code = exit_code;
        }
        return result;
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report(args: &GlobalArgs) -> (DoctorReport, u8) {
    let mut checks = Vec::new();
    let exit_code = match args.load_config() {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            run_reference_checks(&config, &mut checks);
            EXIT_REFERENCE
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["reference_files", "reference_tables", "field_schema", "quote_smoke"] {
                checks.push(DoctorCheck::skipped(name, "configuration did not load"));
            }
            EXIT_CONFIG
        }
    };

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    (DoctorReport { overall_status, summary, checks }, if all_pass { 0 } else { exit_code })
}

fn run_reference_checks(config: &AppConfig, checks: &mut Vec<DoctorCheck>) {
    let data_dir = &config.reference.data_dir;
    let discovered = match tables::discover(data_dir) {
        Ok(discovered) => discovered,
        Err(error) => {
            checks.push(DoctorCheck::fail("reference_files", format!("{error:#}")));
            for name in ["reference_tables", "field_schema", "quote_smoke"] {
                checks.push(DoctorCheck::skipped(name, "reference files could not be read"));
            }
            return;
        }
    };
    checks.push(check_reference_files(&discovered, &data_dir.display().to_string()));

    let DiscoveredTables { ui_config, reference, .. } = discovered;

    // always strict here, so a lenient runtime still learns about missing tables
    let store = match ReferenceDataStore::load(reference, LoadMode::Strict) {
        Ok(store) => {
            checks.push(DoctorCheck::pass(
                "reference_tables",
                format!("all {} reference tables loaded", TableName::ALL.len()),
            ));
            Some(store)
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("reference_tables", error.to_string()));
            None
        }
    };

    let schema = match ui_config.map(FieldSchema::parse) {
        Some(Ok(schema)) => {
            checks.push(DoctorCheck::pass(
                "field_schema",
                format!("{} fields parsed", schema.fields().len()),
            ));
            Some(schema)
        }
        Some(Err(error)) => {
            checks.push(DoctorCheck::fail("field_schema", error.to_string()));
            None
        }
        None => {
            checks.push(DoctorCheck::fail("field_schema", "no UI config file found"));
            None
        }
    };

    match (store, schema) {
        (Some(store), Some(schema)) => checks.push(check_quote_smoke(config, &store, &schema)),
        _ => checks.push(DoctorCheck::skipped("quote_smoke", "reference data did not load")),
    }
}

fn check_reference_files(discovered: &DiscoveredTables, data_dir: &str) -> DoctorCheck {
    let missing = TableName::ALL
        .into_iter()
        .filter(|name| !discovered.reference.iter().any(|(found, _)| found == name))
        .map(|name| format!("{name} (*{}*.csv)", table_keyword(name)))
        .collect::<Vec<_>>();

    if discovered.ui_config.is_none() || !missing.is_empty() {
        let mut details = Vec::new();
        if discovered.ui_config.is_none() {
            details.push("ui_config (*ui_config*.csv)".to_string());
        }
        details.extend(missing);
        return DoctorCheck::fail(
            "reference_files",
            format!("missing in `{data_dir}`: {}", details.join(", ")),
        );
    }

    let found = discovered
        .files
        .iter()
        .map(|(name, path)| format!("{name}={}", path.display()))
        .collect::<Vec<_>>();
    DoctorCheck::pass("reference_files", found.join(", "))
}

fn check_quote_smoke(
    config: &AppConfig,
    store: &ReferenceDataStore,
    schema: &FieldSchema,
) -> DoctorCheck {
    let mut session = FormSession::with_policy(schema, store, config.pricing.policy());
    match session.quote() {
        Ok(outcome) => DoctorCheck::pass(
            "quote_smoke",
            format!(
                "default session priced: grand total {} with {} warning(s)",
                outcome.result.grand_total,
                outcome.warnings.len()
            ),
        ),
        Err(error) => DoctorCheck::fail("quote_smoke", error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
