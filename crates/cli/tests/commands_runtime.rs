use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use pricebook_cli::commands::{config, doctor, fields, quote, GlobalArgs};
use serde_json::Value;
use tempfile::TempDir;

const UI_CONFIG: &str = "\
Field,Label,Section,Source
quote_id,Quote ID,1. Sidebar,generated
country,Country,1. Sidebar,countries.csv header
currency,Currency,1. Sidebar,USD / Local
exchange_rate,Exchange Rate,1. Sidebar,countries.csv row 1
risk,QA Risk,1. Sidebar,risk.csv
customer,Customer Name,2. Service Module,free text
offering,Offering,2. Service Module,offering.csv
qty,QTY,2. Service Module,numeric
slc,SLC,2. Service Module,slc.csv
unit_cost,Unit Cost USD,2. Service Module,numeric
duration,Duration (Months),2. Service Module,numeric
labor_mode,MachCat / BandRate,3. Management Module,toggle
labor_category,MC / RR,3. Management Module,lplat.csv / lband.csv
labor_cost,Monthly Labor Cost,3. Management Module,lookup
grand_total,Grand Total,4. Summary,computed
";

fn write_reference_files(dir: &Path) {
    let files = [
        ("ui_config.csv", UI_CONFIG),
        (
            "countries.csv",
            "Field,Name, Brazil ,Mexico,Argentina\n\
             Currency,currency,BRL,MXN,ARS\n\
             Exchange Rate,er,5.25,17.10,0\n",
        ),
        ("risk.csv", "Risk,Contingency\nLow,0.05\nMedium,0.10\nHigh,0.20\n"),
        ("offering.csv", "Offering\nManaged Print\nDevice Support\n"),
        ("slc.csv", "SLC\nGold\nSilver\n"),
        ("lplat.csv", "MC/RR,Brazil,Mexico,Argentina\nMC-1,1050,21000,300000\nCommon,800,16000,240000\n"),
        ("lband.csv", "MC/RR,Brazil,Mexico,Argentina\nBand 6,2100,42000,600000\nCommon,900,18000,270000\n"),
    ];
    for (name, contents) in files {
        fs::write(dir.join(name), contents).expect("reference fixture should be writable");
    }
}

fn args_for(dir: &Path) -> GlobalArgs {
    GlobalArgs { config_path: None, data_dir: Some(dir.to_path_buf()) }
}

fn assignments(pairs: &[&str]) -> Vec<String> {
    pairs.iter().map(|pair| pair.to_string()).collect()
}

#[test]
fn quote_prices_assignments_end_to_end() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        write_reference_files(dir.path());

        let result = quote::run(
            &args_for(dir.path()),
            &assignments(&[
                "quote_id=Q-42",
                "country=Brazil",
                "currency=Local",
                "risk=Medium",
                "qty=2",
                "duration=12",
                "unit_cost=100",
                "labor_category=MC-1",
            ]),
        );
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "quote");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["quote_reference"], "Q-42");
        assert_eq!(payload["result"]["total_service_cost"], "2640.00");
        assert_eq!(payload["result"]["exchange_rate"], "5.25");
        assert_eq!(decimal(&payload["result"]["total_manage_cost"]), 2400.0);
        assert_eq!(decimal(&payload["result"]["grand_total"]), 5040.0);
        assert_eq!(payload["warnings"].as_array().map(Vec::len), Some(0));
    });
}

#[test]
fn quote_reports_zero_exchange_rate_as_warning_not_error() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        write_reference_files(dir.path());

        let result = quote::run(
            &args_for(dir.path()),
            &assignments(&["country=Argentina", "currency=Local", "unit_cost=10"]),
        );
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(decimal(&payload["result"]["total_manage_cost"]), 0.0);
        let kinds = payload["warnings"]
            .as_array()
            .map(|warnings| {
                warnings.iter().map(|warning| warning["detail"]["kind"].clone()).collect::<Vec<_>>()
            })
            .unwrap_or_default();
        assert!(kinds.contains(&Value::from("zero_exchange_rate")), "warnings: {kinds:?}");
    });
}

#[test]
fn quote_rejects_invalid_input_with_field_context() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        write_reference_files(dir.path());

        let result = quote::run(&args_for(dir.path()), &assignments(&["qty=two"]));
        assert_eq!(result.exit_code, 4);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invalid_input");
        assert!(payload["message"].as_str().unwrap_or_default().contains("qty"));

        let malformed = quote::run(&args_for(dir.path()), &assignments(&["country"]));
        assert_eq!(malformed.exit_code, 4);

        let read_only = quote::run(&args_for(dir.path()), &assignments(&["grand_total=1"]));
        assert_eq!(read_only.exit_code, 4);
    });
}

#[test]
fn strict_mode_fails_when_a_table_is_missing() {
    with_env(&[("PRICEBOOK_REFERENCE_STRICT", "true")], || {
        let dir = TempDir::new().expect("tempdir");
        write_reference_files(dir.path());
        fs::remove_file(dir.path().join("slc.csv")).expect("remove slc");

        let result = quote::run(&args_for(dir.path()), &[]);
        assert_eq!(result.exit_code, 3);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "configuration");
        assert!(payload["message"].as_str().unwrap_or_default().contains("slc"));
    });
}

#[test]
fn lenient_mode_substitutes_missing_table() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        write_reference_files(dir.path());
        fs::remove_file(dir.path().join("slc.csv")).expect("remove slc");

        let result = quote::run(&args_for(dir.path()), &[]);
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["missing_tables"], serde_json::json!(["slc"]));
    });
}

#[test]
fn missing_ui_config_is_a_configuration_error() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        write_reference_files(dir.path());
        fs::remove_file(dir.path().join("ui_config.csv")).expect("remove ui config");

        let result = fields::run(&args_for(dir.path()), None);
        assert_eq!(result.exit_code, 3);
        assert_eq!(parse_payload(&result.output)["error_class"], "configuration");
    });
}

#[test]
fn fields_lists_a_section_with_defaults_and_options() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        write_reference_files(dir.path());

        let result = fields::run(&args_for(dir.path()), Some("Management"));
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        let ids = payload["fields"]
            .as_array()
            .map(|fields| fields.iter().map(|field| field["id"].clone()).collect::<Vec<_>>())
            .unwrap_or_default();
        assert_eq!(ids, vec!["labor_mode", "labor_category", "labor_cost"]);
        assert_eq!(payload["fields"][0]["value"]["value"], "Machine Category");
        assert_eq!(payload["fields"][1]["options"], serde_json::json!(["MC-1", "Common"]));
    });
}

#[test]
fn fields_without_section_lists_schema_in_order() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        write_reference_files(dir.path());

        let all = parse_payload(&fields::run(&args_for(dir.path()), None).output);
        assert_eq!(all["fields"].as_array().map(Vec::len), Some(15));
        assert_eq!(all["fields"][0]["id"], "quote_id");
        assert_eq!(all["fields"][0]["value"]["value"], "COT-001");

        let summary = parse_payload(&fields::run(&args_for(dir.path()), Some("summary")).output);
        assert_eq!(summary["section"], "summary");
        assert_eq!(summary["fields"].as_array().map(Vec::len), Some(1));
        assert_eq!(summary["fields"][0]["id"], "grand_total");
    });
}

#[test]
fn quote_survives_out_of_range_unit_cost() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        write_reference_files(dir.path());

        let result = quote::run(
            &args_for(dir.path()),
            &assignments(&["unit_cost=79228162514264337593543950335", "qty=2"]),
        );
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(decimal(&payload["result"]["total_service_cost"]), 0.0);
        let overflowed = payload["warnings"].as_array().is_some_and(|warnings| {
            warnings.iter().any(|warning| warning["detail"]["kind"] == "arithmetic_overflow")
        });
        assert!(overflowed, "warnings: {}", payload["warnings"]);
    });
}

#[test]
fn config_reports_sources() {
    with_env(&[("PRICEBOOK_LABOR_COST_CURRENCY", "usd")], || {
        let dir = TempDir::new().expect("tempdir");

        let result = config::run(&args_for(dir.path()));
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("(source: cli (--data-dir))"));
        assert!(result
            .output
            .contains("pricing.labor_cost_currency = usd (no conversion) (source: env"));
        assert!(result.output.contains("logging.level = info (source: default)"));
    });
}

#[test]
fn config_failure_uses_config_exit_code() {
    with_env(&[("PRICEBOOK_LOG_FORMAT", "xml")], || {
        let dir = TempDir::new().expect("tempdir");

        let result = config::run(&args_for(dir.path()));
        assert_eq!(result.exit_code, 2);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or_default().contains("PRICEBOOK_LOG_FORMAT"));
    });
}

#[test]
fn doctor_passes_on_complete_reference_data() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        write_reference_files(dir.path());

        let result = doctor::run(&args_for(dir.path()), true);
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        assert_eq!(payload["checks"].as_array().map(Vec::len), Some(5));
    });
}

#[test]
fn doctor_flags_missing_tables_and_skips_smoke() {
    with_env(&[], || {
        let dir = TempDir::new().expect("tempdir");
        write_reference_files(dir.path());
        fs::remove_file(dir.path().join("lband.csv")).expect("remove lband");

        let result = doctor::run(&args_for(dir.path()), false);
        assert_eq!(result.exit_code, 3);
        assert!(result.output.contains("- [fail] reference_files: missing in"));
        assert!(result.output.contains("lband"));
        assert!(result.output.contains("- [skip] quote_smoke"));
    });
}

fn decimal(value: &Value) -> f64 {
    value.as_str().and_then(|raw| raw.parse::<f64>().ok()).unwrap_or(f64::NAN)
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PRICEBOOK_DATA_DIR",
        "PRICEBOOK_REFERENCE_STRICT",
        "PRICEBOOK_LABOR_COST_CURRENCY",
        "PRICEBOOK_LOGGING_LEVEL",
        "PRICEBOOK_LOGGING_FORMAT",
        "PRICEBOOK_LOG_LEVEL",
        "PRICEBOOK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
