use pricebook_core::schema::{classify_section, FieldRole, Section, ValueSource};
use pricebook_core::session::{FieldValue, FormSession};
use serde::Serialize;

use crate::commands::{CommandResult, GlobalArgs, Workspace};

#[derive(Debug, Serialize)]
struct FieldsReport {
    command: &'static str,
    status: &'static str,
    section: Option<Section>,
    fields: Vec<FieldEntry>,
}

#[derive(Debug, Serialize)]
struct FieldEntry {
    id: String,
    label: String,
    section: Section,
    role: FieldRole,
    source: ValueSource,
    depends_on: Vec<String>,
    value: FieldValue,
    options: Vec<String>,
}

/// Lists fields with their default-session values. `section` is classified with
/// the same keyword rules as the UI config.
pub fn run(args: &GlobalArgs, section: Option<&str>) -> CommandResult {
    let workspace = match Workspace::load("fields", args) {
        Ok(workspace) => workspace,
        Err(failure) => return failure,
    };
    let session = FormSession::with_policy(
        &workspace.schema,
        &workspace.store,
        workspace.config.pricing.policy(),
    );
    let section = section.map(|name| match name.trim().to_ascii_lowercase().as_str() {
        "unclassified" | "hidden" => Section::Unclassified,
        _ => classify_section(name),
    });

    let definitions = match section {
        Some(section) => workspace.schema.list_fields_by_section(section),
        None => workspace.schema.fields().iter().collect(),
    };
    let fields = definitions
        .into_iter()
        .map(|field| FieldEntry {
            id: field.id.to_string(),
            label: field.label.clone(),
            section: field.section,
            role: field.role,
            source: field.value_source.clone(),
            depends_on: field.depends_on.iter().map(ToString::to_string).collect(),
            value: session.get(field.id.as_str()).cloned().unwrap_or_default(),
            options: session.options(field.id.as_str()).unwrap_or_default(),
        })
        .collect();

    let report = FieldsReport { command: "fields", status: "ok", section, fields };
    CommandResult::report("fields", &report)
}
