use pricebook_core::pricing::{PricingTrace, QuoteResult};
use pricebook_core::reference::{LookupWarning, TableName};
use pricebook_core::schema::FieldId;
use pricebook_core::session::FormSession;
use serde::Serialize;

use crate::commands::{CommandResult, GlobalArgs, Workspace, EXIT_INPUT};

#[derive(Debug, Serialize)]
struct QuoteReport {
    command: &'static str,
    status: &'static str,
    session_id: String,
    quote_reference: Option<String>,
    result: QuoteResult,
    trace: PricingTrace,
    warnings: Vec<WarningEntry>,
    missing_tables: Vec<TableName>,
}

#[derive(Debug, Serialize)]
struct WarningEntry {
    field: Option<String>,
    message: String,
    detail: LookupWarning,
}

impl WarningEntry {
    fn new(field: Option<&FieldId>, warning: &LookupWarning) -> Self {
        Self {
            field: field.map(ToString::to_string),
            message: warning.to_string(),
            detail: warning.clone(),
        }
    }
}

/// Applies `FIELD=VALUE` assignments in order to a fresh session and prices it.
pub fn run(args: &GlobalArgs, assignments: &[String]) -> CommandResult {
    let workspace = match Workspace::load("quote", args) {
        Ok(workspace) => workspace,
        Err(failure) => return failure,
    };
    let mut session = FormSession::with_policy(
        &workspace.schema,
        &workspace.store,
        workspace.config.pricing.policy(),
    );
    let session_id = session.id().to_string();

    for assignment in assignments {
        let Some((field, value)) = assignment.split_once('=') else {
            return CommandResult::failure(
                "quote",
                "invalid_input",
                format!("assignment `{assignment}` must look like FIELD=VALUE"),
                EXIT_INPUT,
            );
        };
        if let Err(error) = session.set(field, value) {
            return CommandResult::application_error("quote", error, &session_id);
        }
    }

    let outcome = match session.quote() {
        Ok(outcome) => outcome,
        Err(error) => return CommandResult::application_error("quote", error, &session_id),
    };

    let mut warnings = session
        .warnings()
        .map(|(field, warning)| WarningEntry::new(Some(field), warning))
        .collect::<Vec<_>>();
    warnings.extend(
        outcome
            .warnings
            .iter()
            .filter(|warning| !session.warnings().any(|(_, seen)| seen == *warning))
            .map(|warning| WarningEntry::new(None, warning)),
    );

    CommandResult::report(
        "quote",
        &QuoteReport {
            command: "quote",
            status: "ok",
            session_id,
            quote_reference: outcome.trace.quote_reference.clone(),
            result: outcome.result,
            trace: outcome.trace,
            warnings,
            missing_tables: workspace.store.missing_tables().to_vec(),
        },
    )
}
