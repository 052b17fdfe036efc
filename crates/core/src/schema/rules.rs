//! Ordered keyword rules used to classify UI-config rows. The first rule whose
//! keyword occurs in the text wins, so the order of each table is significant.

use crate::domain::QuoteMetric;
use crate::schema::field::{FieldRole, Section};

pub const SECTION_RULES: &[(&str, Section)] = &[
    ("sidebar", Section::Sidebar),
    ("service module", Section::ServiceModule),
    ("servicio", Section::ServiceModule),
    ("management", Section::LaborModule),
    ("labor", Section::LaborModule),
    ("summary", Section::Summary),
    ("result", Section::Summary),
];

/// Keywords are compared with whitespace removed, so `MC / RR` matches `mc/rr`.
pub const ROLE_RULES: &[(&str, FieldRole)] = &[
    ("grand total", FieldRole::Output(QuoteMetric::GrandTotal)),
    ("total service", FieldRole::Output(QuoteMetric::TotalServiceCost)),
    ("total manage", FieldRole::Output(QuoteMetric::TotalManageCost)),
    ("mc/rr", FieldRole::LaborCategory),
    ("machcat", FieldRole::LaborMode),
    ("band rate", FieldRole::LaborMode),
    ("labor cost", FieldRole::LaborCost),
    ("quote id", FieldRole::QuoteReference),
    ("quote ref", FieldRole::QuoteReference),
    ("customer", FieldRole::CustomerName),
    ("country", FieldRole::Country),
    ("currency", FieldRole::Currency),
    ("risk", FieldRole::RiskTier),
    ("exchange rate", FieldRole::ExchangeRate),
    ("offering", FieldRole::Offering),
    ("slc", FieldRole::Slc),
    ("qty", FieldRole::Quantity),
    ("quantity", FieldRole::Quantity),
    ("duration", FieldRole::Duration),
    ("cost", FieldRole::UnitCost),
    ("date", FieldRole::Date),
];

pub fn classify_section(raw: &str) -> Section {
    let haystack = raw.trim().to_lowercase();
    SECTION_RULES
        .iter()
        .find(|(keyword, _)| haystack.contains(keyword))
        .map(|(_, section)| *section)
        .unwrap_or(Section::Unclassified)
}

/// Label first; the source annotation is only consulted when the label matches nothing.
pub fn classify_role(label: &str, annotation: Option<&str>) -> FieldRole {
    match_role(label)
        .or_else(|| annotation.and_then(match_role))
        .unwrap_or(FieldRole::FreeText)
}

fn match_role(text: &str) -> Option<FieldRole> {
    let haystack = compact(text);
    if haystack.is_empty() {
        return None;
    }
    ROLE_RULES
        .iter()
        .find(|(keyword, _)| haystack.contains(&compact(keyword)))
        .map(|(_, role)| *role)
}

fn compact(text: &str) -> String {
    text.chars().filter(|ch| !ch.is_whitespace()).flat_map(char::to_lowercase).collect()
}
