pub mod value;

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{CurrencyMode, LaborMode};
use crate::errors::InputError;
use crate::pricing::{
    resolve_exchange_rate, resolve_monthly_labor, DeterministicPricingEngine, PricingEngine,
    PricingPolicy, QuoteInputs, QuoteOutcome,
};
use crate::reference::table::parse_decimal;
use crate::reference::{Lookup, LookupWarning, ReferenceDataStore};
use crate::schema::{FieldDefinition, FieldId, FieldRole, FieldSchema, NumericRule, ValueSource};

pub use value::FieldValue;

const DEFAULT_QUANTITY: u32 = 1;
const DEFAULT_DURATION_MONTHS: u32 = 12;
const DEFAULT_QUOTE_REFERENCE: &str = "COT-001";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One quoting session: the current value of every schema field, kept
/// consistent with the reference data after each accepted assignment.
///
/// The session borrows the schema and the reference store; both outlive it and
/// may be shared by any number of sessions.
#[derive(Debug)]
pub struct FormSession<'a> {
    id: SessionId,
    schema: &'a FieldSchema,
    store: &'a ReferenceDataStore,
    engine: DeterministicPricingEngine,
    values: BTreeMap<FieldId, FieldValue>,
    warnings: BTreeMap<FieldId, LookupWarning>,
}

impl<'a> FormSession<'a> {
    pub fn new(schema: &'a FieldSchema, store: &'a ReferenceDataStore) -> Self {
        Self::with_policy(schema, store, PricingPolicy::default())
    }

    pub fn with_policy(
        schema: &'a FieldSchema,
        store: &'a ReferenceDataStore,
        policy: PricingPolicy,
    ) -> Self {
        let mut session = Self {
            id: SessionId::new(),
            schema,
            store,
            engine: DeterministicPricingEngine::new(policy),
            values: BTreeMap::new(),
            warnings: BTreeMap::new(),
        };

        for field in schema.topological_order() {
            let initial = session.default_value(field);
            session.values.insert(field.id.clone(), initial);
        }

        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn schema(&self) -> &'a FieldSchema {
        self.schema
    }

    pub fn get(&self, field_id: &str) -> Result<&FieldValue, InputError> {
        let field = self.definition(field_id)?;
        Ok(self.values.get(&field.id).unwrap_or(&FieldValue::Unset))
    }

    /// Validates and stores `raw`, then re-derives every field that depends on
    /// it. A rejected value leaves the session untouched.
    pub fn set(&mut self, field_id: &str, raw: &str) -> Result<(), InputError> {
        let field = self.definition(field_id)?;
        if field.value_source.is_computed() {
            return Err(InputError::ReadOnlyField(field.id.clone()));
        }

        let value = self.parse_value(field, raw)?;
        debug!(
            event_name = "session.field_set",
            session_id = %self.id,
            field = %field.id,
            value = %value,
            "field assigned"
        );
        self.values.insert(field.id.clone(), value);

        let schema = self.schema;
        for dependent in schema.dependents_of(&field.id) {
            self.refresh(dependent);
        }
        self.clear_outputs();

        Ok(())
    }

    /// Current option list of a choice field; empty for every other kind.
    pub fn options(&self, field_id: &str) -> Result<Vec<String>, InputError> {
        let field = self.definition(field_id)?;
        Ok(self.options_for(field).value)
    }

    /// Fallbacks taken during the latest derivation of each field.
    pub fn warnings(&self) -> impl Iterator<Item = (&FieldId, &LookupWarning)> + '_ {
        self.warnings.iter()
    }

    /// Fields in schema order with their current values.
    pub fn iter(&self) -> impl Iterator<Item = (&'a FieldDefinition, &FieldValue)> + '_ {
        self.schema
            .fields()
            .iter()
            .map(|field| (field, self.values.get(&field.id).unwrap_or(&FieldValue::Unset)))
    }

    pub fn quote_inputs(&self) -> Result<QuoteInputs, InputError> {
        Ok(QuoteInputs {
            quote_reference: self.text(FieldRole::QuoteReference),
            customer_name: self.text(FieldRole::CustomerName),
            country: self.text(FieldRole::Country),
            currency: self.currency(),
            quantity: self.count(FieldRole::Quantity)?,
            duration_months: self.count(FieldRole::Duration)?,
            unit_cost_usd: self.number(FieldRole::UnitCost)?,
            risk_tier: self.text(FieldRole::RiskTier),
            offering: self.text(FieldRole::Offering),
            slc: self.text(FieldRole::Slc),
            labor_mode: self.labor_mode(),
            labor_category: self.text(FieldRole::LaborCategory),
        })
    }

    /// Re-derives every computed field, prices the snapshot and fills the
    /// summary fields from the result.
    pub fn quote(&mut self) -> Result<QuoteOutcome, InputError> {
        let schema = self.schema;
        for field in schema.topological_order() {
            self.refresh(field);
        }

        let inputs = self.quote_inputs()?;
        let outcome = self.engine.price(&inputs, self.store);

        for field in schema.fields() {
            if let ValueSource::QuoteOutput { metric } = field.value_source {
                self.values
                    .insert(field.id.clone(), FieldValue::Number(outcome.result.metric(metric)));
            }
        }
        info!(
            event_name = "session.quoted",
            session_id = %self.id,
            grand_total = %outcome.result.grand_total,
            "session quoted"
        );

        Ok(outcome)
    }

    fn definition(&self, field_id: &str) -> Result<&'a FieldDefinition, InputError> {
        let schema = self.schema;
        schema.field(field_id).ok_or_else(|| InputError::UnknownField(FieldId::from(field_id)))
    }

    fn default_value(&mut self, field: &FieldDefinition) -> FieldValue {
        match &field.value_source {
            ValueSource::NumericInput(_) => match field.role {
                FieldRole::Quantity => FieldValue::Number(Decimal::from(DEFAULT_QUANTITY)),
                FieldRole::Duration => FieldValue::Number(Decimal::from(DEFAULT_DURATION_MONTHS)),
                _ => FieldValue::Number(Decimal::ZERO),
            },
            source if source.is_choice() => {
                let options = self.record(field, self.options_for(field));
                options.into_iter().next().map(FieldValue::Text).unwrap_or_default()
            }
            ValueSource::ComputedExchangeRate | ValueSource::ComputedLaborCost => {
                self.derive(field)
            }
            _ if field.role == FieldRole::QuoteReference => {
                FieldValue::Text(DEFAULT_QUOTE_REFERENCE.to_string())
            }
            _ => FieldValue::Unset,
        }
    }

    /// Brings one field back in line with the values it depends on.
    fn refresh(&mut self, field: &FieldDefinition) {
        match &field.value_source {
            ValueSource::ComputedExchangeRate | ValueSource::ComputedLaborCost => {
                let value = self.derive(field);
                self.values.insert(field.id.clone(), value);
            }
            source if source.is_choice() => {
                let options = self.record(field, self.options_for(field));
                let current = self.values.get(&field.id).and_then(FieldValue::as_text);
                if let Some(current) = current.filter(|value| !options.iter().any(|o| o == value)) {
                    info!(
                        event_name = "session.option_cleared",
                        session_id = %self.id,
                        field = %field.id,
                        previous = current,
                        "selection no longer offered; cleared"
                    );
                    self.values.insert(field.id.clone(), FieldValue::Unset);
                }
            }
            _ => {}
        }
    }

    fn derive(&mut self, field: &FieldDefinition) -> FieldValue {
        let lookup = match field.value_source {
            ValueSource::ComputedExchangeRate => resolve_exchange_rate(
                self.store,
                self.currency(),
                self.text(FieldRole::Country).as_deref(),
            ),
            ValueSource::ComputedLaborCost => resolve_monthly_labor(
                self.store,
                self.labor_mode(),
                self.text(FieldRole::LaborCategory).as_deref(),
                self.text(FieldRole::Country).as_deref(),
            ),
            _ => return FieldValue::Unset,
        };
        FieldValue::Number(self.record(field, lookup))
    }

    fn record<T>(&mut self, field: &FieldDefinition, lookup: Lookup<T>) -> T {
        let (value, warning) = lookup.into_parts();
        match warning {
            Some(warning) => self.warnings.insert(field.id.clone(), warning),
            None => self.warnings.remove(&field.id),
        };
        value
    }

    fn clear_outputs(&mut self) {
        for field in self.schema.fields() {
            if matches!(field.value_source, ValueSource::QuoteOutput { .. }) {
                self.values.insert(field.id.clone(), FieldValue::Unset);
            }
        }
    }

    fn options_for(&self, field: &FieldDefinition) -> Lookup<Vec<String>> {
        match &field.value_source {
            ValueSource::EnumFromTable { table, column } => self.store.options(*table, column),
            ValueSource::CountryList => Lookup::found(self.store.list_countries()),
            ValueSource::CurrencyModes => Lookup::found(
                CurrencyMode::OPTIONS.iter().map(|mode| mode.label().to_string()).collect(),
            ),
            ValueSource::LaborModes => Lookup::found(
                LaborMode::OPTIONS.iter().map(|mode| mode.label().to_string()).collect(),
            ),
            ValueSource::LaborCategories => self.store.labor_categories(self.labor_mode()),
            _ => Lookup::found(Vec::new()),
        }
    }

    fn parse_value(&self, field: &FieldDefinition, raw: &str) -> Result<FieldValue, InputError> {
        let raw = raw.trim();
        let invalid = |reason: String| InputError::InvalidValue { field: field.id.clone(), reason };

        match &field.value_source {
            ValueSource::NumericInput(rule) => parse_number(raw, rule).map_err(invalid),
            ValueSource::DateInput if raw.is_empty() => Ok(FieldValue::Unset),
            ValueSource::DateInput => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(FieldValue::Date)
                .map_err(|_| invalid(format!("`{raw}` is not a date (expected YYYY-MM-DD)"))),
            ValueSource::CurrencyModes => raw
                .parse::<CurrencyMode>()
                .map(|mode| FieldValue::Text(mode.label().to_string()))
                .map_err(|_| self.invalid_option(field, raw)),
            ValueSource::LaborModes => raw
                .parse::<LaborMode>()
                .map(|mode| FieldValue::Text(mode.label().to_string()))
                .map_err(|_| self.invalid_option(field, raw)),
            source if source.is_choice() => self
                .options_for(field)
                .value
                .into_iter()
                .find(|option| option.eq_ignore_ascii_case(raw))
                .map(FieldValue::Text)
                .ok_or_else(|| self.invalid_option(field, raw)),
            _ if raw.is_empty() => Ok(FieldValue::Unset),
            _ => Ok(FieldValue::Text(raw.to_string())),
        }
    }

    fn invalid_option(&self, field: &FieldDefinition, raw: &str) -> InputError {
        InputError::InvalidOption { field: field.id.clone(), value: raw.to_string() }
    }

    fn role_value(&self, role: FieldRole) -> Option<&FieldValue> {
        self.schema.field_for_role(role).and_then(|field| self.values.get(&field.id))
    }

    fn text(&self, role: FieldRole) -> Option<String> {
        self.role_value(role).and_then(FieldValue::as_text).map(str::to_string)
    }

    fn currency(&self) -> CurrencyMode {
        self.text(FieldRole::Currency).and_then(|value| value.parse().ok()).unwrap_or_default()
    }

    fn labor_mode(&self) -> LaborMode {
        self.text(FieldRole::LaborMode).and_then(|value| value.parse().ok()).unwrap_or_default()
    }

    fn number(&self, role: FieldRole) -> Result<Decimal, InputError> {
        self.role_value(role).and_then(FieldValue::as_number).ok_or(InputError::MissingValue(role))
    }

    fn count(&self, role: FieldRole) -> Result<u32, InputError> {
        self.number(role)?.to_u32().ok_or(InputError::MissingValue(role))
    }
}

fn parse_number(raw: &str, rule: &NumericRule) -> Result<FieldValue, String> {
    let value = parse_decimal(raw).ok_or_else(|| format!("`{raw}` is not a number"))?;
    if value < rule.minimum {
        return Err(format!("must be at least {}", rule.minimum));
    }
    if rule.integer && (!value.fract().is_zero() || value.to_u32().is_none()) {
        return Err(format!("`{raw}` must be a whole number"));
    }
    Ok(FieldValue::Number(value))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{FieldValue, FormSession};
    use crate::errors::InputError;
    use crate::fixtures;
    use crate::pricing::{LaborCostCurrency, PricingPolicy};
    use crate::reference::{LookupWarning, TableName};
    use crate::schema::{FieldId, FieldRole};

    fn number(value: i64, scale: u32) -> FieldValue {
        FieldValue::Number(Decimal::new(value, scale))
    }

    fn text(value: &str) -> FieldValue {
        FieldValue::Text(value.to_string())
    }

    #[test]
    fn new_session_starts_from_defaults() {
        let (schema, store) = (fixtures::schema(), fixtures::store());
        let session = FormSession::new(&schema, &store);

        assert_eq!(session.get("currency"), Ok(&text("USD")));
        assert_eq!(session.get("labor_mode"), Ok(&text("Machine Category")));
        assert_eq!(session.get("country"), Ok(&text("Brazil")));
        assert_eq!(session.get("risk"), Ok(&text("Low")));
        assert_eq!(session.get("labor_category"), Ok(&text("MC-1")));
        assert_eq!(session.get("qty"), Ok(&number(1, 0)));
        assert_eq!(session.get("duration"), Ok(&number(12, 0)));
        assert_eq!(session.get("unit_cost"), Ok(&number(0, 0)));
        assert_eq!(session.get("exchange_rate"), Ok(&number(1, 0)));
        assert_eq!(session.get("labor_cost"), Ok(&number(1050, 0)));
        assert_eq!(session.get("customer"), Ok(&FieldValue::Unset));
        assert_eq!(session.get("grand_total"), Ok(&FieldValue::Unset));
    }

    #[test]
    fn exchange_rate_follows_country_and_currency() {
        let (schema, store) = (fixtures::schema(), fixtures::store());
        let mut session = FormSession::new(&schema, &store);

        session.set("country", "Brazil").expect("country");
        session.set("currency", "Local").expect("currency");
        assert_eq!(session.get("exchange_rate"), Ok(&number(525, 2)));

        session.set("country", "Mexico").expect("country");
        assert_eq!(session.get("exchange_rate"), Ok(&number(1710, 2)));

        session.set("currency", "usd").expect("currency");
        assert_eq!(session.get("exchange_rate"), Ok(&number(1, 0)));
        assert_eq!(session.get("currency"), Ok(&text("USD")));
    }

    #[test]
    fn labor_mode_switch_replaces_options_and_clears_stale_category() {
        let (schema, store) = (fixtures::schema(), fixtures::store());
        let mut session = FormSession::new(&schema, &store);

        session.set("labor_mode", "Band Rate").expect("mode");
        assert_eq!(
            session.options("labor_category"),
            Ok(vec!["Band 6".to_string(), "Band 7".to_string(), "Common".to_string()])
        );
        assert_eq!(session.get("labor_category"), Ok(&FieldValue::Unset));
        assert_eq!(session.get("labor_cost"), Ok(&number(0, 0)));
        assert!(matches!(
            session.warnings().find(|(id, _)| id.as_str() == "labor_cost"),
            Some((_, LookupWarning::UnknownCategory { table: TableName::LaborByBandRate, .. }))
        ));

        session.set("labor_category", "Common").expect("category");
        assert_eq!(session.get("labor_cost"), Ok(&number(900, 0)));

        session.set("labor_mode", "Machine Category").expect("mode");
        assert_eq!(session.get("labor_category"), Ok(&text("Common")));
        assert_eq!(session.get("labor_cost"), Ok(&number(800, 0)));
        assert!(session.warnings().all(|(id, _)| id.as_str() != "labor_cost"));
    }

    #[test]
    fn choices_are_matched_case_insensitively_to_their_canonical_text() {
        let (schema, store) = (fixtures::schema(), fixtures::store());
        let mut session = FormSession::new(&schema, &store);

        session.set("country", " mexico ").expect("country");
        session.set("labor_mode", "Brand Rate Full").expect("mode");

        assert_eq!(session.get("country"), Ok(&text("Mexico")));
        assert_eq!(session.get("labor_mode"), Ok(&text("Band Rate")));
    }

    #[test]
    fn rejected_values_leave_state_unchanged() {
        let (schema, store) = (fixtures::schema(), fixtures::store());
        let mut session = FormSession::new(&schema, &store);
        session.set("qty", "3").expect("qty");

        for raw in ["abc", "0", "1.5", "-2"] {
            assert!(
                matches!(session.set("qty", raw), Err(InputError::InvalidValue { .. })),
                "qty `{raw}` should be rejected"
            );
        }
        assert_eq!(session.get("qty"), Ok(&number(3, 0)));

        assert_eq!(
            session.set("risk", "Extreme"),
            Err(InputError::InvalidOption {
                field: FieldId::from("risk"),
                value: "Extreme".to_string()
            })
        );
        assert_eq!(session.get("risk"), Ok(&text("Low")));

        assert!(matches!(session.set("currency", "EUR"), Err(InputError::InvalidOption { .. })));
        assert!(matches!(
            session.set("start_date", "03/01/2024"),
            Err(InputError::InvalidValue { .. })
        ));
    }

    #[test]
    fn computed_and_unknown_fields_are_rejected() {
        let (schema, store) = (fixtures::schema(), fixtures::store());
        let mut session = FormSession::new(&schema, &store);

        assert_eq!(
            session.set("exchange_rate", "3"),
            Err(InputError::ReadOnlyField(FieldId::from("exchange_rate")))
        );
        assert_eq!(
            session.set("grand_total", "3"),
            Err(InputError::ReadOnlyField(FieldId::from("grand_total")))
        );
        assert_eq!(session.get("nope"), Err(InputError::UnknownField(FieldId::from("nope"))));
        assert!(session.options("nope").is_err());
    }

    #[test]
    fn text_and_date_fields_store_trimmed_values() {
        let (schema, store) = (fixtures::schema(), fixtures::store());
        let mut session = FormSession::new(&schema, &store);

        session.set("customer", "  Acme Corp ").expect("customer");
        session.set("start_date", "2024-03-01").expect("date");

        assert_eq!(session.get("customer"), Ok(&text("Acme Corp")));
        assert_eq!(
            session.get("start_date").map(FieldValue::as_date),
            Ok(NaiveDate::from_ymd_opt(2024, 3, 1))
        );

        session.set("customer", "").expect("clear");
        assert_eq!(session.get("customer"), Ok(&FieldValue::Unset));
    }

    #[test]
    fn quote_fills_summary_fields_until_next_mutation() {
        let (schema, store) = (fixtures::schema(), fixtures::store());
        let mut session = FormSession::new(&schema, &store);

        for (field, value) in [
            ("quote_id", "Q-2024-001"),
            ("country", "Brazil"),
            ("currency", "Local"),
            ("risk", "Medium"),
            ("qty", "2"),
            ("duration", "12"),
            ("unit_cost", "100"),
            ("labor_category", "MC-1"),
        ] {
            session.set(field, value).expect(field);
        }

        let outcome = session.quote().expect("quote");
        assert_eq!(outcome.result.total_service_cost, Decimal::new(2640, 0));
        assert_eq!(outcome.result.total_manage_cost, Decimal::new(2400, 0));
        assert_eq!(outcome.result.grand_total, Decimal::new(5040, 0));
        assert_eq!(outcome.trace.quote_reference.as_deref(), Some("Q-2024-001"));
        assert_eq!(session.get("grand_total"), Ok(&number(5040, 0)));
        assert_eq!(session.get("total_service"), Ok(&number(2640, 0)));

        session.set("qty", "1").expect("qty");
        assert_eq!(session.get("grand_total"), Ok(&FieldValue::Unset));
    }

    #[test]
    fn session_policy_controls_labor_conversion() {
        let (schema, store) = (fixtures::schema(), fixtures::store());
        let policy = PricingPolicy { labor_cost_currency: LaborCostCurrency::Usd };
        let mut session = FormSession::with_policy(&schema, &store, policy);
        session.set("currency", "Local").expect("currency");

        let outcome = session.quote().expect("quote");
        assert_eq!(outcome.result.total_manage_cost, Decimal::new(12600, 0));
    }

    #[test]
    fn quote_inputs_snapshot_current_values() {
        let (schema, store) = (fixtures::schema(), fixtures::store());
        let mut session = FormSession::new(&schema, &store);
        session.set("offering", "device support").expect("offering");

        let inputs = session.quote_inputs().expect("inputs");
        assert_eq!(inputs.offering.as_deref(), Some("Device Support"));
        assert_eq!(inputs.slc.as_deref(), Some("Gold"));
        assert_eq!(inputs.quantity, 1);
        assert_eq!(inputs.duration_months, 12);
        assert_eq!(inputs.customer_name, None);
        assert_eq!(
            schema.field_for_role(FieldRole::Offering).map(|field| field.id.as_str()),
            Some("offering")
        );
    }

    #[test]
    fn sessions_are_independent() {
        let (schema, store) = (fixtures::schema(), fixtures::store());
        let mut first = FormSession::new(&schema, &store);
        let second = FormSession::new(&schema, &store);

        first.set("country", "Argentina").expect("country");
        assert_eq!(second.get("country"), Ok(&text("Brazil")));
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn quote_reference_starts_from_a_default() {
        let (schema, store) = (fixtures::schema(), fixtures::store());
        let mut session = FormSession::new(&schema, &store);

        assert_eq!(session.get("quote_id"), Ok(&text("COT-001")));
        let outcome = session.quote().expect("quote");
        assert_eq!(outcome.trace.quote_reference.as_deref(), Some("COT-001"));
    }

    #[test]
    fn out_of_range_unit_cost_prices_with_a_warning() {
        let (schema, store) = (fixtures::schema(), fixtures::store());
        let mut session = FormSession::new(&schema, &store);
        session.set("unit_cost", "79228162514264337593543950335").expect("unit cost");
        session.set("qty", "2").expect("qty");

        let outcome = session.quote().expect("quote");
        assert_eq!(outcome.result.total_service_cost, Decimal::ZERO);
        assert_eq!(outcome.result.grand_total, Decimal::new(12600, 0));
        assert!(outcome.warnings.contains(&LookupWarning::ArithmeticOverflow {
            stage: "service_usd".to_string()
        }));
        assert_eq!(session.get("grand_total"), Ok(&number(12600, 0)));
    }
}
