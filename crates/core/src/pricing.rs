use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ConfigError;
use crate::domain::{CurrencyMode, LaborMode, QuoteMetric};
use crate::reference::{Lookup, LookupWarning, ReferenceDataStore};

/// Currency the labor tables are denominated in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaborCostCurrency {
    /// Local currency; converted to USD by dividing by the exchange rate.
    #[default]
    Local,
    /// Already USD; used as-is.
    Usd,
}

impl FromStr for LaborCostCurrency {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "usd" => Ok(Self::Usd),
            other => Err(ConfigError::Validation(format!(
                "unsupported labor cost currency `{other}` (expected local|usd)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub labor_cost_currency: LaborCostCurrency,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteInputs {
    pub quote_reference: Option<String>,
    pub customer_name: Option<String>,
    pub country: Option<String>,
    pub currency: CurrencyMode,
    pub quantity: u32,
    pub duration_months: u32,
    pub unit_cost_usd: Decimal,
    pub risk_tier: Option<String>,
    pub offering: Option<String>,
    pub slc: Option<String>,
    pub labor_mode: LaborMode,
    pub labor_category: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteResult {
    pub total_service_usd: Decimal,
    pub contingency_amount: Decimal,
    pub total_service_cost: Decimal,
    pub exchange_rate: Decimal,
    pub monthly_labor_local: Decimal,
    pub total_manage_local: Decimal,
    pub total_manage_cost: Decimal,
    pub grand_total: Decimal,
}

impl QuoteResult {
    pub fn metric(&self, metric: QuoteMetric) -> Decimal {
        match metric {
            QuoteMetric::TotalServiceCost => self.total_service_cost,
            QuoteMetric::TotalManageCost => self.total_manage_cost,
            QuoteMetric::GrandTotal => self.grand_total,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTrace {
    pub quote_reference: Option<String>,
    pub steps: Vec<PricingTraceStep>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteOutcome {
    pub result: QuoteResult,
    pub trace: PricingTrace,
    pub warnings: Vec<LookupWarning>,
}

pub trait PricingEngine: Send + Sync {
    fn price(&self, inputs: &QuoteInputs, store: &ReferenceDataStore) -> QuoteOutcome;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicPricingEngine {
    policy: PricingPolicy,
}

impl DeterministicPricingEngine {
    pub fn new(policy: PricingPolicy) -> Self {
        Self { policy }
    }
}

impl PricingEngine for DeterministicPricingEngine {
    fn price(&self, inputs: &QuoteInputs, store: &ReferenceDataStore) -> QuoteOutcome {
        compute_quote_with_policy(inputs, store, self.policy)
    }
}

pub fn compute_quote(inputs: &QuoteInputs, store: &ReferenceDataStore) -> QuoteOutcome {
    compute_quote_with_policy(inputs, store, PricingPolicy::default())
}

pub fn compute_quote_with_policy(
    inputs: &QuoteInputs,
    store: &ReferenceDataStore,
    policy: PricingPolicy,
) -> QuoteOutcome {
    let mut warnings = Vec::new();
    let duration = Decimal::from(inputs.duration_months);

    let total_service_usd = checked(
        "service_usd",
        inputs
            .unit_cost_usd
            .checked_mul(duration)
            .and_then(|amount| amount.checked_mul(Decimal::from(inputs.quantity))),
        &mut warnings,
    );
    let contingency =
        collect(resolve_contingency(store, inputs.risk_tier.as_deref()), &mut warnings);
    let contingency_amount =
        checked("contingency", total_service_usd.checked_mul(contingency), &mut warnings);
    let total_service_cost = checked(
        "service_total",
        total_service_usd.checked_add(contingency_amount),
        &mut warnings,
    );

    let exchange_rate = collect(
        resolve_exchange_rate(store, inputs.currency, inputs.country.as_deref()),
        &mut warnings,
    );
    let monthly_labor_local = collect(
        resolve_monthly_labor(
            store,
            inputs.labor_mode,
            inputs.labor_category.as_deref(),
            inputs.country.as_deref(),
        ),
        &mut warnings,
    );
    let total_manage_local =
        checked("manage_local", monthly_labor_local.checked_mul(duration), &mut warnings);
    let (total_manage_cost, conversion) = match policy.labor_cost_currency {
        LaborCostCurrency::Usd => (total_manage_local, "total_manage_local (already USD)"),
        LaborCostCurrency::Local => {
            let converted = (exchange_rate > Decimal::ZERO)
                .then(|| total_manage_local.checked_div(exchange_rate))
                .flatten();
            if converted.is_none() {
                warn!(
                    event_name = "pricing.zero_exchange_rate",
                    exchange_rate = %exchange_rate,
                    "exchange rate is not positive; managed labor contributes 0"
                );
                warnings.push(LookupWarning::ZeroExchangeRate { exchange_rate });
            }
            (converted.unwrap_or(Decimal::ZERO), "total_manage_local / exchange_rate")
        }
    };
    let grand_total = checked(
        "grand_total",
        total_service_cost.checked_add(total_manage_cost),
        &mut warnings,
    );

    let result = QuoteResult {
        total_service_usd,
        contingency_amount,
        total_service_cost,
        exchange_rate,
        monthly_labor_local,
        total_manage_local,
        total_manage_cost,
        grand_total,
    };

    info!(
        event_name = "pricing.quote_computed",
        quote_reference = inputs.quote_reference.as_deref().unwrap_or("unassigned"),
        grand_total = %grand_total,
        warnings = warnings.len(),
        "quote computed"
    );

    QuoteOutcome {
        trace: PricingTrace {
            quote_reference: inputs.quote_reference.clone(),
            steps: vec![
                step("service_usd", "unit_cost_usd * duration * quantity", total_service_usd),
                step("contingency", "total_service_usd * contingency(risk)", contingency_amount),
                step("service_total", "total_service_usd + contingency_amount", total_service_cost),
                step("exchange_rate", exchange_rate_detail(inputs.currency), exchange_rate),
                step(
                    "labor_monthly_local",
                    "labor_monthly_cost(labor_table, labor_category, country)",
                    monthly_labor_local,
                ),
                step("manage_local", "monthly_labor_local * duration_months", total_manage_local),
                step("manage_usd", conversion, total_manage_cost),
                step("grand_total", "total_service_cost + total_manage_usd", grand_total),
            ],
        },
        result,
        warnings,
    }
}

/// Exchange rate shown for the current selection: 1 for USD, the table rate for
/// Local, and 1 while no country is chosen.
pub fn resolve_exchange_rate(
    store: &ReferenceDataStore,
    currency: CurrencyMode,
    country: Option<&str>,
) -> Lookup<Decimal> {
    let country = match (currency, country) {
        (CurrencyMode::Usd, _) | (CurrencyMode::Local, None) => return Lookup::found(Decimal::ONE),
        (CurrencyMode::Local, Some(country)) => country,
    };

    match store.exchange_rate(country) {
        Ok(lookup) => lookup,
        Err(_) => Lookup::degraded(
            Decimal::ONE,
            LookupWarning::UnknownCountry { country: country.trim().to_string() },
        ),
    }
}

pub fn resolve_monthly_labor(
    store: &ReferenceDataStore,
    mode: LaborMode,
    category: Option<&str>,
    country: Option<&str>,
) -> Lookup<Decimal> {
    match (category, country) {
        (Some(category), Some(country)) => store.labor_monthly_cost(mode, category, country),
        (None, _) => Lookup::degraded(
            Decimal::ZERO,
            LookupWarning::UnknownCategory { table: mode.table(), category: String::new() },
        ),
        (Some(_), None) => Lookup::degraded(
            Decimal::ZERO,
            LookupWarning::UnknownCountry { country: String::new() },
        ),
    }
}

fn resolve_contingency(store: &ReferenceDataStore, tier: Option<&str>) -> Lookup<Decimal> {
    match tier {
        Some(tier) => store.contingency(tier),
        None => Lookup::degraded(
            Decimal::ZERO,
            LookupWarning::UnknownRiskTier { tier: String::new() },
        ),
    }
}

fn collect(lookup: Lookup<Decimal>, warnings: &mut Vec<LookupWarning>) -> Decimal {
    let (value, warning) = lookup.into_parts();
    warnings.extend(warning);
    value
}

/// An overflowing stage contributes 0 and is reported instead of aborting the quote.
fn checked(stage: &str, amount: Option<Decimal>, warnings: &mut Vec<LookupWarning>) -> Decimal {
    amount.unwrap_or_else(|| {
        warn!(event_name = "pricing.overflow", stage, "amount out of range; stage contributes 0");
        warnings.push(LookupWarning::ArithmeticOverflow { stage: stage.to_string() });
        Decimal::ZERO
    })
}

fn exchange_rate_detail(currency: CurrencyMode) -> &'static str {
    match currency {
        CurrencyMode::Usd => "USD quote; fixed at 1",
        CurrencyMode::Local => "countries table, exchange-rate row",
    }
}

fn step(stage: &str, detail: &str, amount: Decimal) -> PricingTraceStep {
    PricingTraceStep { stage: stage.to_string(), detail: detail.to_string(), amount }
}
