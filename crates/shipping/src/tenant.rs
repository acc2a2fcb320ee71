use serde::{Deserialize, Serialize};

use shipsync_core::{DomainError, DomainResult, TenantId};

/// Weight unit a store records line weights in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeightUnit {
    #[default]
    Kilograms,
    Grams,
    Pounds,
}

impl WeightUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightUnit::Kilograms => "kilograms",
            WeightUnit::Grams => "grams",
            WeightUnit::Pounds => "pounds",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kilograms" | "kg" | "kgs" => Ok(WeightUnit::Kilograms),
            "grams" | "g" => Ok(WeightUnit::Grams),
            "pounds" | "lb" | "lbs" => Ok(WeightUnit::Pounds),
            other => Err(DomainError::validation(format!("unknown weight unit: {other}"))),
        }
    }

    pub fn to_kg(&self, value: f64) -> f64 {
        match self {
            WeightUnit::Kilograms => value,
            WeightUnit::Grams => value / 1000.0,
            WeightUnit::Pounds => value * 0.453_592_37,
        }
    }
}

/// Per-tenant settings that shape outbound carrier requests.
///
/// A tenant is one storefront / store view; all sync work for it runs with
/// this context in scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub code: String,
    pub name: String,
    pub locale: String,
    /// ISO 4217 code
    pub currency: String,
    pub weight_unit: WeightUnit,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId, code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            tenant_id,
            name: code.clone(),
            code,
            locale: "en_AU".to_string(),
            currency: "AUD".to_string(),
            weight_unit: WeightUnit::Kilograms,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_weight_unit(mut self, weight_unit: WeightUnit) -> Self {
        self.weight_unit = weight_unit;
        self
    }

    /// Decimal places for amounts in this tenant's currency.
    pub fn currency_decimals(&self) -> u32 {
        match self.currency.to_ascii_uppercase().as_str() {
            "JPY" | "KRW" | "VND" => 0,
            _ => 2,
        }
    }
}
