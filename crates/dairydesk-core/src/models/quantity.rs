use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Placeholder stock levels shown until the first fetch completes.
const DEFAULT_COW_MILK: i64 = 100;
const DEFAULT_BUFFALO_MILK: i64 = 80;
const DEFAULT_CURD: i64 = 50;

/// Product categories whose stock is tracked centrally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantityCategory {
    CowMilk,
    BuffaloMilk,
    Curd,
}

impl QuantityCategory {
    pub const ALL: [QuantityCategory; 3] = [
        QuantityCategory::CowMilk,
        QuantityCategory::BuffaloMilk,
        QuantityCategory::Curd,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            QuantityCategory::CowMilk => "Cow Milk",
            QuantityCategory::BuffaloMilk => "Buffalo Milk",
            QuantityCategory::Curd => "Curd",
        }
    }
}

/// Available stock per category, as reported by `GET /products/quantities`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuantity {
    pub cow_milk: Decimal,
    pub buffalo_milk: Decimal,
    pub curd: Decimal,
}

impl Default for ProductQuantity {
    fn default() -> Self {
        Self {
            cow_milk: Decimal::from(DEFAULT_COW_MILK),
            buffalo_milk: Decimal::from(DEFAULT_BUFFALO_MILK),
            curd: Decimal::from(DEFAULT_CURD),
        }
    }
}

impl ProductQuantity {
    pub fn get(&self, category: QuantityCategory) -> Decimal {
        match category {
            QuantityCategory::CowMilk => self.cow_milk,
            QuantityCategory::BuffaloMilk => self.buffalo_milk,
            QuantityCategory::Curd => self.curd,
        }
    }

    /// Reject snapshots reporting negative stock.
    pub fn validate(&self) -> Result<(), String> {
        for category in QuantityCategory::ALL {
            let value = self.get(category);
            if value.is_sign_negative() && !value.is_zero() {
                return Err(format!("negative quantity {} for {}", value, category.label()));
            }
        }
        Ok(())
    }
}
