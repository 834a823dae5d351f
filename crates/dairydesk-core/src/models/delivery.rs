use std::borrow::Cow;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind};
use crate::filter::FilterSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilkDelivery {
    pub id: Option<i64>,
    pub customer_id: i64,
    pub product_id: Option<i64>,
    pub delivery_date: NaiveDate,
    pub quantity_delivered: Decimal,
    pub price_per_unit: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub notes: Option<String>,
    // Read-only, filled in by the server
    pub customer_name: Option<String>,
    pub product_name: Option<String>,
}

impl MilkDelivery {
    /// Billed amount, counting a missing total as zero.
    pub fn amount(&self) -> Decimal {
        self.total_amount.unwrap_or_default()
    }

    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        [&self.customer_name, &self.product_name, &self.notes]
            .into_iter()
            .flatten()
            .map(|s| Cow::Borrowed(s.as_str()))
            .collect()
    }
}

impl Entity for MilkDelivery {
    const KIND: EntityKind = EntityKind::Deliveries;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn filter_schema() -> FilterSchema<Self> {
        FilterSchema::new(MilkDelivery::search_fields)
            .id_equals("customer", |d: &MilkDelivery| Some(d.customer_id))
            .date_range("from", "to", |d: &MilkDelivery| Some(d.delivery_date))
            .range("min_amount", "max_amount", |d: &MilkDelivery| Some(d.amount()))
    }
}
