use std::borrow::Cow;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind};
use crate::filter::FilterSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MilkType {
    #[default]
    Cow,
    Buffalo,
    Both,
}

impl MilkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilkType::Cow => "COW",
            MilkType::Buffalo => "BUFFALO",
            MilkType::Both => "BOTH",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    #[default]
    Active,
    Paused,
    Inactive,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Active => "ACTIVE",
            DeliveryStatus::Paused => "PAUSED",
            DeliveryStatus::Inactive => "INACTIVE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Option<i64>,
    pub name: String,
    pub address: Option<String>,
    #[serde(default)]
    pub mobile_number: String,
    pub email: Option<String>,
    #[serde(default)]
    pub daily_milk_quantity: Decimal,
    pub milk_type: Option<MilkType>,
    pub delivery_status: Option<DeliveryStatus>,
}

impl Customer {
    /// Milk type, treating a missing value as cow milk.
    pub fn milk_type(&self) -> MilkType {
        self.milk_type.unwrap_or_default()
    }

    /// Delivery status, treating a missing value as active.
    pub fn status(&self) -> DeliveryStatus {
        self.delivery_status.unwrap_or_default()
    }

    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        let mut fields = vec![
            Cow::Borrowed(self.name.as_str()),
            Cow::Borrowed(self.mobile_number.as_str()),
        ];
        if let Some(email) = self.email.as_deref() {
            fields.push(Cow::Borrowed(email));
        }
        fields
    }
}

impl Entity for Customer {
    const KIND: EntityKind = EntityKind::Customers;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn filter_schema() -> FilterSchema<Self> {
        FilterSchema::new(Customer::search_fields)
            .contains("name", |c: &Customer| Some(c.name.as_str()))
            .equals("status", |c: &Customer| Some(c.status().as_str()))
            .equals("milk_type", |c: &Customer| Some(c.milk_type().as_str()))
    }
}
