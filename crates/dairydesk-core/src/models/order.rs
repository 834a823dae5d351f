use std::borrow::Cow;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CapturedPayment, Entity, EntityKind};
use crate::filter::FilterSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: i64,
    pub quantity: Decimal,
    pub price: Decimal,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.quantity * self.price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Option<i64>,
    pub customer_id: Option<i64>,
    pub user_id: Option<i64>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub status: Option<String>,
    pub order_date: Option<NaiveDateTime>,
    pub payment_data: Option<serde_json::Value>,
}

impl Order {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        let mut fields = Vec::with_capacity(2);
        if let Some(status) = self.status.as_deref() {
            fields.push(Cow::Borrowed(status));
        }
        if let Some(id) = self.id {
            fields.push(Cow::Owned(id.to_string()));
        }
        fields
    }
}

impl Entity for Order {
    const KIND: EntityKind = EntityKind::Orders;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn filter_schema() -> FilterSchema<Self> {
        FilterSchema::new(Order::search_fields)
            .equals("status", |o: &Order| o.status.as_deref())
            .date_range("from", "to", |o: &Order| o.order_date.map(|d| d.date()))
            .range("min_total", "max_total", |o: &Order| Some(o.total_amount))
    }
}

/// Order submission payload, built once from the cart at submission time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub customer_id: Option<i64>,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub payment_data: CapturedPayment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_parses_local_datetime() {
        let json = r#"{"id": 11, "items": [{"productId": 1, "quantity": 2, "price": 50}],
                       "totalAmount": 100, "status": "PLACED", "orderDate": "2024-03-05T09:30:00"}"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].line_total(), Decimal::from(100));
        assert_eq!(
            order.order_date.map(|d| d.date().to_string()),
            Some("2024-03-05".to_string())
        );
    }
}
