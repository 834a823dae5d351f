use std::borrow::Cow;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind, ProductQuantity, QuantityCategory};
use crate::filter::FilterSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    CowMilk,
    BuffaloMilk,
    Curd,
    #[serde(other)]
    Other,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::CowMilk => "COW_MILK",
            ProductType::BuffaloMilk => "BUFFALO_MILK",
            ProductType::Curd => "CURD",
            ProductType::Other => "OTHER",
        }
    }

    /// Stock category tracked for this product type, if any.
    pub fn category(&self) -> Option<QuantityCategory> {
        match self {
            ProductType::CowMilk => Some(QuantityCategory::CowMilk),
            ProductType::BuffaloMilk => Some(QuantityCategory::BuffaloMilk),
            ProductType::Curd => Some(QuantityCategory::Curd),
            ProductType::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub category: Option<String>,
    #[serde(default)]
    pub quantity: Decimal,
    pub price_per_unit: Decimal,
    #[serde(default)]
    pub unit: String,
    pub description: Option<String>,
    pub min_order_quantity: Option<Decimal>,
}

impl Product {
    /// Stock level for this product, preferring the live snapshot over the
    /// quantity recorded on the product itself.
    pub fn available(&self, live: &ProductQuantity) -> Decimal {
        self.product_type
            .category()
            .map(|c| live.get(c))
            .unwrap_or(self.quantity)
    }

    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.name.as_str()),
            Cow::Borrowed(self.product_type.as_str()),
        ]
    }
}

impl Entity for Product {
    const KIND: EntityKind = EntityKind::Products;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn filter_schema() -> FilterSchema<Self> {
        FilterSchema::new(Product::search_fields)
            .contains("name", |p: &Product| Some(p.name.as_str()))
            .equals("type", |p: &Product| Some(p.product_type.as_str()))
            .range("min_price", "max_price", |p: &Product| Some(p.price_per_unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_type_wire_names() {
        let json = r#"{"id": 1, "name": "Cow Milk", "type": "COW_MILK", "quantity": 120, "pricePerUnit": 50, "unit": "L"}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.product_type, ProductType::CowMilk);
        assert_eq!(product.price_per_unit, Decimal::from(50));
    }

    #[test]
    fn test_unknown_product_type_is_other() {
        let json = r#"{"name": "Paneer", "type": "PANEER", "pricePerUnit": 300}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.product_type, ProductType::Other);
        assert_eq!(product.product_type.category(), None);
    }

    #[test]
    fn test_available_prefers_live_snapshot() {
        let json = r#"{"name": "Curd", "type": "CURD", "quantity": 5, "pricePerUnit": 40}"#;
        let curd: Product = serde_json::from_str(json).unwrap();
        let live = ProductQuantity {
            curd: Decimal::from(17),
            ..ProductQuantity::default()
        };
        assert_eq!(curd.available(&live), Decimal::from(17));

        let other = Product {
            product_type: ProductType::Other,
            ..curd
        };
        assert_eq!(other.available(&live), Decimal::from(5));
    }
}
