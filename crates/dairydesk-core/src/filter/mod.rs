//! Debounced multi-predicate filtering over an entity snapshot.
//!
//! [`apply`] is the pure stage: snapshot plus [`FilterState`] in, the
//! indices of the records that pass out. [`ListView`] wires it to a cache,
//! a debounced search box and a subscription for whoever renders the list.

pub mod debounce;
pub mod schema;
pub mod state;
pub mod view;

use std::sync::Arc;

pub use debounce::Debouncer;
pub use schema::{FilterSchema, InputKind};
pub use state::{FilterState, FilterValue};
pub use view::ListView;

/// Indices of the records in `records` that pass every active filter,
/// in their original order.
pub fn apply<T>(schema: &FilterSchema<T>, records: &[T], state: &FilterState) -> Vec<usize> {
    let needle = state.search().trim().to_lowercase();
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| schema.admits(record, &needle, state))
        .map(|(index, _)| index)
        .collect()
}

/// Filtered subset of one snapshot.
///
/// Holds the snapshot it was computed against, so the indices can never
/// point into a different list.
#[derive(Debug)]
pub struct DisplayedView<T> {
    snapshot: Arc<Vec<T>>,
    indices: Vec<usize>,
    generation: u64,
}

impl<T> DisplayedView<T> {
    pub fn new(snapshot: Arc<Vec<T>>, indices: Vec<usize>, generation: u64) -> Self {
        Self {
            snapshot,
            indices,
            generation,
        }
    }

    pub fn empty() -> Self {
        Self::new(Arc::new(Vec::new()), Vec::new(), 0)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Size of the snapshot before filtering.
    pub fn total(&self) -> usize {
        self.snapshot.len()
    }

    /// Bumped on every recomputation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.indices.get(index).and_then(|&i| self.snapshot.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.indices.iter().filter_map(|&i| self.snapshot.get(i))
    }

    pub fn snapshot(&self) -> &Arc<Vec<T>> {
        &self.snapshot
    }
}

impl<T: Clone> DisplayedView<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, Product, ProductType};
    use rust_decimal::Decimal;

    fn product(id: i64, name: &str, product_type: ProductType, price: i64) -> Product {
        Product {
            id: Some(id),
            name: name.to_string(),
            product_type,
            category: None,
            quantity: Decimal::ZERO,
            price_per_unit: Decimal::from(price),
            unit: "L".to_string(),
            description: None,
            min_order_quantity: None,
        }
    }

    fn catalogue() -> Vec<Product> {
        vec![
            product(1, "Cow Milk", ProductType::CowMilk, 50),
            product(2, "Buffalo Milk", ProductType::BuffaloMilk, 60),
            product(3, "Curd", ProductType::Curd, 40),
            product(4, "Toned Cow Milk", ProductType::CowMilk, 45),
        ]
    }

    /// Every combination of a few inputs yields an order-preserving subset.
    #[test]
    fn test_result_is_ordered_subset() {
        let schema = Product::filter_schema();
        let records = catalogue();
        let searches = ["", "cow", "MILK", "zzz"];
        let types = [None, Some("COW_MILK"), Some("CURD")];
        let mins = [None, Some(45), Some(55)];

        for search in searches {
            for ty in types {
                for min in mins {
                    let mut state = FilterState::new();
                    state.set_search(search);
                    if let Some(ty) = ty {
                        state.set("type", FilterValue::Text(ty.to_string()));
                    }
                    if let Some(min) = min {
                        state.set("min_price", FilterValue::Number(Decimal::from(min)));
                    }
                    let indices = apply(&schema, &records, &state);
                    assert!(indices.windows(2).all(|w| w[0] < w[1]));
                    assert!(indices.iter().all(|&i| i < records.len()));
                }
            }
        }
    }

    #[test]
    fn test_predicates_are_conjunctive() {
        let schema = Product::filter_schema();
        let records = catalogue();
        let mut state = FilterState::new();
        state.set_search("cow");
        state.set("max_price", FilterValue::Number(Decimal::from(45)));
        assert_eq!(apply(&schema, &records, &state), vec![3]);
    }

    #[test]
    fn test_clearing_restores_full_list() {
        let schema = Product::filter_schema();
        let records = catalogue();
        let mut state = FilterState::new();
        state.set_search("curd");
        state.set("type", FilterValue::Text("CURD".into()));
        assert_eq!(apply(&schema, &records, &state), vec![2]);

        state.clear();
        assert_eq!(apply(&schema, &records, &state), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_displayed_view_reads_through_snapshot() {
        let records = Arc::new(catalogue());
        let view = DisplayedView::new(Arc::clone(&records), vec![1, 3], 1);
        assert_eq!(view.len(), 2);
        assert_eq!(view.total(), 4);
        assert_eq!(view.get(1).map(|p| p.name.as_str()), Some("Toned Cow Milk"));
        let names: Vec<_> = view.iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, vec!["Buffalo Milk", "Toned Cow Milk"]);
    }
}
