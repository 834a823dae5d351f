use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::InputKind;

/// One typed filter input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Id(i64),
    Number(Decimal),
    Date(NaiveDate),
}

impl FilterValue {
    pub fn kind(&self) -> InputKind {
        match self {
            FilterValue::Text(_) => InputKind::Text,
            FilterValue::Id(_) => InputKind::Id,
            FilterValue::Number(_) => InputKind::Number,
            FilterValue::Date(_) => InputKind::Date,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FilterValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<i64> {
        match self {
            FilterValue::Id(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            FilterValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FilterValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl std::fmt::Display for FilterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterValue::Text(s) => write!(f, "{}", s),
            FilterValue::Id(id) => write!(f, "{}", id),
            FilterValue::Number(n) => write!(f, "{}", n),
            FilterValue::Date(d) => write!(f, "{}", d),
        }
    }
}

/// Current filter inputs for one list.
///
/// The search term is kept apart from the named inputs since it is the
/// only one that goes through the debounce stage. An absent name means the
/// filter is unset and lets everything through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    search: String,
    inputs: BTreeMap<String, FilterValue>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    /// Returns true if the term changed.
    pub fn set_search(&mut self, term: impl Into<String>) -> bool {
        let term = term.into();
        if self.search == term {
            return false;
        }
        self.search = term;
        true
    }

    pub fn get(&self, name: &str) -> Option<&FilterValue> {
        self.inputs.get(name)
    }

    /// Set a named input. Blank text unsets it. Returns true if anything changed.
    pub fn set(&mut self, name: impl Into<String>, value: FilterValue) -> bool {
        let name = name.into();
        if matches!(&value, FilterValue::Text(s) if s.trim().is_empty()) {
            return self.inputs.remove(&name).is_some();
        }
        if self.inputs.get(&name) == Some(&value) {
            return false;
        }
        self.inputs.insert(name, value);
        true
    }

    pub fn unset(&mut self, name: &str) -> bool {
        self.inputs.remove(name).is_some()
    }

    /// Reset to no filters at all. Returns true if anything was set.
    pub fn clear(&mut self) -> bool {
        let changed = !self.is_empty();
        self.search.clear();
        self.inputs.clear();
        changed
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_empty() && self.inputs.is_empty()
    }

    pub fn inputs(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.inputs.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_text_unsets() {
        let mut state = FilterState::new();
        assert!(state.set("status", FilterValue::Text("ACTIVE".into())));
        assert!(state.set("status", FilterValue::Text("  ".into())));
        assert!(state.get("status").is_none());
        assert!(state.is_empty());
    }

    #[test]
    fn test_same_value_is_not_a_change() {
        let mut state = FilterState::new();
        assert!(state.set("min_price", FilterValue::Number(Decimal::from(10))));
        assert!(!state.set("min_price", FilterValue::Number(Decimal::from(10))));
        assert!(state.set_search("cow"));
        assert!(!state.set_search("cow"));
    }

    #[test]
    fn test_clear() {
        let mut state = FilterState::new();
        assert!(!state.clear());
        state.set_search("cow");
        state.set("customer", FilterValue::Id(7));
        assert!(state.clear());
        assert!(state.is_empty());
        assert_eq!(state.search(), "");
    }
}
