use std::borrow::Cow;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{FilterState, FilterValue};
use crate::error::DeskError;
use crate::utils::contains_ignore_case;

pub type SearchFields<T> = for<'a> fn(&'a T) -> Vec<Cow<'a, str>>;
pub type TextField<T> = for<'a> fn(&'a T) -> Option<&'a str>;
pub type IdField<T> = fn(&T) -> Option<i64>;
pub type NumberField<T> = fn(&T) -> Option<Decimal>;
pub type DateField<T> = fn(&T) -> Option<NaiveDate>;

/// Input type a named filter expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Id,
    Number,
    Date,
}

impl InputKind {
    pub fn label(&self) -> &'static str {
        match self {
            InputKind::Text => "text",
            InputKind::Id => "id",
            InputKind::Number => "number",
            InputKind::Date => "date (YYYY-MM-DD)",
        }
    }
}

enum FieldRule<T> {
    /// Exact match on a code such as a status or type.
    Equals { name: &'static str, get: TextField<T> },
    /// Case-insensitive substring match.
    Contains { name: &'static str, get: TextField<T> },
    IdEquals { name: &'static str, get: IdField<T> },
}

enum RangeRule<T> {
    Number {
        min: &'static str,
        max: &'static str,
        get: NumberField<T>,
    },
    Date {
        from: &'static str,
        to: &'static str,
        get: DateField<T>,
    },
}

/// Filters one entity type understands.
///
/// Predicates run in a fixed order: free-text search, then field rules,
/// then ranges. A record is kept only if it passes every active one.
pub struct FilterSchema<T> {
    search: SearchFields<T>,
    fields: Vec<FieldRule<T>>,
    ranges: Vec<RangeRule<T>>,
}

impl<T> FilterSchema<T> {
    pub fn new(search: SearchFields<T>) -> Self {
        Self {
            search,
            fields: Vec::new(),
            ranges: Vec::new(),
        }
    }

    pub fn equals(mut self, name: &'static str, get: TextField<T>) -> Self {
        self.fields.push(FieldRule::Equals { name, get });
        self
    }

    pub fn contains(mut self, name: &'static str, get: TextField<T>) -> Self {
        self.fields.push(FieldRule::Contains { name, get });
        self
    }

    pub fn id_equals(mut self, name: &'static str, get: IdField<T>) -> Self {
        self.fields.push(FieldRule::IdEquals { name, get });
        self
    }

    /// Inclusive numeric range with independently optional bounds.
    pub fn range(mut self, min: &'static str, max: &'static str, get: NumberField<T>) -> Self {
        self.ranges.push(RangeRule::Number { min, max, get });
        self
    }

    /// Inclusive date range with independently optional bounds.
    pub fn date_range(mut self, from: &'static str, to: &'static str, get: DateField<T>) -> Self {
        self.ranges.push(RangeRule::Date { from, to, get });
        self
    }

    /// Every named input, in declaration order.
    pub fn inputs(&self) -> Vec<(&'static str, InputKind)> {
        let mut inputs = Vec::new();
        for rule in &self.fields {
            inputs.push(match rule {
                FieldRule::Equals { name, .. } | FieldRule::Contains { name, .. } => {
                    (*name, InputKind::Text)
                }
                FieldRule::IdEquals { name, .. } => (*name, InputKind::Id),
            });
        }
        for rule in &self.ranges {
            match rule {
                RangeRule::Number { min, max, .. } => {
                    inputs.push((*min, InputKind::Number));
                    inputs.push((*max, InputKind::Number));
                }
                RangeRule::Date { from, to, .. } => {
                    inputs.push((*from, InputKind::Date));
                    inputs.push((*to, InputKind::Date));
                }
            }
        }
        inputs
    }

    pub fn input_kind(&self, name: &str) -> Option<InputKind> {
        self.inputs()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, kind)| kind)
    }

    /// Check that `value` fits the input called `name`.
    pub fn check(&self, name: &str, value: &FilterValue) -> Result<(), DeskError> {
        match self.input_kind(name) {
            None => Err(self.unknown(name)),
            Some(kind) if kind != value.kind() => Err(DeskError::Validation(format!(
                "Filter '{}' expects a {}",
                name,
                kind.label()
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Parse raw user input for the input called `name`.
    pub fn parse_input(&self, name: &str, raw: &str) -> Result<FilterValue, DeskError> {
        let kind = self.input_kind(name).ok_or_else(|| self.unknown(name))?;
        let raw = raw.trim();
        let invalid = || {
            DeskError::Validation(format!(
                "Invalid value '{}' for filter '{}': expected {}",
                raw,
                name,
                kind.label()
            ))
        };
        match kind {
            InputKind::Text => Ok(FilterValue::Text(raw.to_string())),
            InputKind::Id => raw.parse().map(FilterValue::Id).map_err(|_| invalid()),
            InputKind::Number => Decimal::from_str(raw)
                .map(FilterValue::Number)
                .map_err(|_| invalid()),
            InputKind::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(FilterValue::Date)
                .map_err(|_| invalid()),
        }
    }

    fn unknown(&self, name: &str) -> DeskError {
        let known: Vec<&str> = self.inputs().into_iter().map(|(n, _)| n).collect();
        DeskError::Validation(format!(
            "Unknown filter '{}' (available: {})",
            name,
            known.join(", ")
        ))
    }

    /// Does `record` pass every active predicate? `needle` is the lowercased search term.
    pub fn admits(&self, record: &T, needle: &str, state: &FilterState) -> bool {
        self.matches_search(record, needle)
            && self.fields.iter().all(|rule| field_passes(rule, record, state))
            && self.ranges.iter().all(|rule| range_passes(rule, record, state))
    }

    fn matches_search(&self, record: &T, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        (self.search)(record)
            .iter()
            .any(|field| contains_ignore_case(field, needle))
    }
}

fn field_passes<T>(rule: &FieldRule<T>, record: &T, state: &FilterState) -> bool {
    match rule {
        FieldRule::Equals { name, get } => match state.get(name) {
            None => true,
            Some(value) => value
                .as_text()
                .is_some_and(|wanted| get(record) == Some(wanted)),
        },
        FieldRule::Contains { name, get } => match state.get(name) {
            None => true,
            Some(value) => value.as_text().is_some_and(|wanted| {
                let needle = wanted.trim().to_lowercase();
                get(record).is_some_and(|field| contains_ignore_case(field, &needle))
            }),
        },
        FieldRule::IdEquals { name, get } => match state.get(name) {
            None => true,
            Some(value) => value.as_id().is_some_and(|wanted| get(record) == Some(wanted)),
        },
    }
}

fn range_passes<T>(rule: &RangeRule<T>, record: &T, state: &FilterState) -> bool {
    match rule {
        RangeRule::Number { min, max, get } => within(
            state.get(min),
            state.get(max),
            FilterValue::as_number,
            || get(record),
        ),
        RangeRule::Date { from, to, get } => within(
            state.get(from),
            state.get(to),
            FilterValue::as_date,
            || get(record),
        ),
    }
}

/// Inclusive bounds check. A record without the field fails an active
/// range, and so does a bound holding the wrong kind of value.
fn within<V: PartialOrd>(
    low: Option<&FilterValue>,
    high: Option<&FilterValue>,
    read: fn(&FilterValue) -> Option<V>,
    value: impl FnOnce() -> Option<V>,
) -> bool {
    if low.is_none() && high.is_none() {
        return true;
    }
    let Some(value) = value() else {
        return false;
    };
    let above = low.map_or(true, |b| read(b).is_some_and(|lo| value >= lo));
    let below = high.map_or(true, |b| read(b).is_some_and(|hi| value <= hi));
    above && below
}
