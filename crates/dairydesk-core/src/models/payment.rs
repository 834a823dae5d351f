use std::borrow::Cow;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind};
use crate::error::DeskError;
use crate::filter::FilterSchema;

/// Digits required in a payer phone number.
const PHONE_DIGITS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Online,
    Cheque,
    #[serde(other)]
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Online => "ONLINE",
            PaymentMethod::Cheque => "CHEQUE",
            PaymentMethod::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "CASH" => Some(PaymentMethod::Cash),
            "ONLINE" => Some(PaymentMethod::Online),
            "CHEQUE" => Some(PaymentMethod::Cheque),
            "OTHER" => Some(PaymentMethod::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Partial,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Partial => "PARTIAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Option<i64>,
    pub customer_id: Option<i64>,
    pub invoice_id: Option<i64>,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub status: Option<PaymentStatus>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub customer_name: Option<String>,
}

impl Payment {
    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        let mut fields = Vec::with_capacity(3);
        if let Some(name) = self.customer_name.as_deref() {
            fields.push(Cow::Borrowed(name));
        }
        if let Some(invoice) = self.invoice_id {
            fields.push(Cow::Owned(invoice.to_string()));
        }
        if let Some(reference) = self.reference_number.as_deref() {
            fields.push(Cow::Borrowed(reference));
        }
        fields
    }
}

impl Entity for Payment {
    const KIND: EntityKind = EntityKind::Payments;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn filter_schema() -> FilterSchema<Self> {
        FilterSchema::new(Payment::search_fields)
            .equals("status", |p: &Payment| p.status.map(|s| s.as_str()))
            .equals("method", |p: &Payment| Some(p.payment_method.as_str()))
            .date_range("from", "to", |p: &Payment| Some(p.payment_date))
            .range("min_amount", "max_amount", |p: &Payment| Some(p.amount))
    }
}

/// Payment details confirmed by the user during checkout.
///
/// Never stored on its own; it only travels inside an `OrderRequest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedPayment {
    #[serde(rename = "name")]
    pub payer_name: String,
    pub phone_number: String,
    pub payment_method: PaymentMethod,
    #[serde(rename = "pendingAmount")]
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub notes: Option<String>,
}

impl CapturedPayment {
    /// Same rules the payment form enforces before it lets the user confirm.
    pub fn validate(&self) -> Result<(), DeskError> {
        if self.payer_name.trim().is_empty() {
            return Err(DeskError::Validation("Payer name is required".to_string()));
        }
        let phone = self.phone_number.trim();
        if phone.len() != PHONE_DIGITS || !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(DeskError::Validation(
                "Invalid phone number (10 digits required)".to_string(),
            ));
        }
        if self.amount.is_sign_negative() {
            return Err(DeskError::Validation("Amount must be positive".to_string()));
        }
        Ok(())
    }
}
