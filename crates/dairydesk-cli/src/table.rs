//! Plain-text tables for list output.

use dairydesk_core::models::{Customer, MilkDelivery, Order, Payment, Product};
use dairydesk_core::utils::{format_amount, format_date, format_optional, truncate_string};

/// Widest a single cell may get before it is truncated.
const MAX_CELL_WIDTH: usize = 28;

pub trait TableRow {
    const HEADERS: &'static [&'static str];

    fn cells(&self) -> Vec<String>;
}

fn id_cell(id: Option<i64>) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.to_string())
}

impl TableRow for Customer {
    const HEADERS: &'static [&'static str] = &["ID", "Name", "Mobile", "Milk", "Daily", "Status"];

    fn cells(&self) -> Vec<String> {
        vec![
            id_cell(self.id),
            self.name.clone(),
            self.mobile_number.clone(),
            self.milk_type().as_str().to_string(),
            self.daily_milk_quantity.to_string(),
            self.status().as_str().to_string(),
        ]
    }
}

impl TableRow for Product {
    const HEADERS: &'static [&'static str] = &["ID", "Name", "Type", "Stock", "Price", "Unit"];

    fn cells(&self) -> Vec<String> {
        vec![
            id_cell(self.id),
            self.name.clone(),
            self.product_type.as_str().to_string(),
            self.quantity.to_string(),
            format_amount(self.price_per_unit),
            self.unit.clone(),
        ]
    }
}

impl TableRow for MilkDelivery {
    const HEADERS: &'static [&'static str] = &["ID", "Date", "Customer", "Product", "Qty", "Amount"];

    fn cells(&self) -> Vec<String> {
        vec![
            id_cell(self.id),
            format_date(self.delivery_date),
            format_optional(&self.customer_name, &self.customer_id.to_string()),
            format_optional(&self.product_name, "-"),
            self.quantity_delivered.to_string(),
            format_amount(self.amount()),
        ]
    }
}

impl TableRow for Payment {
    const HEADERS: &'static [&'static str] = &["ID", "Date", "Customer", "Method", "Status", "Amount"];

    fn cells(&self) -> Vec<String> {
        vec![
            id_cell(self.id),
            format_date(self.payment_date),
            format_optional(&self.customer_name, &id_cell(self.customer_id)),
            self.payment_method.as_str().to_string(),
            self.status.map_or("-", |s| s.as_str()).to_string(),
            format_amount(self.amount),
        ]
    }
}

impl TableRow for Order {
    const HEADERS: &'static [&'static str] = &["ID", "Date", "Customer", "Items", "Status", "Total"];

    fn cells(&self) -> Vec<String> {
        vec![
            id_cell(self.id),
            self.order_date
                .map_or_else(|| "-".to_string(), |d| format_date(d.date())),
            id_cell(self.customer_id),
            self.items.len().to_string(),
            format_optional(&self.status, "-"),
            format_amount(self.total_amount),
        ]
    }
}

/// Render rows under `headers`, each column as wide as its widest cell.
pub fn render(headers: &[&str], rows: &[Vec<String>]) -> String {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|c| truncate_string(c, MAX_CELL_WIDTH)).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(line(headers.to_vec()));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push(line(rule.iter().map(String::as_str).collect()));
    for row in &rows {
        out.push(line(row.iter().map(String::as_str).collect()));
    }
    out.join("\n")
}

pub fn render_rows<'a, T: TableRow + 'a>(records: impl Iterator<Item = &'a T>) -> String {
    let rows: Vec<Vec<String>> = records.map(TableRow::cells).collect();
    render(T::HEADERS, &rows)
}
