//! Interactive payment step on stdin.

use std::io::{self, BufRead, Write};
use std::str::FromStr;

use chrono::{Local, NaiveDate};
use dairydesk_core::checkout::{PaymentCapture, PaymentOutcome, PaymentPrompt};
use dairydesk_core::models::{CapturedPayment, PaymentMethod};
use dairydesk_core::utils::format_amount;
use futures::future::{BoxFuture, FutureExt};
use rust_decimal::Decimal;
use tracing::warn;

/// Asks for payment details on the terminal. A blank payer name or a "n"
/// at the confirmation dismisses the payment.
pub struct StdinPayment;

impl PaymentCapture for StdinPayment {
    fn capture(&self, prompt: PaymentPrompt) -> BoxFuture<'_, PaymentOutcome> {
        async move {
            let result = tokio::task::spawn_blocking(move || {
                let stdin = io::stdin();
                read_payment(&prompt, &mut stdin.lock(), &mut io::stdout())
            })
            .await;
            match result {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    warn!(error = %e, "Payment prompt failed");
                    PaymentOutcome::Dismissed
                }
                Err(e) => {
                    warn!(error = %e, "Payment prompt task failed");
                    PaymentOutcome::Dismissed
                }
            }
        }
        .boxed()
    }
}

fn ask(input: &mut impl BufRead, out: &mut impl Write, label: &str) -> io::Result<String> {
    write!(out, "{}: ", label)?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn ask_or(
    input: &mut impl BufRead,
    out: &mut impl Write,
    label: &str,
    default: &str,
) -> io::Result<String> {
    let answer = ask(input, out, &format!("{} [{}]", label, default))?;
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer
    })
}

/// Keep asking until `parse` accepts the answer.
fn ask_parsed<V>(
    input: &mut impl BufRead,
    out: &mut impl Write,
    label: &str,
    default: &str,
    parse: impl Fn(&str) -> Option<V>,
) -> io::Result<V> {
    loop {
        let answer = ask_or(input, out, label, default)?;
        if let Some(value) = parse(&answer) {
            return Ok(value);
        }
        writeln!(out, "  '{}' is not valid here", answer)?;
    }
}

pub fn read_payment(
    prompt: &PaymentPrompt,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> io::Result<PaymentOutcome> {
    writeln!(out, "\n=== Payment ===\n")?;
    writeln!(
        out,
        "{} item(s), total {}",
        prompt.item_count,
        format_amount(prompt.total_amount)
    )?;
    for shortfall in &prompt.shortfalls {
        writeln!(out, "  ! Low stock - {}", shortfall)?;
    }
    writeln!(out)?;

    let payer_name = ask(input, out, "Payer name (blank to cancel)")?;
    if payer_name.is_empty() {
        return Ok(PaymentOutcome::Dismissed);
    }
    let phone_number = ask(input, out, "Phone number")?;
    let payment_method = ask_parsed(input, out, "Method (CASH/ONLINE/CHEQUE)", "CASH", PaymentMethod::parse)?;
    let amount = ask_parsed(
        input,
        out,
        "Amount",
        &prompt.total_amount.to_string(),
        |s| Decimal::from_str(s).ok(),
    )?;
    let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
    let payment_date = ask_parsed(input, out, "Date", &today, |s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
    })?;
    let notes = ask(input, out, "Notes (optional)")?;

    let confirm = ask_or(input, out, "Confirm payment? (Y/n)", "y")?;
    if confirm.eq_ignore_ascii_case("n") {
        return Ok(PaymentOutcome::Dismissed);
    }

    Ok(PaymentOutcome::Confirmed(CapturedPayment {
        payer_name,
        phone_number,
        payment_method,
        amount,
        payment_date,
        notes: (!notes.is_empty()).then_some(notes),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> PaymentPrompt {
        PaymentPrompt {
            total_amount: Decimal::from(160),
            item_count: 3,
            shortfalls: Vec::new(),
        }
    }

    fn run(script: &str) -> (PaymentOutcome, String) {
        let mut input = io::Cursor::new(script.as_bytes().to_vec());
        let mut out = Vec::new();
        let outcome = read_payment(&prompt(), &mut input, &mut out).unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_blank_name_dismisses() {
        let (outcome, _) = run("\n");
        assert_eq!(outcome, PaymentOutcome::Dismissed);
    }

    #[test]
    fn test_defaults_fill_method_and_amount() {
        let (outcome, out) = run("Asha\n9876543210\n\n\n2024-03-05\n\ny\n");
        assert!(out.contains("3 item(s), total ₹160.00"));
        let PaymentOutcome::Confirmed(payment) = outcome else {
            panic!("expected a confirmed payment");
        };
        assert_eq!(payment.payment_method, PaymentMethod::Cash);
        assert_eq!(payment.amount, Decimal::from(160));
        assert_eq!(payment.payment_date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(payment.notes, None);
    }

    #[test]
    fn test_invalid_answer_is_asked_again() {
        let (outcome, out) = run("Asha\n9876543210\nbarter\nonline\n100\n2024-03-05\nlate\nn\n");
        assert!(out.contains("'barter' is not valid here"));
        assert_eq!(outcome, PaymentOutcome::Dismissed);
    }
}
