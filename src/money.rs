use rust_decimal::Decimal;

use crate::error::{BillingError, Result};

/// Parse a user-entered amount with at most two decimals ("60", "60.5", "1250.00").
pub fn parse_amount(input: &str) -> Result<Decimal> {
    let trimmed = input.trim();
    let amount: Decimal = trimmed
        .parse()
        .map_err(|_| BillingError::InvalidAmount(input.to_string()))?;
    if amount.scale() > 2 {
        return Err(BillingError::InvalidAmount(input.to_string()));
    }
    Ok(amount)
}

/// Format a money amount with two decimal places and thousands separators
pub fn format_money(value: Decimal, currency_symbol: &str) -> String {
    let rounded = value.round_dp(2);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let grouped = group_digits(whole);
    if negative {
        format!("-{currency_symbol}{grouped}.{frac}")
    } else {
        format!("{currency_symbol}{grouped}.{frac}")
    }
}

fn group_digits(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.chars().rev().collect()
}
