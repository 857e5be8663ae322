//! Formatting and date helpers shared by the engine and the CLI

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;

use crate::ledger::AssetId;

/// How an amount is labelled when displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencyLabel<'a> {
    /// Suffix with the currency code derived from a fiat id: `1,234.56 EUR`
    Code(&'a AssetId),
    /// Bare number (table cells)
    None,
}

/// Display code of a fiat id: `fiat_eur` -> `EUR`, anything else upper-cased as is
pub fn currency_code(currency: &AssetId) -> String {
    let raw = currency.as_str();
    let code = raw.split_once('_').map(|(_, rest)| rest).unwrap_or(raw);
    code.to_ascii_uppercase()
}

/// Format a Decimal with `,` thousands separators and 2 decimal places,
/// right-aligned to `width` when it is non-zero.
///
/// # Examples
/// ```
/// use folio::utils::{format_amount_with_width, CurrencyLabel};
/// use folio::ledger::AssetId;
/// use rust_decimal_macros::dec;
///
/// let eur = AssetId::from("fiat_eur");
/// assert_eq!(
///     format_amount_with_width(dec!(1234.56), 0, CurrencyLabel::Code(&eur)),
///     "1,234.56 EUR"
/// );
/// assert_eq!(
///     format_amount_with_width(dec!(1234), 12, CurrencyLabel::None),
///     "    1,234.00"
/// );
/// ```
pub fn format_amount_with_width(value: Decimal, width: usize, label: CurrencyLabel<'_>) -> String {
    let is_negative = value < Decimal::ZERO;
    let formatted = format!("{:.2}", value.abs());
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let with_separators: String = integer_part
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec![',', c]
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let sign = if is_negative { "-" } else { "" };
    let result = match label {
        CurrencyLabel::Code(currency) => format!(
            "{}{}.{} {}",
            sign,
            with_separators,
            decimal_part,
            currency_code(currency)
        ),
        CurrencyLabel::None => format!("{}{}.{}", sign, with_separators, decimal_part),
    };

    if width > 0 && result.len() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

/// Amount followed by its currency code: "1,234.56 USD"
pub fn format_amount(value: Decimal, currency: &AssetId) -> String {
    format_amount_with_width(value, 0, CurrencyLabel::Code(currency))
}

/// Bare amount: "1,234.56"
pub fn format_decimal(value: Decimal) -> String {
    format_amount_with_width(value, 0, CurrencyLabel::None)
}

/// Fraction rendered as a signed percentage: 0.1234 -> "+12.34%"
pub fn format_percent(fraction: Decimal) -> String {
    let pct = (fraction * Decimal::ONE_HUNDRED).round_dp(2);
    if pct >= Decimal::ZERO {
        format!("+{:.2}%", pct)
    } else {
        format!("{:.2}%", pct)
    }
}

/// Every calendar day in `[start, end]`; empty when `end < start`
pub fn days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        days.push(current);
        match current.checked_add_days(Days::new(1)) {
            Some(next) => current = next,
            None => break,
        }
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_code() {
        assert_eq!(currency_code(&"fiat_eur".into()), "EUR");
        assert_eq!(currency_code(&"fiat_usd".into()), "USD");
        assert_eq!(currency_code(&"usd".into()), "USD");
    }

    #[test]
    fn test_format_amount_basic() {
        let usd = AssetId::from("fiat_usd");
        assert_eq!(format_amount(dec!(1234.56), &usd), "1,234.56 USD");
        assert_eq!(format_amount(dec!(0.99), &usd), "0.99 USD");
        assert_eq!(format_amount(dec!(1000000), &usd), "1,000,000.00 USD");
        assert_eq!(format_amount(dec!(-1234.5), &usd), "-1,234.50 USD");
    }

    #[test]
    fn test_format_decimal_small_values() {
        assert_eq!(format_decimal(dec!(0)), "0.00");
        assert_eq!(format_decimal(dec!(12)), "12.00");
        assert_eq!(format_decimal(dec!(123)), "123.00");
        assert_eq!(format_decimal(dec!(999.99)), "999.99");
    }

    #[test]
    fn test_format_with_width() {
        let result = format_amount_with_width(dec!(100), 10, CurrencyLabel::None);
        assert_eq!(result, "    100.00");

        // Already wider than requested: no padding
        let result = format_amount_with_width(dec!(1000000), 5, CurrencyLabel::None);
        assert_eq!(result, "1,000,000.00");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(dec!(0.1234)), "+12.34%");
        assert_eq!(format_percent(dec!(-0.5)), "-50.00%");
        assert_eq!(format_percent(dec!(0)), "+0.00%");
    }

    #[test]
    fn test_days_between() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 2, day).unwrap();
        assert_eq!(days_between(d(27), d(29)), vec![d(27), d(28), d(29)]);
        assert_eq!(days_between(d(3), d(3)), vec![d(3)]);
        assert!(days_between(d(5), d(3)).is_empty());
    }
}
