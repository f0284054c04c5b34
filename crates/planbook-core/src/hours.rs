//! Decimal hour quantities.
//!
//! Hours arrive as user-typed text or JSON numbers and are compared against a
//! hard capacity boundary, so they are never carried as binary floats. Every
//! conversion into [`Decimal`] goes through this module and rejects negative,
//! non-finite and non-numeric input with [`BudgetError::InvalidInput`].
//!
//! `Decimal` holds 28 significant digits and rounds past that. Parsing and
//! addition here refuse to round instead: a value or total that would lose
//! digits is `InvalidInput`.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::BudgetError;

/// Parse hours from text such as `"2.25"` or `" 10 "`.
pub fn parse_hours(raw: &str) -> Result<Decimal, BudgetError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(BudgetError::InvalidInput("empty value".to_string()));
    }
    if let Some(value) = parse_exact(trimmed) {
        return non_negative(value);
    }
    let rounds = Decimal::from_str(trimmed).is_ok() || Decimal::from_scientific(trimmed).is_ok();
    Err(BudgetError::InvalidInput(if rounds {
        format!("'{trimmed}' has more digits than can be held exactly")
    } else {
        format!("'{trimmed}' is not a number")
    }))
}

/// Plain or scientific notation, `None` unless the value fits without rounding.
fn parse_exact(text: &str) -> Option<Decimal> {
    let Some((base, exponent)) = text.split_once(|c: char| c == 'e' || c == 'E') else {
        return Decimal::from_str_exact(text).ok();
    };
    let base = Decimal::from_str_exact(base).ok()?;
    let exponent: i64 = exponent.parse().ok()?;
    let scale = i64::from(base.scale()).checked_sub(exponent)?;
    if scale >= 0 {
        let scale = u32::try_from(scale).ok()?;
        Decimal::try_from_i128_with_scale(base.mantissa(), scale).ok()
    } else {
        let factor = 10i128.checked_pow(u32::try_from(-scale).ok()?)?;
        Decimal::try_from_i128_with_scale(base.mantissa().checked_mul(factor)?, 0).ok()
    }
}

/// Convert a float, keeping its shortest decimal spelling (`0.1` stays `0.1`).
pub fn hours_from_f64(value: f64) -> Result<Decimal, BudgetError> {
    if !value.is_finite() {
        return Err(BudgetError::InvalidInput(format!("{value} is not finite")));
    }
    parse_hours(&value.to_string())
}

/// Convert a JSON number or numeric string.
pub fn hours_from_json(value: &serde_json::Value) -> Result<Decimal, BudgetError> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                non_negative(Decimal::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(Decimal::from(u))
            } else {
                // serde_json prints floats in their shortest round-trip form
                parse_hours(&n.to_string())
            }
        }
        serde_json::Value::String(s) => parse_hours(s),
        other => Err(BudgetError::InvalidInput(format!(
            "expected a number, got {other}"
        ))),
    }
}

/// Exact sum of hour values.
pub fn sum_hours<I>(values: I) -> Result<Decimal, BudgetError>
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().try_fold(Decimal::ZERO, add_hours)
}

/// `a + b`, refusing a total that overflows or had to be rounded.
///
/// `Decimal` addition keeps the larger operand scale unless it runs out of
/// digits, so a smaller result scale means digits were dropped.
pub fn add_hours(a: Decimal, b: Decimal) -> Result<Decimal, BudgetError> {
    let sum = a
        .checked_add(b)
        .ok_or_else(|| BudgetError::InvalidInput("hour total overflows".to_string()))?;
    if sum.scale() < a.scale().max(b.scale()) || sum.checked_sub(b) != Some(a) {
        return Err(BudgetError::InvalidInput(format!(
            "{a} + {b} has more digits than can be held exactly"
        )));
    }
    Ok(sum)
}

pub(crate) fn non_negative(value: Decimal) -> Result<Decimal, BudgetError> {
    if !value.is_sign_negative() {
        Ok(value)
    } else if value.is_zero() {
        Ok(value.abs())
    } else {
        Err(BudgetError::InvalidInput(format!("{value} is negative")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_plain_decimals() {
        assert_eq!(parse_hours("2.25").unwrap(), Decimal::new(225, 2));
        assert_eq!(parse_hours(" 10 ").unwrap(), Decimal::from(10));
        assert_eq!(parse_hours("1e1").unwrap(), Decimal::from(10));
    }

    #[test]
    fn rejects_garbage_and_negatives() {
        for raw in ["", "abc", "NaN", "inf", "-1", "-0.01"] {
            assert!(
                matches!(parse_hours(raw), Err(BudgetError::InvalidInput(_))),
                "accepted {raw:?}"
            );
        }
    }

    #[test]
    fn negative_zero_is_zero() {
        assert!(parse_hours("-0").unwrap().is_zero());
    }

    #[test]
    fn float_conversion_is_exact_for_short_decimals() {
        assert_eq!(hours_from_f64(0.1).unwrap(), Decimal::new(1, 1));
        assert!(hours_from_f64(f64::NAN).is_err());
        assert!(hours_from_f64(f64::INFINITY).is_err());
        assert!(hours_from_f64(-2.0).is_err());
    }

    #[test]
    fn json_numbers_and_strings() {
        assert_eq!(hours_from_json(&json!(3)).unwrap(), Decimal::from(3));
        assert_eq!(hours_from_json(&json!(1.5)).unwrap(), Decimal::new(15, 1));
        assert_eq!(hours_from_json(&json!("0.02")).unwrap(), Decimal::new(2, 2));
        assert!(hours_from_json(&json!(null)).is_err());
        assert!(hours_from_json(&json!(true)).is_err());
        assert!(hours_from_json(&json!(-4)).is_err());
    }

    #[test]
    fn sum_is_exact() {
        let tenths = std::iter::repeat(Decimal::new(1, 1)).take(10);
        assert_eq!(sum_hours(tenths).unwrap(), Decimal::ONE);
    }

    #[test]
    fn values_past_decimal_precision_are_refused() {
        // 29 decimal places would round to zero
        let err = parse_hours("0.00000000000000000000000000001").unwrap_err();
        assert!(err.to_string().ends_with("has more digits than can be held exactly"));
        assert!(parse_hours("1e-29").is_err());
        assert!(parse_hours("123456789012345678901234567890.5").is_err());
    }

    #[test]
    fn scientific_notation_is_exact() {
        let e27 = Decimal::from_i128_with_scale(10i128.pow(27), 0);
        assert_eq!(parse_hours("1e27").unwrap(), e27);
        assert_eq!(parse_hours("2.5E-2").unwrap(), Decimal::new(25, 3));
        assert_eq!(parse_hours("1e+2").unwrap(), Decimal::from(100));
        assert!(parse_hours("1e40").is_err());
    }

    #[test]
    fn rounded_totals_are_refused() {
        let big = parse_hours("1e27").unwrap();
        let cent = Decimal::new(1, 2);
        assert!(matches!(add_hours(big, cent), Err(BudgetError::InvalidInput(_))));
        assert!(sum_hours([big, cent]).is_err());
        assert_eq!(add_hours(big, Decimal::ONE).unwrap(), big + Decimal::ONE);
    }
}
