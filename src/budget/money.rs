//! Decimal string to fixed-point money conversion.

use serde::{Deserialize, Serialize};

use crate::error::{BudgetError, Result};

pub const DEFAULT_CURRENCY: &str = "USD";

/// Digits of precision carried by `nanos`.
const NANO_DIGITS: usize = 9;

/// A fixed-point amount as the billing API expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoneyAmount {
    pub currency_code: String,
    /// Whole units, kept as the integer substring of the input.
    pub units: String,
    /// Always within ±999_999_999 and carries the sign of the whole amount.
    pub nanos: i32,
}

impl MoneyAmount {
    /// Convert a decimal string such as `"1000.25"` or `"-5.5"`.
    ///
    /// Fractional digits past the ninth are truncated, never rounded.
    pub fn from_decimal(amount: &str, currency: Option<&str>) -> Result<Self> {
        let amount = amount.trim();
        let value: f64 = amount
            .parse()
            .map_err(|_| BudgetError::invalid_argument(format!("amount '{}' is not numeric", amount)))?;
        if !value.is_finite() {
            return Err(BudgetError::invalid_argument(format!(
                "amount '{}' is not a finite number",
                amount
            )));
        }

        let (units, fraction) = match amount.split_once('.') {
            Some((units, fraction)) => (units, Some(fraction)),
            None => (amount, None),
        };

        let digits = units.strip_prefix(['-', '+']).unwrap_or(units);
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(BudgetError::invalid_argument(format!(
                "amount '{}' has a non-decimal integer part",
                amount
            )));
        }

        let mut nanos = match fraction {
            Some(fraction) => {
                let mut digits: String = fraction.chars().take(NANO_DIGITS).collect();
                if !digits.chars().all(|c| c.is_ascii_digit()) {
                    return Err(BudgetError::invalid_argument(format!(
                        "amount '{}' has a non-decimal fractional part",
                        amount
                    )));
                }
                while digits.len() < NANO_DIGITS {
                    digits.push('0');
                }
                // nine digits always fit in an i32
                digits.parse::<i32>().unwrap_or(0)
            }
            None => 0,
        };
        if value < 0.0 || (value == 0.0 && units.starts_with('-')) {
            nanos = -nanos;
        }

        Ok(Self {
            currency_code: currency.unwrap_or(DEFAULT_CURRENCY).to_string(),
            units: units.to_string(),
            nanos,
        })
    }

    /// Recombine units and nanos into a float, mainly for display.
    pub fn as_f64(&self) -> f64 {
        let units: f64 = self.units.parse().unwrap_or(0.0);
        units + f64::from(self.nanos) / 1e9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_amount_has_zero_nanos() {
        let money = MoneyAmount::from_decimal("1000", None).unwrap();
        assert_eq!(money.currency_code, "USD");
        assert_eq!(money.units, "1000");
        assert_eq!(money.nanos, 0);
    }

    #[test]
    fn test_fraction_is_right_padded() {
        let money = MoneyAmount::from_decimal("1000.25", Some("EUR")).unwrap();
        assert_eq!(money.currency_code, "EUR");
        assert_eq!(money.units, "1000");
        assert_eq!(money.nanos, 250_000_000);
    }

    #[test]
    fn test_excess_digits_are_truncated_not_rounded() {
        let money = MoneyAmount::from_decimal("1.9999999999", None).unwrap();
        assert_eq!(money.units, "1");
        assert_eq!(money.nanos, 999_999_999);
    }

    #[test]
    fn test_negative_amount_carries_sign_into_nanos() {
        let money = MoneyAmount::from_decimal("-5.5", None).unwrap();
        assert_eq!(money.units, "-5");
        assert_eq!(money.nanos, -500_000_000);

        let money = MoneyAmount::from_decimal("-0.25", None).unwrap();
        assert_eq!(money.units, "-0");
        assert_eq!(money.nanos, -250_000_000);
    }

    #[test]
    fn test_recombined_value_matches_input() {
        for input in ["0.5", "12.000000001", "-3.75", "42", "7.123456789"] {
            let money = MoneyAmount::from_decimal(input, None).unwrap();
            let expected: f64 = input.parse().unwrap();
            assert!((money.as_f64() - expected).abs() < 1e-9, "{}", input);
        }
    }

    #[test]
    fn test_non_numeric_amount_is_rejected() {
        assert!(matches!(
            MoneyAmount::from_decimal("lots", None),
            Err(BudgetError::InvalidArgument(_))
        ));
        assert!(MoneyAmount::from_decimal("NaN", None).is_err());
        assert!(MoneyAmount::from_decimal("1.5e3", None).is_err());
    }

    #[test]
    fn test_exponent_without_fraction_is_rejected() {
        assert!(matches!(
            MoneyAmount::from_decimal("1e3", None),
            Err(BudgetError::InvalidArgument(_))
        ));
        assert!(MoneyAmount::from_decimal("-2E2", None).is_err());
        assert_eq!(MoneyAmount::from_decimal("+7", None).unwrap().units, "+7");
    }

    #[test]
    fn test_serializes_with_api_field_names() {
        let money = MoneyAmount::from_decimal("10.5", None).unwrap();
        let json = serde_json::to_value(&money).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"currencyCode": "USD", "units": "10", "nanos": 500000000})
        );
    }
}
