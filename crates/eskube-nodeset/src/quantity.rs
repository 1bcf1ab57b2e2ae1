//! Kubernetes resource quantities
//!
//! Quantities are kept as an exact decimal (`numerator / 10^scale`) so that
//! `0.1` CPU is exactly 100 millicores and `1Gi` compares equal to
//! `1073741824`.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use thiserror::Error;

/// A quantity string that does not follow the Kubernetes grammar
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid quantity {0:?}")]
pub struct QuantityError(pub String);

/// Exact value of a quantity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedQuantity {
    numerator: i128,
    scale: u32,
}

const BINARY_SUFFIXES: &[(&str, u32)] = &[
    ("Ki", 1),
    ("Mi", 2),
    ("Gi", 3),
    ("Ti", 4),
    ("Pi", 5),
    ("Ei", 6),
];

const DECIMAL_SUFFIXES: &[(&str, i32)] = &[
    ("n", -9),
    ("u", -6),
    ("m", -3),
    ("k", 3),
    ("M", 6),
    ("G", 9),
    ("T", 12),
    ("P", 15),
    ("E", 18),
];

impl ParsedQuantity {
    fn normalized(mut numerator: i128, mut scale: u32) -> Self {
        while scale > 0 && numerator % 10 == 0 {
            numerator /= 10;
            scale -= 1;
        }
        if numerator == 0 {
            scale = 0;
        }
        Self { numerator, scale }
    }

    /// True for a zero quantity
    pub fn is_zero(&self) -> bool {
        self.numerator == 0
    }

    /// Value rounded up to an integer
    pub fn value(&self) -> i64 {
        ceil_div(self.numerator, 10i128.pow(self.scale))
    }

    /// Value in thousandths, rounded up
    pub fn milli_value(&self) -> i64 {
        ceil_div(self.numerator * 1000, 10i128.pow(self.scale))
    }

    /// Value as a float, for processor counts
    pub fn as_f64(&self) -> f64 {
        self.milli_value() as f64 / 1000.0
    }
}

fn ceil_div(n: i128, d: i128) -> i64 {
    let q = n.div_euclid(d) + i128::from(n.rem_euclid(d) != 0);
    q.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

fn invalid(input: &str) -> QuantityError {
    QuantityError(input.to_string())
}

/// Parse a quantity string such as `500m`, `1.5Gi` or `1e3`
pub fn parse(input: &str) -> Result<ParsedQuantity, QuantityError> {
    let s = input.trim();
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'-') => (-1i128, &s[1..]),
        Some(b'+') => (1i128, &s[1..]),
        _ => (1i128, s),
    };

    let number_len = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let (number, suffix) = rest.split_at(number_len);
    if number.is_empty() || number == "." || number.matches('.').count() > 1 {
        return Err(invalid(input));
    }

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    let digits = format!("{whole}{fraction}");
    let mut numerator: i128 = digits.parse().map_err(|_| invalid(input))?;
    let mut scale = u32::try_from(fraction.len()).map_err(|_| invalid(input))?;

    let mut exponent: i32 = 0;
    if let Some((_, power)) = BINARY_SUFFIXES.iter().find(|(sfx, _)| *sfx == suffix) {
        numerator = numerator
            .checked_mul(1024i128.pow(*power))
            .ok_or_else(|| invalid(input))?;
    } else if let Some((_, exp)) = DECIMAL_SUFFIXES.iter().find(|(sfx, _)| *sfx == suffix) {
        exponent = *exp;
    } else if let Some(exp) = suffix.strip_prefix(['e', 'E']) {
        exponent = exp.parse().map_err(|_| invalid(input))?;
    } else if !suffix.is_empty() {
        return Err(invalid(input));
    }

    if exponent >= 0 {
        numerator = numerator
            .checked_mul(10i128.checked_pow(exponent.unsigned_abs()).ok_or_else(|| invalid(input))?)
            .ok_or_else(|| invalid(input))?;
    } else {
        scale += exponent.unsigned_abs();
    }
    if scale > 30 {
        return Err(invalid(input));
    }

    Ok(ParsedQuantity::normalized(sign * numerator, scale))
}

/// Parse a Kubernetes `Quantity`
pub fn parse_quantity(q: &Quantity) -> Result<ParsedQuantity, QuantityError> {
    parse(&q.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_and_decimal_suffixes() {
        assert_eq!(parse("1Gi").map(|q| q.value()), Ok(1_073_741_824));
        assert_eq!(parse("2Gi").map(|q| q.value()), Ok(2_147_483_648));
        assert_eq!(parse("1.5Gi").map(|q| q.value()), Ok(1_610_612_736));
        assert_eq!(parse("10G").map(|q| q.value()), Ok(10_000_000_000));
        assert_eq!(parse("128974848").map(|q| q.value()), Ok(128_974_848));
        assert_eq!(parse("129e6").map(|q| q.value()), Ok(129_000_000));
        assert_eq!(parse("1k").map(|q| q.value()), Ok(1000));
    }

    #[test]
    fn test_millis() {
        let q = parse("100m").expect("valid");
        assert_eq!(q.milli_value(), 100);
        assert_eq!(q.value(), 1);
        assert_eq!(parse("0.1").map(|q| q.milli_value()), Ok(100));
        assert_eq!(parse("2").map(|q| q.as_f64()), Ok(2.0));
        assert_eq!(parse("1500m").map(|q| q.as_f64()), Ok(1.5));
    }

    #[test]
    fn test_equal_representations() {
        assert_eq!(parse("1Gi"), parse("1073741824"));
        assert_eq!(parse("1000m"), parse("1"));
        assert_eq!(parse("0.5"), parse("500m"));
        assert_ne!(parse("1G"), parse("1Gi"));
    }

    #[test]
    fn test_zero_and_invalid() {
        assert!(parse("0").map(|q| q.is_zero()).unwrap_or(false));
        assert!(parse("0Gi").map(|q| q.is_zero()).unwrap_or(false));
        assert!(parse("").is_err());
        assert!(parse("abc").is_err());
        assert!(parse("1.2.3").is_err());
        assert!(parse("5Xi").is_err());
    }
}
