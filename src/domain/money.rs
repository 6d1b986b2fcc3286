use std::fmt;

/// Money is represented as whole yen. The yen has no minor unit in everyday use,
/// so an integer is exact for every amount a household ledger records.
pub type Yen = i64;

/// Largest amount a single entry may carry. Documents store amounts as JSON
/// numbers (f64), which represent integers exactly only up to 2^53 - 1.
pub const MAX_AMOUNT: Yen = (1 << 53) - 1;

/// Format yen with thousands separators.
/// Example: 1234567 -> "1,234,567", -1000 -> "-1,000"
pub fn format_yen(yen: Yen) -> String {
    let sign = if yen < 0 { "-" } else { "" };
    let digits = yen.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}{}", sign, grouped)
}

/// Parse user input into whole yen.
/// Thousands separators are accepted: "1,200" -> 1200. Decimal input is accepted
/// only when it has no fractional part: "500.0" -> 500, "12.5" is rejected.
pub fn parse_yen(input: &str) -> Result<Yen, ParseYenError> {
    let cleaned: String = input.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Err(ParseYenError::Empty);
    }

    if let Ok(yen) = cleaned.parse::<Yen>() {
        return if yen < 0 {
            Err(ParseYenError::Negative)
        } else if yen > MAX_AMOUNT {
            Err(ParseYenError::TooLarge)
        } else {
            Ok(yen)
        };
    }

    let value: f64 = cleaned
        .parse()
        .map_err(|_| ParseYenError::InvalidFormat)?;
    if !value.is_finite() {
        return Err(ParseYenError::InvalidFormat);
    }
    if value < 0.0 {
        return Err(ParseYenError::Negative);
    }
    if value.fract() != 0.0 {
        return Err(ParseYenError::Fractional);
    }
    if value > MAX_AMOUNT as f64 {
        return Err(ParseYenError::TooLarge);
    }
    Ok(value as Yen)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseYenError {
    Empty,
    InvalidFormat,
    Negative,
    Fractional,
    TooLarge,
}

impl fmt::Display for ParseYenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseYenError::Empty => write!(f, "amount is empty"),
            ParseYenError::InvalidFormat => write!(f, "invalid money format"),
            ParseYenError::Negative => write!(f, "amount must not be negative"),
            ParseYenError::Fractional => write!(f, "amount must be a whole number of yen"),
            ParseYenError::TooLarge => {
                write!(f, "amount must not exceed {} yen", format_yen(MAX_AMOUNT))
            }
        }
    }
}

impl std::error::Error for ParseYenError {}
