use bigdecimal::BigDecimal;
use std::fmt;
use std::str::FromStr;

pub const ACCOUNT_NUMBER_MIN_LEN: usize = 10;
pub const ACCOUNT_NUMBER_MAX_LEN: usize = 50;
pub const AMOUNT_INPUT_MAX_LEN: usize = 64;
/// Matches the NUMERIC(20, 2) ledger columns.
pub const AMOUNT_MAX_INTEGER_DIGITS: i64 = 18;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_account_number(field: &'static str, account_number: &str) -> ValidationResult {
    let account_number = sanitize_string(account_number);
    validate_required(field, &account_number)?;

    if account_number.len() < ACCOUNT_NUMBER_MIN_LEN
        || account_number.len() > ACCOUNT_NUMBER_MAX_LEN
    {
        return Err(ValidationError::new(
            field,
            format!(
                "must be between {} and {} characters",
                ACCOUNT_NUMBER_MIN_LEN, ACCOUNT_NUMBER_MAX_LEN
            ),
        ));
    }

    if !account_number
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
    {
        return Err(ValidationError::new(
            field,
            "must contain only letters, digits and hyphens",
        ));
    }

    Ok(())
}

/// Parses a caller-supplied amount into an exact decimal. Rejects
/// non-positive values and anything with more than 2 fractional digits;
/// money never passes through a float.
pub fn parse_amount(raw: &str) -> Result<BigDecimal, ValidationError> {
    let raw = sanitize_string(raw);
    validate_required("amount", &raw)?;

    if raw.len() > AMOUNT_INPUT_MAX_LEN {
        return Err(ValidationError::new(
            "amount",
            format!("must be at most {} characters", AMOUNT_INPUT_MAX_LEN),
        ));
    }

    let amount = BigDecimal::from_str(&raw)
        .map_err(|_| ValidationError::new("amount", "must be a decimal number"))?;

    if amount <= BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    // Trailing zeros carry no precision; "200.000" is exactly 200.00.
    let amount = amount.normalized();

    let (_, scale) = amount.as_bigint_and_exponent();
    if scale > 2 {
        return Err(ValidationError::new(
            "amount",
            "must have at most 2 decimal places",
        ));
    }

    // Bound the magnitude before rescaling: an exponent form like
    // "1e999999999" fits the input length cap but would expand to a
    // gigabyte-sized mantissa in with_scale. Digit arithmetic only, so
    // nothing is allocated for oversized values.
    if (amount.digits() as i64).saturating_sub(scale) > AMOUNT_MAX_INTEGER_DIGITS {
        return Err(ValidationError::new(
            "amount",
            format!(
                "must have at most {} integer digits",
                AMOUNT_MAX_INTEGER_DIGITS
            ),
        ));
    }

    Ok(amount.with_scale(2))
}
