use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Required(String),
    TooShort { field: String, min: usize, actual: usize },
    TooLong { field: String, max: usize, actual: usize },
    InvalidFormat { field: String, expected: String },
    InvalidRange { field: String, min: String, max: String },
    InvalidValue { field: String, message: String },
    InvalidEmail { field: String },
    InvalidPhone { field: String },
}

impl ValidationError {
    pub fn field(&self) -> &str {
        match self {
            Self::Required(field) => field,
            Self::TooShort { field, .. }
            | Self::TooLong { field, .. }
            | Self::InvalidFormat { field, .. }
            | Self::InvalidRange { field, .. }
            | Self::InvalidValue { field, .. }
            | Self::InvalidEmail { field }
            | Self::InvalidPhone { field } => field,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required(field) => write!(f, "Field '{}' is required", field),
            Self::TooShort { field, min, actual } => {
                write!(f, "Field '{}' is too short: {} < {} chars", field, actual, min)
            }
            Self::TooLong { field, max, actual } => {
                write!(f, "Field '{}' is too long: {} > {} chars", field, actual, max)
            }
            Self::InvalidFormat { field, expected } => {
                write!(f, "Field '{}' has invalid format, expected: {}", field, expected)
            }
            Self::InvalidRange { field, min, max } => {
                write!(f, "Field '{}' must be between {} and {}", field, min, max)
            }
            Self::InvalidValue { field, message } => {
                write!(f, "Field '{}' has invalid value: {}", field, message)
            }
            Self::InvalidEmail { field } => write!(f, "Field '{}' is not a valid email address", field),
            Self::InvalidPhone { field } => write!(f, "Field '{}' is not a valid phone number", field),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Collects every failing field instead of stopping at the first one.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn check(&mut self, result: Result<(), ValidationError>) -> &mut Self {
        if let Err(e) = result {
            self.errors.push(e);
        }
        self
    }

    /// Records the error and yields `None` so the caller can keep validating.
    pub fn take<T>(&mut self, result: Result<T, ValidationError>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).expect("Invalid email regex")
});

static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[1-9]\d{6,14}$").expect("Invalid phone regex")
});

static USERNAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9_.-]{2,31}$").expect("Invalid username regex")
});

pub fn validate_required<'a>(value: Option<&'a str>, field_name: &str) -> Result<&'a str, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim()),
        _ => Err(ValidationError::Required(field_name.to_string())),
    }
}

pub fn validate_present<T>(value: Option<T>, field_name: &str) -> Result<T, ValidationError> {
    value.ok_or_else(|| ValidationError::Required(field_name.to_string()))
}

pub fn validate_length(
    value: &str,
    field_name: &str,
    min: Option<usize>,
    max: Option<usize>,
) -> Result<(), ValidationError> {
    let len = value.chars().count();

    if let Some(min_len) = min {
        if len < min_len {
            return Err(ValidationError::TooShort {
                field: field_name.to_string(),
                min: min_len,
                actual: len,
            });
        }
    }

    if let Some(max_len) = max {
        if len > max_len {
            return Err(ValidationError::TooLong {
                field: field_name.to_string(),
                max: max_len,
                actual: len,
            });
        }
    }

    Ok(())
}

pub fn validate_email(email: &str, field_name: &str) -> Result<(), ValidationError> {
    if email.len() <= 254 && EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail {
            field: field_name.to_string(),
        })
    }
}

pub fn validate_phone(phone: &str, field_name: &str) -> Result<(), ValidationError> {
    let digits: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    if PHONE_REGEX.is_match(&digits) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPhone {
            field: field_name.to_string(),
        })
    }
}

pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    if USERNAME_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            expected: "3-32 chars, starting with a letter".to_string(),
        })
    }
}

/// Exactly `count` ASCII digits, e.g. a 12 digit Aadhaar or 6 digit PIN code.
pub fn validate_digits(value: &str, field_name: &str, count: usize) -> Result<(), ValidationError> {
    if value.len() == count && value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidFormat {
            field: field_name.to_string(),
            expected: format!("{count} digits"),
        })
    }
}

pub fn validate_range<T: PartialOrd + std::fmt::Display>(
    value: T,
    field_name: &str,
    min: Option<T>,
    max: Option<T>,
) -> Result<(), ValidationError> {
    let min_str = min.as_ref().map(|m| m.to_string()).unwrap_or_else(|| "-∞".to_string());
    let max_str = max.as_ref().map(|m| m.to_string()).unwrap_or_else(|| "∞".to_string());

    let below = min.as_ref().is_some_and(|m| value < *m);
    let above = max.as_ref().is_some_and(|m| value > *m);

    if below || above {
        return Err(ValidationError::InvalidRange {
            field: field_name.to_string(),
            min: min_str,
            max: max_str,
        });
    }

    Ok(())
}

pub fn validate_positive(value: f64, field_name: &str) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: field_name.to_string(),
            message: "must be a positive number".to_string(),
        })
    }
}

/// Parses a token into one of the allowed enum values.
pub fn validate_choice<T: FromStr>(
    value: &str,
    field_name: &str,
    allowed: &[&str],
) -> Result<T, ValidationError> {
    value.parse::<T>().map_err(|_| ValidationError::InvalidValue {
        field: field_name.to_string(),
        message: format!("must be one of {:?}", allowed),
    })
}

/// Like [`validate_choice`] but falls back to `default` when the field is absent.
pub fn validate_optional_choice<T: FromStr>(
    value: Option<&str>,
    field_name: &str,
    allowed: &[&str],
    default: T,
) -> Result<T, ValidationError> {
    match value {
        None => Ok(default),
        Some(v) => validate_choice(v, field_name, allowed),
    }
}
