//! Configuration validation utilities
//!
//! `ConfigValidator` accumulates every rule violation so an operator sees all
//! problems in a configuration file at once instead of fixing them one by one.

use std::fmt;

use crate::errors::GateError;

/// Configuration validation result
pub type ValidationResult = Result<(), ValidationErrors>;

/// Single rule violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Value is required but missing
    Required { field: String },
    /// Value is out of acceptable range
    OutOfRange {
        field: String,
        min: Option<i64>,
        max: Option<i64>,
        actual: i64,
    },
    /// Value format is invalid
    InvalidFormat {
        field: String,
        expected: String,
        actual: String,
    },
    /// Custom validation failed
    Custom { field: String, message: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Required { field } => {
                write!(f, "Field '{field}' is required but missing")
            }
            ValidationError::OutOfRange {
                field,
                min,
                max,
                actual,
            } => {
                let range_desc = match (min, max) {
                    (Some(min), Some(max)) => format!("between {min} and {max}"),
                    (Some(min), None) => format!("at least {min}"),
                    (None, Some(max)) => format!("at most {max}"),
                    (None, None) => "in valid range".to_string(),
                };
                write!(f, "Field '{field}' must be {range_desc} (got {actual})")
            }
            ValidationError::InvalidFormat {
                field,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Field '{field}' has invalid format. Expected: {expected}, got: {actual}"
                )
            }
            ValidationError::Custom { field, message } => {
                write!(f, "Field '{field}': {message}")
            }
        }
    }
}

/// Every violation found in one validation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationErrors> for GateError {
    fn from(err: ValidationErrors) -> Self {
        GateError::invalid(err.to_string())
    }
}

/// Accumulating validator
#[derive(Debug, Default)]
pub struct ConfigValidator {
    errors: Vec<ValidationError>,
    field_prefix: String,
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator for a nested section
    pub fn for_field(&self, field_name: &str) -> Self {
        Self {
            errors: Vec::new(),
            field_prefix: self.full_field_name(field_name),
        }
    }

    /// Value must be present
    pub fn required<T>(&mut self, field_name: &str, value: &Option<T>) -> &mut Self {
        if value.is_none() {
            self.errors.push(ValidationError::Required {
                field: self.full_field_name(field_name),
            });
        }
        self
    }

    /// Number must lie within `[min, max]`
    pub fn range(
        &mut self,
        field_name: &str,
        value: i64,
        min: Option<i64>,
        max: Option<i64>,
    ) -> &mut Self {
        let below = min.is_some_and(|min| value < min);
        let above = max.is_some_and(|max| value > max);
        if below || above {
            self.errors.push(ValidationError::OutOfRange {
                field: self.full_field_name(field_name),
                min,
                max,
                actual: value,
            });
        }
        self
    }

    /// Value must satisfy `predicate`
    pub fn custom<T, F>(&mut self, field_name: &str, value: &T, predicate: F, message: &str) -> &mut Self
    where
        F: FnOnce(&T) -> bool,
    {
        if !predicate(value) {
            self.errors.push(ValidationError::Custom {
                field: self.full_field_name(field_name),
                message: message.to_string(),
            });
        }
        self
    }

    /// String must parse with `parse`
    pub fn format<T, E>(
        &mut self,
        field_name: &str,
        value: &str,
        expected: &str,
        parse: impl FnOnce(&str) -> Result<T, E>,
    ) -> &mut Self {
        if parse(value).is_err() {
            self.errors.push(ValidationError::InvalidFormat {
                field: self.full_field_name(field_name),
                expected: expected.to_string(),
                actual: value.to_string(),
            });
        }
        self
    }

    /// Merge errors from a nested validator
    pub fn merge(&mut self, other: ConfigValidator) {
        self.errors.extend(other.errors);
    }

    /// Finish validation
    pub fn result(self) -> ValidationResult {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }

    fn full_field_name(&self, field_name: &str) -> String {
        if self.field_prefix.is_empty() {
            field_name.to_string()
        } else {
            format!("{}.{field_name}", self.field_prefix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_errors_are_prefixed_and_accumulated() {
        let mut root = ConfigValidator::new();
        let mut policy = root.for_field("policy");
        policy.range("payload_ttl_secs", 0, Some(1), Some(600));
        policy.required::<u8>("seed", &None);
        root.merge(policy);
        root.format("server.bind_address", "nope", "host:port", |s| {
            s.parse::<std::net::SocketAddr>()
        });

        let errors = root.result().unwrap_err();
        assert_eq!(errors.0.len(), 3);
        let text = errors.to_string();
        assert!(text.contains("policy.payload_ttl_secs"));
        assert!(text.contains("policy.seed"));
        assert!(text.contains("server.bind_address"));
    }

    #[test]
    fn clean_validator_passes() {
        let mut v = ConfigValidator::new();
        v.range("x", 5, Some(1), None);
        assert!(v.result().is_ok());
    }
}
