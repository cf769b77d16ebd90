//! Per-field validators

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::crud::is_blank;

/// Custom validation predicate
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Rule applied to one field of a row before it is written
#[derive(Clone)]
pub enum FieldValidator {
    /// Present, not null, not an empty string
    Required,
    /// Numeric lower bound (inclusive)
    Min(f64),
    /// Numeric upper bound (inclusive)
    Max(f64),
    /// Minimum length of a string (chars) or array
    MinLength(usize),
    /// Maximum length of a string (chars) or array
    MaxLength(usize),
    Custom {
        name: String,
        predicate: Predicate,
        message: String,
    },
}

impl FieldValidator {
    pub fn custom(
        name: impl Into<String>,
        message: impl Into<String>,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        FieldValidator::Custom {
            name: name.into(),
            predicate: Arc::new(predicate),
            message: message.into(),
        }
    }

    /// Check a field value; `Err` carries the failure reason.
    ///
    /// Only `Required` fails on an absent or null value; the other rules
    /// apply to values that are present.
    pub fn check(&self, value: Option<&Value>) -> Result<(), String> {
        if let FieldValidator::Required = self {
            return match value {
                Some(v) if !is_blank(v) => Ok(()),
                _ => Err("is required".to_string()),
            };
        }

        let value = match value {
            None | Some(Value::Null) => return Ok(()),
            Some(v) => v,
        };

        match self {
            FieldValidator::Required => Ok(()),
            FieldValidator::Min(min) => match as_number(value) {
                Some(n) if n >= *min => Ok(()),
                Some(_) => Err(format!("must be >= {}", min)),
                None => Err("must be a number".to_string()),
            },
            FieldValidator::Max(max) => match as_number(value) {
                Some(n) if n <= *max => Ok(()),
                Some(_) => Err(format!("must be <= {}", max)),
                None => Err("must be a number".to_string()),
            },
            FieldValidator::MinLength(min) => match length_of(value) {
                Some(len) if len >= *min => Ok(()),
                Some(_) => Err(format!("must have at least {} characters", min)),
                None => Err("must be a string or array".to_string()),
            },
            FieldValidator::MaxLength(max) => match length_of(value) {
                Some(len) if len <= *max => Ok(()),
                Some(_) => Err(format!("must have at most {} characters", max)),
                None => Err("must be a string or array".to_string()),
            },
            FieldValidator::Custom {
                predicate, message, ..
            } => {
                if predicate(value) {
                    Ok(())
                } else {
                    Err(message.clone())
                }
            }
        }
    }
}

impl fmt::Debug for FieldValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValidator::Required => write!(f, "Required"),
            FieldValidator::Min(n) => write!(f, "Min({})", n),
            FieldValidator::Max(n) => write!(f, "Max({})", n),
            FieldValidator::MinLength(n) => write!(f, "MinLength({})", n),
            FieldValidator::MaxLength(n) => write!(f, "MaxLength({})", n),
            FieldValidator::Custom { name, .. } => write!(f, "Custom({})", name),
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required() {
        let v = FieldValidator::Required;
        assert!(v.check(Some(&json!("x"))).is_ok());
        assert!(v.check(Some(&json!(0))).is_ok());
        assert!(v.check(None).is_err());
        assert!(v.check(Some(&json!(""))).is_err());
        assert!(v.check(Some(&json!(null))).is_err());
    }

    #[test]
    fn test_bounds_skip_absent_values() {
        assert!(FieldValidator::Min(0.0).check(None).is_ok());
        assert!(FieldValidator::Min(0.0).check(Some(&json!(-1))).is_err());
        assert!(FieldValidator::Min(0.0).check(Some(&json!("2.5"))).is_ok());
        assert!(FieldValidator::Max(10.0).check(Some(&json!(11))).is_err());
        assert!(FieldValidator::Max(10.0).check(Some(&json!("abc"))).is_err());
    }

    #[test]
    fn test_lengths() {
        assert!(FieldValidator::MinLength(3).check(Some(&json!("ab"))).is_err());
        assert!(FieldValidator::MinLength(2).check(Some(&json!("éé"))).is_ok());
        assert!(FieldValidator::MaxLength(1).check(Some(&json!([1, 2]))).is_err());
    }

    #[test]
    fn test_custom() {
        let sku = FieldValidator::custom("sku", "must start with SKU-", |v| {
            v.as_str().is_some_and(|s| s.starts_with("SKU-"))
        });
        assert!(sku.check(Some(&json!("SKU-1"))).is_ok());
        assert_eq!(sku.check(Some(&json!("1"))).unwrap_err(), "must start with SKU-");
        assert_eq!(format!("{:?}", sku), "Custom(sku)");
    }
}
