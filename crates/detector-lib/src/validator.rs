//! Input validation for prediction requests
//!
//! Checks run in passes driven by the schema: presence of every feature, then
//! positive numbers, then non-negative numbers, then booleans. The first
//! failure is reported.

use crate::error::{DetectorError, Result};
use crate::models::{FeatureRow, FeatureVector};
use crate::schema::{FeatureKind, FeatureSpec, FEATURES, NUM_FEATURES};
use serde_json::{Map, Value};

/// Validate a raw JSON object and build a feature vector from it.
///
/// Unknown keys are ignored.
pub fn validate(raw: &Map<String, Value>) -> Result<FeatureVector> {
    for spec in FEATURES.iter() {
        if !raw.contains_key(spec.name) {
            return Err(DetectorError::validation(
                spec.name,
                format!("Missing required field: {}", spec.name),
            ));
        }
    }

    let mut row: FeatureRow = [0.0; NUM_FEATURES];
    for pass in 0..=2 {
        for (i, spec) in FEATURES.iter().enumerate() {
            if spec.kind.check_order() != pass {
                continue;
            }
            // Presence was checked above
            let value = raw.get(spec.name).unwrap_or(&Value::Null);
            row[i] = check_value(spec, value)?;
        }
    }

    Ok(FeatureVector::from_row(row))
}

/// Validate a JSON value that should be an object
pub fn validate_value(raw: &Value) -> Result<FeatureVector> {
    match raw {
        Value::Object(map) => validate(map),
        _ => Err(DetectorError::validation("body", "No JSON data provided")),
    }
}

fn check_value(spec: &FeatureSpec, value: &Value) -> Result<f64> {
    let accepted = match spec.kind {
        FeatureKind::PositiveNumber => number(value).filter(|v| *v > 0.0),
        FeatureKind::NonNegativeNumber => number(value).filter(|v| *v >= 0.0),
        FeatureKind::Boolean => match value {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => number(value).filter(|v| *v == 0.0 || *v == 1.0),
        },
    };

    accepted.ok_or_else(|| {
        DetectorError::validation(
            spec.name,
            format!("{} must be {}", spec.name, spec.kind.describe()),
        )
    })
}

/// JSON numbers only; booleans, strings and null are not numbers
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "username_length": 12,
            "num_posts": 45,
            "num_followers": 234,
            "num_following": 156,
            "account_age_days": 120,
            "has_profile_picture": 1,
            "has_bio": 1,
            "engagement_ratio": 0.192,
            "is_verified": 0
        })
    }

    fn with(field: &str, value: Value) -> Value {
        let mut body = sample();
        body[field] = value;
        body
    }

    fn reason(result: Result<FeatureVector>) -> (String, String) {
        match result.unwrap_err() {
            DetectorError::Validation { field, reason } => (field, reason),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_input() {
        let vector = validate_value(&sample()).unwrap();
        assert_eq!(vector.username_length, 12.0);
        assert_eq!(vector.engagement_ratio, 0.192);
        assert_eq!(vector.is_verified, 0.0);
    }

    #[test]
    fn test_each_missing_field_named() {
        for spec in FEATURES.iter() {
            let mut body = sample();
            body.as_object_mut().unwrap().remove(spec.name);
            let (field, message) = reason(validate_value(&body));
            assert_eq!(field, spec.name);
            assert_eq!(message, format!("Missing required field: {}", spec.name));
        }
    }

    #[test]
    fn test_presence_checked_before_values() {
        let mut body = with("username_length", json!(-5));
        body.as_object_mut().unwrap().remove("is_verified");
        let (field, _) = reason(validate_value(&body));
        assert_eq!(field, "is_verified");
    }

    #[test]
    fn test_negative_followers_rejected_zero_accepted() {
        let (field, message) = reason(validate_value(&with("num_followers", json!(-1))));
        assert_eq!(field, "num_followers");
        assert_eq!(message, "num_followers must be a non-negative number");

        assert!(validate_value(&with("num_followers", json!(0))).is_ok());
    }

    #[test]
    fn test_positive_fields_reject_zero() {
        let (_, message) = reason(validate_value(&with("username_length", json!(0))));
        assert_eq!(message, "username_length must be a positive number");
        assert!(validate_value(&with("account_age_days", json!(0))).is_err());
    }

    #[test]
    fn test_positive_pass_runs_before_non_negative_pass() {
        let mut body = with("num_posts", json!(-1));
        body["account_age_days"] = json!(-1);
        let (field, _) = reason(validate_value(&body));
        assert_eq!(field, "account_age_days");
    }

    #[test]
    fn test_boolean_fields() {
        assert!(validate_value(&with("has_bio", json!(true))).is_ok());
        let vector = validate_value(&with("has_bio", json!(false))).unwrap();
        assert_eq!(vector.has_bio, 0.0);

        let (_, message) = reason(validate_value(&with("has_bio", json!(2))));
        assert_eq!(message, "has_bio must be 0 or 1");
    }

    #[test]
    fn test_non_numeric_values_are_validation_errors() {
        for bad in [json!("12"), json!(null), json!([1]), json!({"v": 1}), json!(true)] {
            let err = validate_value(&with("num_posts", bad)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValidationError);
        }
    }

    #[test]
    fn test_extra_keys_ignored() {
        let body = with("favorite_color", json!("blue"));
        assert!(validate_value(&body).is_ok());
    }

    #[test]
    fn test_non_object_body() {
        let (_, message) = reason(validate_value(&json!([1, 2, 3])));
        assert_eq!(message, "No JSON data provided");
    }
}
