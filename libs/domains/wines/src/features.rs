//! Request payloads → ordered feature vectors.
//!
//! Two schemas are supported:
//!
//! - [`SimpleWine`]: `type`, `body`, `dryness`, `abv`, encoded as the 6-element
//!   vector `[body, abv, is_rose, is_sparkling, is_white, dryness]`.
//! - [`UserFeatures`]: the 55 user-preference features in [`USER_FEATURES`]
//!   order, fed to the user tower of the recommendation model.

use serde::Deserialize;
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::error::{WineError, WineResult};

/// Keys that only appear in the simple wine schema.
pub const SIMPLE_KEYS: [&str; 4] = ["type", "body", "dryness", "abv"];

/// Key whose presence marks a payload as the comprehensive schema.
const DISCRIMINATOR: &str = "rating_mean";

const SIMPLE_PAYLOAD_REJECTED: &str = "Two Tower Model requires comprehensive user features (55 features). \
     Simple preferences format is not supported. Please provide all required user features.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, EnumString, Display, ToSchema)]
#[serde(try_from = "String")]
#[strum(ascii_case_insensitive)]
pub enum WineType {
    Red,
    White,
    Rose,
    Sparkling,
}

impl TryFrom<String> for WineType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .parse()
            .map_err(|_| format!("Field 'type' must be one of Red, White, Rose, Sparkling, got '{}'", value))
    }
}

/// Wine described by its basic attributes.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate, ToSchema)]
pub struct SimpleWine {
    #[serde(rename = "type")]
    pub wine_type: WineType,
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    #[schema(minimum = 1, maximum = 5, example = 3)]
    pub body: i64,
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    #[schema(minimum = 1, maximum = 5, example = 2)]
    pub dryness: i64,
    #[validate(range(min = 0.0, max = 25.0, message = "must be between 0 and 25"))]
    #[schema(minimum = 0, maximum = 25, example = 12.5)]
    pub abv: f64,
}

impl SimpleWine {
    /// Parses and validates a simple wine payload. Unknown keys are ignored.
    pub fn from_value(value: &Value) -> WineResult<Self> {
        let map = as_object(value)?;
        let mut normalized = map.clone();

        for key in SIMPLE_KEYS {
            let field = map
                .get(key)
                .ok_or_else(|| WineError::Validation(format!("Missing required field: {}", key)))?;

            let mistyped = |expected: &str| {
                WineError::Validation(format!("Field '{}' must be {}", key, expected))
            };
            match key {
                "type" if !field.is_string() => return Err(mistyped("a string")),
                "abv" if !field.is_number() => return Err(mistyped("a number")),
                "body" | "dryness" => {
                    let integer = as_integer(field).ok_or_else(|| mistyped("an integer"))?;
                    normalized.insert(key.to_string(), Value::from(integer));
                }
                _ => {}
            }
        }

        let wine: SimpleWine = serde_json::from_value(Value::Object(normalized))
            .map_err(|e| WineError::Validation(e.to_string()))?;
        wine.validate().map_err(|e| WineError::Validation(describe(&e)))?;

        Ok(wine)
    }

    /// `[body, abv, is_rose, is_sparkling, is_white, dryness]`; red sets no flag.
    pub fn to_vector(&self) -> Vec<f32> {
        let flag = |t: WineType| if self.wine_type == t { 1.0 } else { 0.0 };

        vec![
            self.body as f32,
            self.abv as f32,
            flag(WineType::Rose),
            flag(WineType::Sparkling),
            flag(WineType::White),
            self.dryness as f32,
        ]
    }
}

/// Allowed range of one user feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bounds {
    Unbounded,
    NonNegative,
    /// Inclusive [0, 5], the rating scale
    Rating,
    /// Inclusive [0, 1]
    Proportion,
}

impl Bounds {
    fn check(self, value: f64) -> Result<(), &'static str> {
        let ok = match self {
            Bounds::Unbounded => true,
            Bounds::NonNegative => value >= 0.0,
            Bounds::Rating => (0.0..=5.0).contains(&value),
            Bounds::Proportion => (0.0..=1.0).contains(&value),
        };

        if ok {
            Ok(())
        } else {
            Err(match self {
                Bounds::Unbounded => "is invalid",
                Bounds::NonNegative => "must be >= 0",
                Bounds::Rating => "must be between 0 and 5",
                Bounds::Proportion => "must be between 0 and 1",
            })
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub bounds: Bounds,
}

const fn feature(name: &'static str, bounds: Bounds) -> FeatureSpec {
    FeatureSpec { name, bounds }
}

pub const USER_FEATURE_COUNT: usize = 55;

/// Canonical user features. Vector position follows this order.
pub const USER_FEATURES: [FeatureSpec; USER_FEATURE_COUNT] = {
    use Bounds::*;
    [
        // rating statistics
        feature("rating_mean", Unbounded),
        feature("rating_std", NonNegative),
        feature("rating_count", NonNegative),
        feature("rating_min", Rating),
        feature("rating_max", Rating),
        feature("wines_tried", NonNegative),
        feature("avg_ratings_per_wine", NonNegative),
        feature("coefficient_of_variation", Unbounded),
        // wine type
        feature("red_wine_preference", Unbounded),
        feature("white_wine_preference", Unbounded),
        feature("sparkling_wine_preference", Unbounded),
        feature("rose_wine_preference", Unbounded),
        feature("dessert_wine_preference", Unbounded),
        feature("dessert_port_wine_preference", Unbounded),
        // abv
        feature("weighted_abv_preference", Unbounded),
        feature("avg_abv_tried", Unbounded),
        feature("high_vs_low_abv_preference", Unbounded),
        // body
        feature("very_light_bodied_preference", Unbounded),
        feature("light_bodied_preference", Unbounded),
        feature("medium_bodied_preference", Unbounded),
        feature("full_bodied_preference", Unbounded),
        feature("very_full_bodied_preference", Unbounded),
        // acidity
        feature("low_acidity_preference", Unbounded),
        feature("medium_acidity_preference", Unbounded),
        feature("high_acidity_preference", Unbounded),
        // country
        feature("country_1_preference", Unbounded),
        feature("country_2_preference", Unbounded),
        feature("country_3_preference", Unbounded),
        feature("country_4_preference", Unbounded),
        feature("country_5_preference", Unbounded),
        // grape
        feature("grape_1_preference", Unbounded),
        feature("grape_2_preference", Unbounded),
        feature("grape_3_preference", Unbounded),
        feature("grape_4_preference", Unbounded),
        feature("grape_5_preference", Unbounded),
        // complexity
        feature("complexity_preference", Unbounded),
        feature("avg_complexity_tried", Unbounded),
        // quality
        feature("reserve_preference", Unbounded),
        feature("grand_preference", Unbounded),
        // rating patterns
        feature("high_rating_proportion", Proportion),
        feature("low_rating_proportion", Proportion),
        feature("rating_entropy", NonNegative),
        feature("rating_1_proportion", Proportion),
        feature("rating_2_proportion", Proportion),
        feature("rating_3_proportion", Proportion),
        feature("rating_4_proportion", Proportion),
        feature("rating_5_proportion", Proportion),
        // diversity
        feature("rating_range", NonNegative),
        feature("rating_variance", NonNegative),
        feature("unique_ratings_count", NonNegative),
        feature("rating_skewness", Unbounded),
        // temporal
        feature("date_range_days", NonNegative),
        feature("avg_days_between_ratings", NonNegative),
        feature("rating_trend", Unbounded),
        feature("rating_frequency", NonNegative),
    ]
};

/// The 55 user-preference features, ordered as [`USER_FEATURES`].
#[derive(Debug, Clone, PartialEq)]
pub struct UserFeatures {
    values: [f64; USER_FEATURE_COUNT],
}

impl UserFeatures {
    /// Validates a flattened feature mapping. The schema is closed: every
    /// feature is required and any other key is rejected.
    pub fn from_map(map: &Map<String, Value>) -> WineResult<Self> {
        if let Some(unknown) = map
            .keys()
            .find(|key| !USER_FEATURES.iter().any(|f| f.name == key.as_str()))
        {
            return Err(WineError::Validation(format!("Unknown field: {}", unknown)));
        }

        let mut values = [0.0f64; USER_FEATURE_COUNT];
        for (slot, spec) in values.iter_mut().zip(USER_FEATURES.iter()) {
            let raw = map.get(spec.name).ok_or_else(|| {
                WineError::Validation(format!("Missing required field: {}", spec.name))
            })?;

            let number = raw.as_f64().ok_or_else(|| {
                WineError::Validation(format!("Field '{}' must be a number", spec.name))
            })?;

            spec.bounds.check(number).map_err(|reason| {
                WineError::Validation(format!("Field '{}' {}", spec.name, reason))
            })?;

            *slot = number;
        }

        Ok(Self { values })
    }

    /// Two-tower preprocessing: only the comprehensive schema is accepted.
    pub fn from_preferences(value: &Value) -> WineResult<Self> {
        let map = as_object(value)?;

        if !map.contains_key(DISCRIMINATOR) {
            return Err(WineError::Validation(SIMPLE_PAYLOAD_REJECTED.to_string()));
        }
        reject_mixed(map)?;

        Self::from_map(map)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

/// JSON integers, plus floats with no fractional part (`3.0`).
fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() <= i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn as_object(value: &Value) -> WineResult<&Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| WineError::Validation("Request body must be a JSON object".to_string()))
}

fn reject_mixed(map: &Map<String, Value>) -> WineResult<()> {
    match SIMPLE_KEYS.iter().find(|key| map.contains_key(**key)) {
        Some(key) => Err(WineError::Validation(format!(
            "Mixed feature payload: '{}' cannot be combined with user preference features",
            key
        ))),
        None => Ok(()),
    }
}

/// Flattens validator output into "Field 'x' ..." messages, sorted by field.
fn describe(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => format!("Field '{}' {}", field, message),
                None => format!("Field '{}' is invalid", field),
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}


#[cfg(test)]
mod tests {
    use super::fixtures::user_features_json;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_wine_rose_vector() {
        let wine =
            SimpleWine::from_value(&json!({"type": "Rose", "body": 3, "dryness": 2, "abv": 12.5}))
                .unwrap();
        assert_eq!(wine.to_vector(), vec![3.0, 12.5, 1.0, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_simple_wine_type_is_case_insensitive_and_red_sets_no_flag() {
        let red = SimpleWine::from_value(&json!({"type": "RED", "body": 5, "dryness": 5, "abv": 14}))
            .unwrap();
        assert_eq!(red.wine_type, WineType::Red);
        assert_eq!(red.to_vector(), vec![5.0, 14.0, 0.0, 0.0, 0.0, 5.0]);

        let sparkling =
            SimpleWine::from_value(&json!({"type": "sparkling", "body": 1, "dryness": 1, "abv": 0}))
                .unwrap();
        assert_eq!(sparkling.to_vector()[3], 1.0);
    }

    #[test]
    fn test_simple_wine_body_out_of_range() {
        let err = SimpleWine::from_value(&json!({"type": "Red", "body": 6, "dryness": 2, "abv": 12}))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("body"), "{}", err);
    }

    #[test]
    fn test_simple_wine_missing_and_mistyped_fields_name_the_field() {
        let missing = SimpleWine::from_value(&json!({"type": "Red", "body": 3, "abv": 12}))
            .unwrap_err();
        assert_eq!(missing.to_string(), "Missing required field: dryness");

        let mistyped =
            SimpleWine::from_value(&json!({"type": "Red", "body": "3", "dryness": 2, "abv": 12}))
                .unwrap_err();
        assert_eq!(mistyped.to_string(), "Field 'body' must be an integer");

        let abv = SimpleWine::from_value(&json!({"type": "Red", "body": 3, "dryness": 2, "abv": 30}))
            .unwrap_err();
        assert!(abv.to_string().contains("abv"));
    }

    #[test]
    fn test_simple_wine_accepts_whole_floats_for_integer_fields() {
        let wine =
            SimpleWine::from_value(&json!({"type": "Red", "body": 3.0, "dryness": 2.0, "abv": 13}))
                .unwrap();
        assert_eq!(wine.body, 3);
        assert_eq!(wine.to_vector(), vec![3.0, 13.0, 0.0, 0.0, 0.0, 2.0]);

        let fractional =
            SimpleWine::from_value(&json!({"type": "Red", "body": 3.5, "dryness": 2, "abv": 13}))
                .unwrap_err();
        assert_eq!(fractional.to_string(), "Field 'body' must be an integer");

        let out_of_range =
            SimpleWine::from_value(&json!({"type": "Red", "body": 6.0, "dryness": 2, "abv": 13}))
                .unwrap_err();
        assert!(out_of_range.to_string().contains("body"));
    }

    #[test]
    fn test_simple_wine_unknown_type() {
        let err = SimpleWine::from_value(&json!({"type": "Orange", "body": 3, "dryness": 2, "abv": 12}))
            .unwrap_err();
        assert!(err.to_string().contains("type"));
    }

    #[test]
    fn test_simple_wine_ignores_unknown_keys() {
        let wine = SimpleWine::from_value(
            &json!({"type": "White", "body": 2, "dryness": 4, "abv": 11, "vintage": 2019}),
        )
        .unwrap();
        assert_eq!(wine.to_vector()[4], 1.0);
    }

    #[test]
    fn test_user_features_ordered_vector() {
        let mut payload = user_features_json();
        payload["rating_mean"] = json!(4.25);
        payload["rating_frequency"] = json!(0.75);

        let features = UserFeatures::from_map(payload.as_object().unwrap()).unwrap();
        assert_eq!(features.as_slice().len(), USER_FEATURE_COUNT);
        assert_eq!(features.as_slice()[0], 4.25);
        assert_eq!(features.as_slice()[USER_FEATURE_COUNT - 1], 0.75);
    }

    #[test]
    fn test_user_features_names_are_unique() {
        let mut names: Vec<_> = USER_FEATURES.iter().map(|f| f.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), USER_FEATURE_COUNT);
    }

    #[test]
    fn test_user_features_missing_key() {
        let mut payload = user_features_json();
        payload.as_object_mut().unwrap().remove("rating_trend");

        let err = UserFeatures::from_map(payload.as_object().unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: rating_trend");
    }

    #[test]
    fn test_user_features_unknown_key() {
        let mut payload = user_features_json();
        payload["favourite_colour"] = json!(1);

        let err = UserFeatures::from_map(payload.as_object().unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "Unknown field: favourite_colour");
    }

    #[test]
    fn test_user_features_range_checks() {
        let cases = [
            ("rating_std", json!(-0.1), "must be >= 0"),
            ("rating_max", json!(5.5), "must be between 0 and 5"),
            ("rating_3_proportion", json!(1.01), "must be between 0 and 1"),
        ];

        for (field, value, reason) in cases {
            let mut payload = user_features_json();
            payload[field] = value;
            let err = UserFeatures::from_map(payload.as_object().unwrap()).unwrap_err();
            assert_eq!(err.to_string(), format!("Field '{}' {}", field, reason));
        }
    }

    #[test]
    fn test_user_features_unbounded_accepts_negative() {
        let mut payload = user_features_json();
        payload["rating_trend"] = json!(-2.5);
        assert!(UserFeatures::from_map(payload.as_object().unwrap()).is_ok());
    }

    #[test]
    fn test_from_preferences_rejects_simple_payload() {
        let err = UserFeatures::from_preferences(&json!({"type": "Red", "body": 3})).unwrap_err();
        assert!(err.to_string().starts_with("Two Tower Model requires comprehensive user features"));
    }

    #[test]
    fn test_from_preferences_rejects_mixed_payload() {
        let mut payload = user_features_json();
        payload["abv"] = json!(12.0);

        let err = UserFeatures::from_preferences(&payload).unwrap_err();
        assert!(err.to_string().contains("Mixed feature payload"));
    }

    #[test]
    fn test_non_object_body_is_rejected() {
        assert!(UserFeatures::from_preferences(&json!([1, 2, 3])).unwrap_err().is_validation());
        assert!(SimpleWine::from_value(&json!("red")).unwrap_err().is_validation());
    }

    #[test]
    fn test_user_features_keep_full_precision() {
        let mut payload = user_features_json();
        payload["rating_count"] = json!(1e39);
        payload["rating_trend"] = json!(0.1);

        let features = UserFeatures::from_map(payload.as_object().unwrap()).unwrap();
        let count = USER_FEATURES.iter().position(|f| f.name == "rating_count").unwrap();
        let trend = USER_FEATURES.iter().position(|f| f.name == "rating_trend").unwrap();
        assert_eq!(features.as_slice()[count], 1e39);
        assert!(features.as_slice()[count].is_finite());
        assert_eq!(features.as_slice()[trend], 0.1);
    }
}
