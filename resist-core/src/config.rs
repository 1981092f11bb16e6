//! Resistance curve parameters
//!
//! Persisted values are untrusted: every field is validated on its own and
//! replaced by its default when it is missing, non-numeric, non-finite or out
//! of range. The only cross-field rule is that the ceiling never sits below the
//! base multiplier.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    DEFAULT_BASE_MULTIPLIER, DEFAULT_DISTANCE_WEIGHT, DEFAULT_INCREMENT_PER_SCROLL,
    DEFAULT_MAX_MULTIPLIER, DEFAULT_RECOVERY_PER_SECOND,
};

/// Validated snapshot of the resistance curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResistanceConfig {
    /// Multiplier applied with zero accumulated activity
    pub base_multiplier: f64,

    /// Multiplier growth per scroll unit
    pub increment_per_scroll: f64,

    /// Upper bound on the multiplier (never below `base_multiplier`)
    pub max_multiplier: f64,

    /// Scroll units shed per recovery tick
    pub recovery_per_second: f64,

    /// Wheel distance normalised into one scroll unit
    pub distance_weight: f64,
}

impl Default for ResistanceConfig {
    fn default() -> Self {
        Self {
            base_multiplier: DEFAULT_BASE_MULTIPLIER,
            increment_per_scroll: DEFAULT_INCREMENT_PER_SCROLL,
            max_multiplier: DEFAULT_MAX_MULTIPLIER,
            recovery_per_second: DEFAULT_RECOVERY_PER_SECOND,
            distance_weight: DEFAULT_DISTANCE_WEIGHT,
        }
    }
}

/// Unvalidated resistance fields, as read from storage or user input
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawResistance {
    pub base_multiplier: Option<f64>,
    pub increment_per_scroll: Option<f64>,
    pub max_multiplier: Option<f64>,
    pub recovery_per_second: Option<f64>,
    pub distance_weight: Option<f64>,
}

impl RawResistance {
    /// Read raw fields from a stored JSON value.
    ///
    /// Anything that is not an object yields all-missing fields; fields that
    /// are not JSON numbers count as missing.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let mut raw = Self::default();
        for field in ResistanceField::ALL {
            raw.set(field, obj.get(field.key()).and_then(Value::as_f64));
        }
        raw
    }
}

impl From<ResistanceConfig> for RawResistance {
    fn from(config: ResistanceConfig) -> Self {
        Self {
            base_multiplier: Some(config.base_multiplier),
            increment_per_scroll: Some(config.increment_per_scroll),
            max_multiplier: Some(config.max_multiplier),
            recovery_per_second: Some(config.recovery_per_second),
            distance_weight: Some(config.distance_weight),
        }
    }
}

/// One tunable parameter of the curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResistanceField {
    BaseMultiplier,
    IncrementPerScroll,
    MaxMultiplier,
    RecoveryPerSecond,
    DistanceWeight,
}

impl ResistanceField {
    pub const ALL: [ResistanceField; 5] = [
        ResistanceField::BaseMultiplier,
        ResistanceField::IncrementPerScroll,
        ResistanceField::MaxMultiplier,
        ResistanceField::RecoveryPerSecond,
        ResistanceField::DistanceWeight,
    ];

    /// Stored (camelCase) key
    pub fn key(&self) -> &'static str {
        match self {
            ResistanceField::BaseMultiplier => "baseMultiplier",
            ResistanceField::IncrementPerScroll => "incrementPerScroll",
            ResistanceField::MaxMultiplier => "maxMultiplier",
            ResistanceField::RecoveryPerSecond => "recoveryPerSecond",
            ResistanceField::DistanceWeight => "distanceWeight",
        }
    }

    pub fn default_value(&self) -> f64 {
        match self {
            ResistanceField::BaseMultiplier => DEFAULT_BASE_MULTIPLIER,
            ResistanceField::IncrementPerScroll => DEFAULT_INCREMENT_PER_SCROLL,
            ResistanceField::MaxMultiplier => DEFAULT_MAX_MULTIPLIER,
            ResistanceField::RecoveryPerSecond => DEFAULT_RECOVERY_PER_SECOND,
            ResistanceField::DistanceWeight => DEFAULT_DISTANCE_WEIGHT,
        }
    }

    /// Per-field constraint; non-finite values never pass
    pub fn accepts(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match self {
            ResistanceField::BaseMultiplier | ResistanceField::DistanceWeight => value > 0.0,
            ResistanceField::IncrementPerScroll | ResistanceField::RecoveryPerSecond => value >= 0.0,
            ResistanceField::MaxMultiplier => value >= 1.0,
        }
    }

    fn resolve(&self, raw: Option<f64>) -> f64 {
        raw.filter(|v| self.accepts(*v))
            .unwrap_or_else(|| self.default_value())
    }
}

impl RawResistance {
    pub fn get(&self, field: ResistanceField) -> Option<f64> {
        match field {
            ResistanceField::BaseMultiplier => self.base_multiplier,
            ResistanceField::IncrementPerScroll => self.increment_per_scroll,
            ResistanceField::MaxMultiplier => self.max_multiplier,
            ResistanceField::RecoveryPerSecond => self.recovery_per_second,
            ResistanceField::DistanceWeight => self.distance_weight,
        }
    }

    pub fn set(&mut self, field: ResistanceField, value: Option<f64>) {
        let slot = match field {
            ResistanceField::BaseMultiplier => &mut self.base_multiplier,
            ResistanceField::IncrementPerScroll => &mut self.increment_per_scroll,
            ResistanceField::MaxMultiplier => &mut self.max_multiplier,
            ResistanceField::RecoveryPerSecond => &mut self.recovery_per_second,
            ResistanceField::DistanceWeight => &mut self.distance_weight,
        };
        *slot = value;
    }
}

impl ResistanceConfig {
    /// Validate raw fields. Total and idempotent.
    pub fn sanitize(raw: &RawResistance) -> Self {
        let field = |f: ResistanceField| f.resolve(raw.get(f));
        let base_multiplier = field(ResistanceField::BaseMultiplier);
        let max_multiplier = field(ResistanceField::MaxMultiplier);

        Self {
            base_multiplier,
            increment_per_scroll: field(ResistanceField::IncrementPerScroll),
            max_multiplier: max_multiplier.max(base_multiplier),
            recovery_per_second: field(ResistanceField::RecoveryPerSecond),
            distance_weight: field(ResistanceField::DistanceWeight),
        }
    }

    /// Validate a stored JSON value
    pub fn from_value(value: &Value) -> Self {
        Self::sanitize(&RawResistance::from_value(value))
    }

    /// Canonical stored representation
    pub fn to_value(&self) -> Value {
        let raw = RawResistance::from(*self);
        let obj: Map<String, Value> = ResistanceField::ALL
            .iter()
            .filter_map(|f| raw.get(*f).map(|v| (f.key().to_string(), Value::from(v))))
            .collect();
        Value::Object(obj)
    }

    /// Multiplier for a given amount of accumulated activity
    pub fn multiplier_for(&self, scroll_units: f64) -> f64 {
        let units = scroll_units.max(0.0);
        (self.base_multiplier + units * self.increment_per_scroll).min(self.max_multiplier)
    }

    /// Activity gained from one wheel event travelling `distance` pixels.
    /// Every qualifying event counts for at least one unit.
    pub fn gain_for(&self, distance: f64) -> f64 {
        if distance > 0.0 {
            (distance / self.distance_weight).max(1.0)
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = ResistanceConfig::from_value(&json!({}));
        assert_eq!(config, ResistanceConfig::default());

        let config = ResistanceConfig::from_value(&Value::Null);
        assert_eq!(config, ResistanceConfig::default());
    }

    #[test]
    fn test_invalid_fields_fall_back_independently() {
        let config = ResistanceConfig::from_value(&json!({
            "baseMultiplier": 0,
            "incrementPerScroll": -1,
            "maxMultiplier": 0.5,
            "recoveryPerSecond": "fast",
            "distanceWeight": 60
        }));

        assert_eq!(config.base_multiplier, DEFAULT_BASE_MULTIPLIER);
        assert_eq!(config.increment_per_scroll, DEFAULT_INCREMENT_PER_SCROLL);
        assert_eq!(config.max_multiplier, DEFAULT_MAX_MULTIPLIER);
        assert_eq!(config.recovery_per_second, DEFAULT_RECOVERY_PER_SECOND);
        assert_eq!(config.distance_weight, 60.0);
    }

    #[test]
    fn test_max_clamped_to_base() {
        let config = ResistanceConfig::from_value(&json!({
            "baseMultiplier": 8,
            "maxMultiplier": 3
        }));
        assert_eq!(config.base_multiplier, 8.0);
        assert_eq!(config.max_multiplier, 8.0);
    }

    #[test]
    fn test_non_finite_rejected() {
        let raw = RawResistance {
            base_multiplier: Some(f64::NAN),
            max_multiplier: Some(f64::INFINITY),
            ..Default::default()
        };
        let config = ResistanceConfig::sanitize(&raw);
        assert_eq!(config.base_multiplier, DEFAULT_BASE_MULTIPLIER);
        assert_eq!(config.max_multiplier, DEFAULT_MAX_MULTIPLIER);
    }

    #[test]
    fn test_legacy_object_keeps_shared_fields() {
        let config = ResistanceConfig::from_value(&json!({
            "baseMultiplier": 1,
            "maxMultiplier": 12,
            "metersToMax": 8
        }));
        assert_eq!(config.base_multiplier, 1.0);
        assert_eq!(config.max_multiplier, 12.0);
        assert_eq!(config.distance_weight, DEFAULT_DISTANCE_WEIGHT);
    }

    #[test]
    fn test_value_roundtrip_is_canonical() {
        let config = ResistanceConfig::default();
        assert_eq!(ResistanceConfig::from_value(&config.to_value()), config);
        let serde_value = serde_json::to_value(config).unwrap();
        assert_eq!(serde_value, config.to_value());
    }

    #[test]
    fn test_gain_floor() {
        let config = ResistanceConfig::default();
        assert_eq!(config.gain_for(0.0), 1.0);
        assert_eq!(config.gain_for(3.0), 1.0);
        assert_eq!(config.gain_for(240.0), 2.0);
    }

    fn raw_field() -> impl Strategy<Value = Option<f64>> {
        prop_oneof![
            Just(None),
            Just(Some(f64::NAN)),
            Just(Some(f64::INFINITY)),
            (-50.0f64..50.0).prop_map(Some),
        ]
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_idempotent_and_finite(
            base in raw_field(),
            increment in raw_field(),
            max in raw_field(),
            recovery in raw_field(),
            weight in raw_field(),
        ) {
            let raw = RawResistance {
                base_multiplier: base,
                increment_per_scroll: increment,
                max_multiplier: max,
                recovery_per_second: recovery,
                distance_weight: weight,
            };
            let once = ResistanceConfig::sanitize(&raw);
            let twice = ResistanceConfig::sanitize(&RawResistance::from(once));

            prop_assert_eq!(once, twice);
            prop_assert!(once.max_multiplier >= once.base_multiplier);
            prop_assert!(once.base_multiplier.is_finite() && once.base_multiplier > 0.0);
            prop_assert!(once.increment_per_scroll.is_finite() && once.increment_per_scroll >= 0.0);
            prop_assert!(once.max_multiplier.is_finite() && once.max_multiplier >= 1.0);
            prop_assert!(once.recovery_per_second.is_finite() && once.recovery_per_second >= 0.0);
            prop_assert!(once.distance_weight.is_finite() && once.distance_weight > 0.0);
        }

        #[test]
        fn prop_multiplier_is_clamped_linear(units in 0.0f64..10_000.0) {
            let config = ResistanceConfig::default();
            let expected = (config.base_multiplier + units * config.increment_per_scroll)
                .clamp(config.base_multiplier, config.max_multiplier);
            prop_assert_eq!(config.multiplier_for(units), expected);
        }
    }
}
