use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{EngineError, EngineResult};
use crate::models::FeatureKind;

/// Tunables for the full pipeline. Passed explicitly into every stage; there
/// is no process-wide configuration state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Trailing window of calendar days considered when scoring.
    pub lookback_days: i64,
    /// Days after which an event's contribution is halved.
    pub half_life_days: f64,
    /// Per-event weight for each scoring dimension. A dimension observed in
    /// the data but missing here is a configuration error.
    pub feature_weights: HashMap<FeatureKind, f64>,
    /// Normalization constant feeding the sigmoid; see `scorer`.
    pub score_scale: f64,
    /// Consecutive days a new zone must hold before the state change is
    /// confirmed.
    pub hysteresis_days: usize,
    /// Trailing window for the decline fast path.
    pub decline_window_days: i64,
    /// Minimum point drop inside that window to raise a decline alert.
    pub decline_threshold: f64,
    /// Confirmed NeedsCare days before escalating to a coach.
    pub escalation_days: usize,
    /// Confirmed Rising/Steady days before celebrating.
    pub celebration_days: usize,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            lookback_days: 30,
            half_life_days: 10.0,
            feature_weights: default_weights(),
            score_scale: 15.0,
            hysteresis_days: 2,
            decline_window_days: 5,
            decline_threshold: 15.0,
            escalation_days: 2,
            celebration_days: 5,
        }
    }
}

fn default_weights() -> HashMap<FeatureKind, f64> {
    HashMap::from([
        (FeatureKind::Session, 2.0),
        (FeatureKind::LessonCompletion, 8.0),
        (FeatureKind::ActionStepSuccess, 10.0),
        (FeatureKind::ActionStepSkip, -4.0),
        (FeatureKind::BiometricEntry, 3.0),
        (FeatureKind::CoachInteraction, 5.0),
    ])
}

impl EngineConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.lookback_days < 1 {
            return Err(EngineError::InvalidConfiguration(format!(
                "lookback_days must be at least 1, got {}",
                self.lookback_days
            )));
        }
        if self.lookback_days > 365 {
            return Err(EngineError::InvalidConfiguration(format!(
                "lookback_days must be at most 365, got {}",
                self.lookback_days
            )));
        }
        if !(self.half_life_days > 0.0) {
            return Err(EngineError::InvalidConfiguration(format!(
                "half_life_days must be positive, got {}",
                self.half_life_days
            )));
        }
        if !(self.score_scale > 0.0) {
            return Err(EngineError::InvalidConfiguration(format!(
                "score_scale must be positive, got {}",
                self.score_scale
            )));
        }
        if self.hysteresis_days < 1 {
            return Err(EngineError::InvalidConfiguration(
                "hysteresis_days must be at least 1".to_string(),
            ));
        }
        if self.decline_window_days < 1 {
            return Err(EngineError::InvalidConfiguration(format!(
                "decline_window_days must be at least 1, got {}",
                self.decline_window_days
            )));
        }
        if !(self.decline_threshold > 0.0) {
            return Err(EngineError::InvalidConfiguration(format!(
                "decline_threshold must be positive, got {}",
                self.decline_threshold
            )));
        }
        if self.escalation_days < 1 || self.celebration_days < 1 {
            return Err(EngineError::InvalidConfiguration(
                "escalation_days and celebration_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Fail fast if any dimension observed in the data lacks a weight.
    pub fn require_weights<'a, I>(&self, observed: I) -> EngineResult<()>
    where
        I: IntoIterator<Item = &'a FeatureKind>,
    {
        for feature in observed {
            if !self.feature_weights.contains_key(feature) {
                return Err(EngineError::InvalidConfiguration(format!(
                    "no feature weight configured for {}",
                    feature.label()
                )));
            }
        }
        Ok(())
    }

    pub fn weight(&self, feature: FeatureKind) -> f64 {
        self.feature_weights.get(&feature).copied().unwrap_or(0.0)
    }

    /// Load overrides from a JSON file; omitted fields keep defaults.
    pub fn from_json(text: &str) -> anyhow::Result<EngineConfig> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
        for feature in FeatureKind::ALL {
            assert!(EngineConfig::default().feature_weights.contains_key(&feature));
        }
    }

    #[test]
    fn rejects_out_of_range_lookback() {
        let mut config = EngineConfig::default();
        config.lookback_days = 0;
        assert!(config.validate().is_err());
        config.lookback_days = 366;
        assert!(config.validate().is_err());
        config.lookback_days = 365;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_half_life_and_scale() {
        let mut config = EngineConfig::default();
        config.half_life_days = 0.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.score_scale = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_weight_for_observed_feature_fails() {
        let mut config = EngineConfig::default();
        config.feature_weights.remove(&FeatureKind::BiometricEntry);
        assert!(config.validate().is_ok());
        let observed = [FeatureKind::BiometricEntry];
        assert!(config.require_weights(observed.iter()).is_err());
        let observed = [FeatureKind::Session];
        assert!(config.require_weights(observed.iter()).is_ok());
    }

    #[test]
    fn json_overrides_merge_with_defaults() {
        let config = EngineConfig::from_json(r#"{"half_life_days": 7.0}"#).unwrap();
        assert_eq!(config.half_life_days, 7.0);
        assert_eq!(config.lookback_days, 30);
    }

    #[test]
    fn json_with_invalid_values_fails() {
        assert!(EngineConfig::from_json(r#"{"lookback_days": 0}"#).is_err());
        assert!(EngineConfig::from_json(r#"{"unknown_knob": 1}"#).is_err());
    }
}
