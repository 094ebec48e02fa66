//! Clinical thresholds and scoring weights.
//!
//! Every cut-off the evaluators apply lives here rather than in the rule
//! code. The defaults mirror common stewardship practice but carry no
//! clinical citation; sites are expected to review them and ship their own
//! `policy.json`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::AlertSeverity;

pub const POLICY_FILE: &str = "policy.json";

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Policy load failed ({0}): {1}")]
    Load(String, String),

    #[error("Policy parse failed: {0}")]
    Parse(String),

    #[error("Invalid policy: {0}")]
    Invalid(String),
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// How the rule evaluators are scheduled. Both modes produce identical reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    #[default]
    Parallel,
}

/// eGFR cut-offs in mL/min/1.73m².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenalThresholds {
    /// Below this, nephrotoxic drugs raise a high alert.
    pub impairment_egfr: f64,
    /// Below this, the alert escalates to critical.
    pub severe_impairment_egfr: f64,
}

/// Standard adult weight band. Outside it, weight-based dosing applies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightBand {
    pub min: f64,
    pub max: f64,
}

impl Default for RenalThresholds {
    fn default() -> Self {
        Self {
            impairment_egfr: 60.0,
            severe_impairment_egfr: 30.0,
        }
    }
}

impl Default for WeightBand {
    fn default() -> Self {
        Self {
            min: 50.0,
            max: 120.0,
        }
    }
}

impl WeightBand {
    pub fn contains(&self, weight_kg: f64) -> bool {
        weight_kg >= self.min && weight_kg <= self.max
    }
}

/// Confidence-score penalty per active failing alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub critical: u32,
    pub high: u32,
    pub moderate: u32,
    pub low: u32,
}

impl ScoreWeights {
    pub fn weight(&self, severity: AlertSeverity) -> u32 {
        match severity {
            AlertSeverity::Critical => self.critical,
            AlertSeverity::High => self.high,
            AlertSeverity::Moderate => self.moderate,
            AlertSeverity::Low => self.low,
        }
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            critical: 30,
            high: 15,
            moderate: 5,
            low: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    pub renal: RenalThresholds,
    /// Patients strictly older than this are elderly.
    pub elderly_age: u32,
    /// Patients strictly younger than this get paediatric dosing reminders.
    pub pediatric_age: u32,
    pub weight_band_kg: WeightBand,
    pub score_weights: ScoreWeights,
    pub execution_mode: ExecutionMode,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            renal: RenalThresholds::default(),
            elderly_age: 65,
            pediatric_age: 18,
            weight_band_kg: WeightBand::default(),
            score_weights: ScoreWeights::default(),
            execution_mode: ExecutionMode::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════

impl ValidationPolicy {
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let policy: Self =
            serde_json::from_str(json).map_err(|e| PolicyError::Parse(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Load `policy.json` from a directory. A missing file yields the defaults.
    pub fn load(dir: &Path) -> Result<Self, PolicyError> {
        let path = dir.join(POLICY_FILE);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No policy file, using defaults");
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(&path)
            .map_err(|e| PolicyError::Load(path.display().to_string(), e.to_string()))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        let renal = &self.renal;
        if !(renal.severe_impairment_egfr > 0.0
            && renal.severe_impairment_egfr < renal.impairment_egfr)
        {
            return Err(PolicyError::Invalid(format!(
                "renal thresholds must satisfy 0 < severe ({}) < impairment ({})",
                renal.severe_impairment_egfr, renal.impairment_egfr
            )));
        }
        if self.pediatric_age > self.elderly_age {
            return Err(PolicyError::Invalid(format!(
                "pediatric_age ({}) exceeds elderly_age ({})",
                self.pediatric_age, self.elderly_age
            )));
        }
        let band = &self.weight_band_kg;
        if !(band.min > 0.0 && band.min < band.max) {
            return Err(PolicyError::Invalid(format!(
                "weight band must satisfy 0 < min ({}) < max ({})",
                band.min, band.max
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let policy = ValidationPolicy::default();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.renal.impairment_egfr, 60.0);
        assert_eq!(policy.renal.severe_impairment_egfr, 30.0);
        assert_eq!(policy.elderly_age, 65);
        assert_eq!(policy.execution_mode, ExecutionMode::Parallel);
    }

    #[test]
    fn default_weights() {
        let w = ScoreWeights::default();
        assert_eq!(w.weight(AlertSeverity::Critical), 30);
        assert_eq!(w.weight(AlertSeverity::High), 15);
        assert_eq!(w.weight(AlertSeverity::Moderate), 5);
        assert_eq!(w.weight(AlertSeverity::Low), 2);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let policy = ValidationPolicy::from_json(r#"{"elderly_age": 70}"#).unwrap();
        assert_eq!(policy.elderly_age, 70);
        assert_eq!(policy.pediatric_age, 18);
        assert_eq!(policy.score_weights, ScoreWeights::default());
    }

    #[test]
    fn partial_nested_overrides_keep_sibling_defaults() {
        let policy = ValidationPolicy::from_json(r#"{"renal":{"impairment_egfr":50}}"#).unwrap();
        assert_eq!(policy.renal.impairment_egfr, 50.0);
        assert_eq!(policy.renal.severe_impairment_egfr, 30.0);

        let policy = ValidationPolicy::from_json(r#"{"weight_band_kg": {"max": 140.0}}"#).unwrap();
        assert_eq!(policy.weight_band_kg.min, 50.0);
        assert_eq!(policy.weight_band_kg.max, 140.0);

        let policy = ValidationPolicy::from_json(r#"{"score_weights": {"critical": 40}}"#).unwrap();
        assert_eq!(policy.score_weights.critical, 40);
        assert_eq!(policy.score_weights.low, 2);
    }

    #[test]
    fn partial_override_still_validated() {
        let json = r#"{"renal": {"impairment_egfr": 20}}"#;
        assert!(matches!(
            ValidationPolicy::from_json(json),
            Err(PolicyError::Invalid(_))
        ));
    }

    #[test]
    fn inverted_renal_thresholds_rejected() {
        let json = r#"{"renal": {"impairment_egfr": 30.0, "severe_impairment_egfr": 60.0}}"#;
        assert!(matches!(
            ValidationPolicy::from_json(json),
            Err(PolicyError::Invalid(_))
        ));
    }

    #[test]
    fn empty_weight_band_rejected() {
        let json = r#"{"weight_band_kg": {"min": 120.0, "max": 50.0}}"#;
        assert!(matches!(
            ValidationPolicy::from_json(json),
            Err(PolicyError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(matches!(
            ValidationPolicy::from_json("{"),
            Err(PolicyError::Parse(_))
        ));
    }

    #[test]
    fn weight_band_is_inclusive() {
        let band = ValidationPolicy::default().weight_band_kg;
        assert!(band.contains(50.0));
        assert!(band.contains(120.0));
        assert!(!band.contains(49.9));
        assert!(!band.contains(120.5));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let policy = ValidationPolicy::load(dir.path()).unwrap();
        assert_eq!(policy, ValidationPolicy::default());
    }

    #[test]
    fn bundled_policy_matches_defaults() {
        let json = include_str!("../../resources/policy.json");
        let policy = ValidationPolicy::from_json(json).unwrap();
        assert_eq!(policy, ValidationPolicy::default());
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(POLICY_FILE),
            r#"{"execution_mode": "sequential"}"#,
        )
        .unwrap();
        let policy = ValidationPolicy::load(dir.path()).unwrap();
        assert_eq!(policy.execution_mode, ExecutionMode::Sequential);
    }
}
