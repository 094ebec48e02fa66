use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a string does not name a known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field} value: {value}")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(AlertCategory {
    Safety => "safety",
    Efficacy => "efficacy",
    Dosing => "dosing",
    Monitoring => "monitoring",
});

str_enum!(InteractionSeverity {
    Mild => "mild",
    Moderate => "moderate",
    Severe => "severe",
});

str_enum!(HepaticStatus {
    Normal => "normal",
    Mild => "mild",
    Moderate => "moderate",
    Severe => "severe",
});

str_enum!(InfectionSeverity {
    Mild => "mild",
    Moderate => "moderate",
    Severe => "severe",
});

str_enum!(FindingKind {
    Rule => "rule",
    Interaction => "interaction",
    InsufficientData => "insufficient_data",
    EvaluatorFailure => "evaluator_failure",
});

// ---------------------------------------------------------------------------
// AlertSeverity
// ---------------------------------------------------------------------------

/// Severity ordering drives report sorting and the confidence penalty.
/// `major` is accepted as a synonym of `high` on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Moderate,
    #[serde(alias = "major")]
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// High and critical findings always need a clinician to look at them.
    pub fn needs_review(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl std::str::FromStr for AlertSeverity {
    type Err = InvalidEnum;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "moderate" => Ok(Self::Moderate),
            "high" | "major" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(InvalidEnum {
                field: "AlertSeverity".into(),
                value: s.into(),
            }),
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<InteractionSeverity> for AlertSeverity {
    fn from(severity: InteractionSeverity) -> Self {
        match severity {
            InteractionSeverity::Mild => Self::Low,
            InteractionSeverity::Moderate => Self::Moderate,
            InteractionSeverity::Severe => Self::Critical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn alert_category_round_trip() {
        for (variant, s) in [
            (AlertCategory::Safety, "safety"),
            (AlertCategory::Efficacy, "efficacy"),
            (AlertCategory::Dosing, "dosing"),
            (AlertCategory::Monitoring, "monitoring"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(AlertCategory::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn from_str_is_case_insensitive() {
        assert_eq!(
            InfectionSeverity::from_str(" Severe ").unwrap(),
            InfectionSeverity::Severe
        );
        assert_eq!(HepaticStatus::from_str("MILD").unwrap(), HepaticStatus::Mild);
    }

    #[test]
    fn invalid_value_rejected() {
        let err = InteractionSeverity::from_str("catastrophic").unwrap_err();
        assert_eq!(err.field, "InteractionSeverity");
        assert_eq!(err.value, "catastrophic");
    }

    #[test]
    fn severity_ordering() {
        assert!(AlertSeverity::Low < AlertSeverity::Moderate);
        assert!(AlertSeverity::Moderate < AlertSeverity::High);
        assert!(AlertSeverity::High < AlertSeverity::Critical);
    }

    #[test]
    fn major_is_high() {
        assert_eq!(AlertSeverity::from_str("major").unwrap(), AlertSeverity::High);
        let parsed: AlertSeverity = serde_json::from_str("\"major\"").unwrap();
        assert_eq!(parsed, AlertSeverity::High);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"high\"");
    }

    #[test]
    fn interaction_severity_maps_to_alert_severity() {
        assert_eq!(AlertSeverity::from(InteractionSeverity::Mild), AlertSeverity::Low);
        assert_eq!(
            AlertSeverity::from(InteractionSeverity::Moderate),
            AlertSeverity::Moderate
        );
        assert_eq!(
            AlertSeverity::from(InteractionSeverity::Severe),
            AlertSeverity::Critical
        );
    }

    #[test]
    fn finding_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FindingKind::InsufficientData).unwrap();
        assert_eq!(json, "\"insufficient_data\"");
    }
}
