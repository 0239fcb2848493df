//! Triage policy: the weighting constants behind scoring and SLA buckets.
//!
//! These are product choices, not derived requirements, so they load from
//! an optional TOML file. Every field may be omitted; omitted fields take
//! the built-in defaults.
//!
//! ```toml
//! [urgency]
//! stat = 100.0
//!
//! [weights]
//! sla = 0.35
//! age = 0.05
//!
//! [sla]
//! red = 0.2
//! ```

use crate::error::{Error, Result};
use crate::model::UrgencyClass;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TriagePolicy {
    pub urgency: UrgencyWeights,
    pub weights: ComponentWeights,
    pub sla: SlaThresholds,
    pub age: AgePolicy,
    pub cadence: Cadence,
}

/// Points awarded per urgency class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UrgencyWeights {
    pub stat: f64,
    pub urgent: f64,
    pub routine: f64,
}

impl Default for UrgencyWeights {
    fn default() -> Self {
        Self {
            stat: 100.0,
            urgent: 60.0,
            routine: 20.0,
        }
    }
}

impl UrgencyWeights {
    pub fn for_class(&self, class: UrgencyClass) -> f64 {
        match class {
            UrgencyClass::Stat => self.stat,
            UrgencyClass::Urgent => self.urgent,
            UrgencyClass::Routine => self.routine,
        }
    }
}

/// Multipliers applied to each score component before summing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComponentWeights {
    pub urgency: f64,
    pub sla: f64,
    pub document: f64,
    pub age: f64,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            urgency: 0.4,
            sla: 0.3,
            document: 0.2,
            age: 0.1,
        }
    }
}

/// Fraction-of-window-remaining cutoffs for the Red and Yellow buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlaThresholds {
    pub red: f64,
    pub yellow: f64,
}

impl Default for SlaThresholds {
    fn default() -> Self {
        Self {
            red: 0.25,
            yellow: 0.5,
        }
    }
}

/// Age component: one point per `minutes_per_point`, capped at `cap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgePolicy {
    pub minutes_per_point: f64,
    pub cap: f64,
}

impl Default for AgePolicy {
    fn default() -> Self {
        Self {
            minutes_per_point: 10.0,
            cap: 100.0,
        }
    }
}

/// Slowest allowed refresh while Red or Breached.
const MAX_LIVE_SECS: u64 = 1;
/// Slowest allowed refresh while Green or Yellow.
const MAX_IDLE_SECS: u64 = 60;

/// Countdown refresh cadence, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Cadence {
    /// Used while the bucket is Red or Breached.
    pub live_secs: u64,
    /// Used for Green and Yellow.
    pub idle_secs: u64,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            live_secs: 1,
            idle_secs: 60,
        }
    }
}

impl Cadence {
    pub fn live(&self) -> Duration {
        Duration::from_secs(self.live_secs)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

impl TriagePolicy {
    /// Load and validate a policy file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let policy: TriagePolicy = toml::from_str(&content).map_err(|e| {
            Error::InvalidPolicy(format!("bad policy file {}: {e}", path.display()))
        })?;
        policy.validate()?;
        Ok(policy)
    }

    /// Reject values that would break ordering or bucket math.
    pub fn validate(&self) -> Result<()> {
        let sla = &self.sla;
        if !(sla.red > 0.0 && sla.red <= 1.0 && sla.yellow > 0.0 && sla.yellow <= 1.0) {
            return Err(Error::InvalidPolicy(format!(
                "sla thresholds must be in (0, 1], got red={} yellow={}",
                sla.red, sla.yellow
            )));
        }
        if sla.red > sla.yellow {
            return Err(Error::InvalidPolicy(format!(
                "red threshold {} exceeds yellow threshold {}",
                sla.red, sla.yellow
            )));
        }

        let w = &self.weights;
        let u = &self.urgency;
        let all = [
            ("weights.urgency", w.urgency),
            ("weights.sla", w.sla),
            ("weights.document", w.document),
            ("weights.age", w.age),
            ("urgency.stat", u.stat),
            ("urgency.urgent", u.urgent),
            ("urgency.routine", u.routine),
            ("age.cap", self.age.cap),
        ];
        if let Some((name, value)) = all.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(Error::InvalidPolicy(format!(
                "{name} must be a non-negative number, got {value}"
            )));
        }
        if !(self.age.minutes_per_point.is_finite() && self.age.minutes_per_point > 0.0) {
            return Err(Error::InvalidPolicy(format!(
                "age.minutes_per_point must be positive, got {}",
                self.age.minutes_per_point
            )));
        }

        let cadence = &self.cadence;
        if cadence.live_secs == 0 || cadence.idle_secs == 0 {
            return Err(Error::InvalidPolicy(
                "cadence intervals must be at least one second".to_string(),
            ));
        }
        if cadence.live_secs > MAX_LIVE_SECS {
            return Err(Error::InvalidPolicy(format!(
                "cadence.live_secs must be at most {MAX_LIVE_SECS}, got {}",
                cadence.live_secs
            )));
        }
        if cadence.idle_secs > MAX_IDLE_SECS {
            return Err(Error::InvalidPolicy(format!(
                "cadence.idle_secs must be at most {MAX_IDLE_SECS}, got {}",
                cadence.idle_secs
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let policy = TriagePolicy::default();
        assert_eq!(policy.urgency.for_class(UrgencyClass::Stat), 100.0);
        assert_eq!(policy.urgency.for_class(UrgencyClass::Urgent), 60.0);
        assert_eq!(policy.urgency.for_class(UrgencyClass::Routine), 20.0);
        assert_eq!(policy.weights.urgency, 0.4);
        assert_eq!(policy.sla.red, 0.25);
        assert_eq!(policy.sla.yellow, 0.5);
        assert_eq!(policy.cadence.live(), Duration::from_secs(1));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let policy: TriagePolicy = toml::from_str("[weights]\nsla = 0.5\n").unwrap();
        assert_eq!(policy.weights.sla, 0.5);
        assert_eq!(policy.weights.urgency, 0.4);
        assert_eq!(policy.urgency, UrgencyWeights::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<TriagePolicy>("[weights]\nspeed = 1.0\n").is_err());
    }

    #[test]
    fn inverted_thresholds_are_invalid() {
        let mut policy = TriagePolicy::default();
        policy.sla.red = 0.6;
        assert!(matches!(policy.validate(), Err(Error::InvalidPolicy(_))));
    }

    #[test]
    fn zero_cadence_is_invalid() {
        let mut policy = TriagePolicy::default();
        policy.cadence.live_secs = 0;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn slow_cadence_is_invalid() {
        let mut policy = TriagePolicy::default();
        policy.cadence.live_secs = 30;
        assert!(matches!(policy.validate(), Err(Error::InvalidPolicy(_))));

        let mut policy = TriagePolicy::default();
        policy.cadence.idle_secs = 3600;
        assert!(matches!(policy.validate(), Err(Error::InvalidPolicy(_))));

        let mut policy = TriagePolicy::default();
        policy.cadence.idle_secs = 60;
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn negative_weight_is_invalid() {
        let mut policy = TriagePolicy::default();
        policy.weights.age = -0.1;
        assert!(policy.validate().is_err());
    }
}
