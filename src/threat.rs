//! Threat classification.
//!
//! A deterministic, ordered rule table maps (object class, identity
//! match) to a threat level. The level is a total function of those two
//! inputs and the configured policy; confidence, history, and the other
//! boxes in the frame play no part.

use serde::{Deserialize, Serialize};

use crate::correlate::CorrelatedBox;
use crate::detect::PERSON_LABEL;

/// Classes treated as weapons or contraband by default. "cell phone" is
/// part of the demonstration configuration.
pub const DEFAULT_WEAPON_CLASSES: &[&str] = &["knife", "gun", "weapon", "scissors", "cell phone"];

/// Threat level assigned to every detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Normal,
    Suspicious,
    Critical,
}

/// Final classification for one box.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub level: ThreatLevel,
    /// Output label; identity rules rewrite it.
    pub label: String,
}

/// Classification policy.
#[derive(Clone, Debug)]
pub struct ThreatPolicy {
    /// Labels classified as weapons/contraband.
    pub weapon_classes: Vec<String>,
    /// Treat every unidentified person as suspicious. This mirrors the
    /// deployed demonstration configuration; it is a policy choice, not
    /// a fixed rule, so operators can turn it off.
    pub flag_unidentified_persons: bool,
}

impl Default for ThreatPolicy {
    fn default() -> Self {
        Self {
            weapon_classes: DEFAULT_WEAPON_CLASSES
                .iter()
                .map(|class| class.to_string())
                .collect(),
            flag_unidentified_persons: true,
        }
    }
}

/// Ordered rules; the first whose predicate matches decides the
/// classification. Anything unmatched is `Normal`.
#[derive(Clone, Copy, Debug)]
enum Rule {
    IdentifiedPerson,
    WeaponClass,
    UnidentifiedPerson,
}

const RULES: &[Rule] = &[
    Rule::IdentifiedPerson,
    Rule::WeaponClass,
    Rule::UnidentifiedPerson,
];

impl Rule {
    fn matches(self, policy: &ThreatPolicy, candidate: &CorrelatedBox) -> bool {
        match self {
            Rule::IdentifiedPerson => {
                candidate.object.label == PERSON_LABEL && candidate.identity.is_some()
            }
            Rule::WeaponClass => policy
                .weapon_classes
                .iter()
                .any(|class| class == &candidate.object.label),
            Rule::UnidentifiedPerson => {
                policy.flag_unidentified_persons && candidate.object.label == PERSON_LABEL
            }
        }
    }

    fn apply(self, candidate: &CorrelatedBox) -> Classification {
        let level = match self {
            Rule::IdentifiedPerson | Rule::WeaponClass => ThreatLevel::Critical,
            Rule::UnidentifiedPerson => ThreatLevel::Suspicious,
        };
        let label = match (self, &candidate.identity) {
            (Rule::IdentifiedPerson, Some(matched)) => format!("SUSPECT: {}", matched.label),
            _ => candidate.object.label.clone(),
        };
        Classification { level, label }
    }
}

impl ThreatPolicy {
    /// Classify one correlated box. First matching rule wins.
    pub fn classify(&self, candidate: &CorrelatedBox) -> Classification {
        for rule in RULES {
            if rule.matches(self, candidate) {
                return rule.apply(candidate);
            }
        }
        Classification {
            level: ThreatLevel::Normal,
            label: candidate.object.label.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
