//! CFM 2.156/2016 ICU admission priority classification.
//!
//! The standard rule set is evaluated in a fixed order, first match wins:
//! - palliative / terminal phase gives priority 5
//! - life support, high recovery, no limitation gives priority 1
//! - life support otherwise gives priority 3
//! - no life support, high recovery, no limitation gives priority 2
//! - anything else gives priority 4

use crate::errors::{RegulationError, RegulationResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority levels defined by the CFM resolution.
///
/// Lower numeric values indicate higher priority for an ICU bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CfmPriority {
    P1 = 1,
    P2 = 2,
    P3 = 3,
    P4 = 4,
    P5 = 5,
}

/// Descriptive information attached to each priority level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub recommendation: &'static str,
}

impl CfmPriority {
    pub const ALL: [CfmPriority; 5] = [
        CfmPriority::P1,
        CfmPriority::P2,
        CfmPriority::P3,
        CfmPriority::P4,
        CfmPriority::P5,
    ];

    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn from_level(level: u8) -> RegulationResult<Self> {
        match level {
            1 => Ok(CfmPriority::P1),
            2 => Ok(CfmPriority::P2),
            3 => Ok(CfmPriority::P3),
            4 => Ok(CfmPriority::P4),
            5 => Ok(CfmPriority::P5),
            _ => Err(RegulationError::validation(
                "priority",
                format!("'{}' is not a CFM priority, must be 1 to 5", level),
            )),
        }
    }

    pub fn info(self) -> PriorityInfo {
        match self {
            CfmPriority::P1 => PriorityInfo {
                name: "Priority 1",
                description: "Needs immediate life support, with high probability of recovery and no therapeutic limitation.",
                recommendation: "Absolute indication for ICU",
            },
            CfmPriority::P2 => PriorityInfo {
                name: "Priority 2",
                description: "Needs intensive monitoring due to high risk of immediate intervention, no therapeutic limitation.",
                recommendation: "ICU or semi-intensive unit",
            },
            CfmPriority::P3 => PriorityInfo {
                name: "Priority 3",
                description: "Needs life support, but with low probability of recovery or therapeutic limitation.",
                recommendation: "Assess ICU benefit",
            },
            CfmPriority::P4 => PriorityInfo {
                name: "Priority 4",
                description: "Needs intensive monitoring with limitation of therapeutic intervention.",
                recommendation: "Semi-intensive unit preferred",
            },
            CfmPriority::P5 => PriorityInfo {
                name: "Priority 5",
                description: "Terminal phase, no possibility of recovery. Not eligible for ICU except for organ donation.",
                recommendation: "Palliative care",
            },
        }
    }

    /// Priorities 1 and 2 are flagged as urgent in the queue.
    pub fn is_urgent(self) -> bool {
        self <= CfmPriority::P2
    }
}

impl TryFrom<u8> for CfmPriority {
    type Error = RegulationError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        CfmPriority::from_level(level)
    }
}

impl From<CfmPriority> for u8 {
    fn from(priority: CfmPriority) -> u8 {
        priority.level()
    }
}

impl fmt::Display for CfmPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.level())
    }
}

/// Which rule table drives the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSet {
    /// Palliative override followed by the four-branch table.
    #[default]
    Standard,
    /// Also treats low recovery with an irreversible condition as terminal,
    /// unless the patient is an organ donor.
    TerminalByCriteria,
}

/// Complete answers to the evaluation checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfmAnswers {
    pub needs_life_support: bool,
    pub high_recovery_probability: bool,
    pub has_therapeutic_limitation: bool,
    pub is_palliative: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_potentially_reversible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_organ_donor: Option<bool>,
}

/// Checklist answers as they are being collected; any question may still be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnswerSheet {
    pub needs_life_support: Option<bool>,
    pub high_recovery_probability: Option<bool>,
    pub has_therapeutic_limitation: Option<bool>,
    pub is_palliative: bool,
    pub is_potentially_reversible: Option<bool>,
    pub is_organ_donor: Option<bool>,
}

impl AnswerSheet {
    /// Reject the sheet unless every required question is answered.
    ///
    /// A palliative sheet needs no further answers; the open ones are taken as `false`.
    pub fn complete(&self) -> RegulationResult<CfmAnswers> {
        if self.is_palliative {
            return Ok(CfmAnswers {
                needs_life_support: self.needs_life_support.unwrap_or(false),
                high_recovery_probability: self.high_recovery_probability.unwrap_or(false),
                has_therapeutic_limitation: self.has_therapeutic_limitation.unwrap_or(false),
                is_palliative: true,
                is_potentially_reversible: self.is_potentially_reversible,
                is_organ_donor: self.is_organ_donor,
            });
        }

        Ok(CfmAnswers {
            needs_life_support: self
                .needs_life_support
                .ok_or(RegulationError::MissingAnswer("needs life support"))?,
            high_recovery_probability: self
                .high_recovery_probability
                .ok_or(RegulationError::MissingAnswer("high recovery probability"))?,
            has_therapeutic_limitation: self
                .has_therapeutic_limitation
                .ok_or(RegulationError::MissingAnswer("therapeutic limitation"))?,
            is_palliative: false,
            is_potentially_reversible: self.is_potentially_reversible,
            is_organ_donor: self.is_organ_donor,
        })
    }
}

impl From<CfmAnswers> for AnswerSheet {
    fn from(answers: CfmAnswers) -> Self {
        AnswerSheet {
            needs_life_support: Some(answers.needs_life_support),
            high_recovery_probability: Some(answers.high_recovery_probability),
            has_therapeutic_limitation: Some(answers.has_therapeutic_limitation),
            is_palliative: answers.is_palliative,
            is_potentially_reversible: answers.is_potentially_reversible,
            is_organ_donor: answers.is_organ_donor,
        }
    }
}

/// Outcome of a classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub priority: CfmPriority,
    pub justification: &'static str,
}

const TERMINAL: &str = "Terminal phase / exclusive palliative care.";
const SUPPORT_RECOVERABLE: &str =
    "Requires life support + high probability of recovery + no therapeutic limitation.";
const SUPPORT_LIMITED: &str =
    "Requires life support, but with low recovery or therapeutic limitation.";
const MONITORING_RECOVERABLE: &str =
    "Intensive monitoring + high probability of recovery + no therapeutic limitation.";
const MONITORING_LIMITED: &str = "Stable, but with low recovery or therapeutic limitation.";
const IRREVERSIBLE: &str =
    "Low recovery probability, irreversible condition and not an organ donor.";
const UNCLEAR: &str = "Criteria inconclusive; defaulting to priority 3.";

/// Classify a patient from complete checklist answers.
pub fn classify(answers: &CfmAnswers, rules: RuleSet) -> Classification {
    let support = answers.needs_life_support;
    let recovery = answers.high_recovery_probability;
    let limitation = answers.has_therapeutic_limitation;

    if answers.is_palliative {
        return outcome(CfmPriority::P5, TERMINAL);
    }

    match rules {
        RuleSet::Standard => match (support, recovery && !limitation) {
            (true, true) => outcome(CfmPriority::P1, SUPPORT_RECOVERABLE),
            (true, false) => outcome(CfmPriority::P3, SUPPORT_LIMITED),
            (false, true) => outcome(CfmPriority::P2, MONITORING_RECOVERABLE),
            (false, false) => outcome(CfmPriority::P4, MONITORING_LIMITED),
        },
        RuleSet::TerminalByCriteria => {
            let reversible = answers.is_potentially_reversible.unwrap_or(true);
            let donor = answers.is_organ_donor.unwrap_or(false);

            if !reversible && !recovery && !donor {
                outcome(CfmPriority::P5, IRREVERSIBLE)
            } else if support && recovery && !limitation {
                outcome(CfmPriority::P1, SUPPORT_RECOVERABLE)
            } else if !support && recovery && !limitation {
                outcome(CfmPriority::P2, MONITORING_RECOVERABLE)
            } else if support {
                outcome(CfmPriority::P3, SUPPORT_LIMITED)
            } else if limitation {
                outcome(CfmPriority::P4, MONITORING_LIMITED)
            } else {
                outcome(CfmPriority::P3, UNCLEAR)
            }
        }
    }
}

fn outcome(priority: CfmPriority, justification: &'static str) -> Classification {
    Classification {
        priority,
        justification,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(support: bool, recovery: bool, limitation: bool, palliative: bool) -> CfmAnswers {
        CfmAnswers {
            needs_life_support: support,
            high_recovery_probability: recovery,
            has_therapeutic_limitation: limitation,
            is_palliative: palliative,
            ..CfmAnswers::default()
        }
    }

    fn every_combination() -> Vec<CfmAnswers> {
        let options = [None, Some(false), Some(true)];
        let mut all = Vec::new();
        for bits in 0..16u8 {
            for reversible in options {
                for donor in options {
                    let mut a = answers(bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0);
                    a.is_potentially_reversible = reversible;
                    a.is_organ_donor = donor;
                    all.push(a);
                }
            }
        }
        all
    }

    #[test]
    fn test_palliative_always_five() {
        for a in every_combination().into_iter().filter(|a| a.is_palliative) {
            assert_eq!(classify(&a, RuleSet::Standard).priority, CfmPriority::P5);
            assert_eq!(
                classify(&a, RuleSet::TerminalByCriteria).priority,
                CfmPriority::P5
            );
        }
    }

    #[test]
    fn test_standard_table() {
        let p = |s, r, l| classify(&answers(s, r, l, false), RuleSet::Standard).priority;

        assert_eq!(p(true, true, false), CfmPriority::P1);
        assert_eq!(p(false, true, false), CfmPriority::P2);
        assert_eq!(p(true, true, true), CfmPriority::P3);
        assert_eq!(p(true, false, true), CfmPriority::P3);
        assert_eq!(p(true, false, false), CfmPriority::P3);
        assert_eq!(p(false, true, true), CfmPriority::P4);
        assert_eq!(p(false, false, true), CfmPriority::P4);
        assert_eq!(p(false, false, false), CfmPriority::P4);
    }

    #[test]
    fn test_standard_ignores_reversibility_and_donor() {
        for a in every_combination() {
            let base = CfmAnswers {
                is_potentially_reversible: None,
                is_organ_donor: None,
                ..a
            };
            assert_eq!(
                classify(&a, RuleSet::Standard),
                classify(&base, RuleSet::Standard)
            );
        }
    }

    #[test]
    fn test_totality_in_range() {
        for a in every_combination() {
            for rules in [RuleSet::Standard, RuleSet::TerminalByCriteria] {
                let c = classify(&a, rules);
                assert!((1..=5).contains(&c.priority.level()));
                assert!(!c.justification.is_empty());
            }
        }
    }

    #[test]
    fn test_terminal_by_criteria_variant() {
        let mut a = answers(true, false, false, false);
        a.is_potentially_reversible = Some(false);
        assert_eq!(
            classify(&a, RuleSet::TerminalByCriteria).priority,
            CfmPriority::P5
        );
        assert_eq!(classify(&a, RuleSet::Standard).priority, CfmPriority::P3);

        a.is_organ_donor = Some(true);
        assert_eq!(
            classify(&a, RuleSet::TerminalByCriteria).priority,
            CfmPriority::P3
        );

        let mut unclear = answers(false, false, false, false);
        unclear.is_potentially_reversible = Some(true);
        let c = classify(&unclear, RuleSet::TerminalByCriteria);
        assert_eq!(c.priority, CfmPriority::P3);
        assert_eq!(c.justification, UNCLEAR);
    }

    #[test]
    fn test_answer_sheet_requires_answers() {
        let sheet = AnswerSheet {
            needs_life_support: Some(true),
            high_recovery_probability: None,
            has_therapeutic_limitation: Some(false),
            ..AnswerSheet::default()
        };
        assert!(matches!(
            sheet.complete(),
            Err(RegulationError::MissingAnswer("high recovery probability"))
        ));

        let palliative = AnswerSheet {
            is_palliative: true,
            ..AnswerSheet::default()
        };
        let done = palliative.complete().unwrap();
        assert!(done.is_palliative);
        assert_eq!(classify(&done, RuleSet::Standard).priority, CfmPriority::P5);
    }

    #[test]
    fn test_priority_levels() {
        assert_eq!(CfmPriority::from_level(3).unwrap(), CfmPriority::P3);
        assert!(CfmPriority::from_level(0).is_err());
        assert!(CfmPriority::from_level(6).is_err());
        assert!(CfmPriority::P2.is_urgent());
        assert!(!CfmPriority::P3.is_urgent());
        assert_eq!(CfmPriority::P5.info().recommendation, "Palliative care");
        assert_eq!(serde_json::to_string(&CfmPriority::P4).unwrap(), "4");
        assert!(serde_json::from_str::<CfmPriority>("9").is_err());
    }
}
