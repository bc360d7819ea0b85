// src/processing/classifier.rs
//! Muscle-tension classification from EMG magnitude

use crate::config::constants::classifier::{CONTRACTED_BELOW, TENSE_ABOVE};
use crate::processing::decoder::Reading;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Displayed muscle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MuscleStatus {
    /// No reading classified yet in this session
    #[default]
    Idle,
    Contracted,
    Average,
    Tense,
    /// Last frame could not be decoded
    DecodeError,
}

impl MuscleStatus {
    pub fn label(&self) -> &'static str {
        match self {
            MuscleStatus::Idle => "Idle",
            MuscleStatus::Contracted => "Contracted",
            MuscleStatus::Average => "Average",
            MuscleStatus::Tense => "Tense",
            MuscleStatus::DecodeError => "Decode error",
        }
    }
}

impl fmt::Display for MuscleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Threshold-band classifier.
///
/// `value < contracted_below` is `Contracted`, `value > tense_above` is `Tense`,
/// everything in between (inclusive) is `Average`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifier {
    contracted_below: u64,
    tense_above: u64,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            contracted_below: CONTRACTED_BELOW,
            tense_above: TENSE_ABOVE,
        }
    }
}

impl Classifier {
    /// `None` when the bands overlap, i.e. `contracted_below > tense_above + 1`.
    pub fn new(contracted_below: u64, tense_above: u64) -> Option<Self> {
        if contracted_below > tense_above.saturating_add(1) {
            return None;
        }
        Some(Self {
            contracted_below,
            tense_above,
        })
    }

    pub fn contracted_below(&self) -> u64 {
        self.contracted_below
    }

    pub fn tense_above(&self) -> u64 {
        self.tense_above
    }

    pub fn classify(&self, value: u64) -> MuscleStatus {
        if value < self.contracted_below {
            MuscleStatus::Contracted
        } else if value <= self.tense_above {
            MuscleStatus::Average
        } else {
            MuscleStatus::Tense
        }
    }

    /// Decode failures bypass the bands entirely.
    pub fn classify_reading(&self, reading: &Reading) -> MuscleStatus {
        match reading {
            Reading::Value(v) => self.classify(*v),
            Reading::Failed(_) => MuscleStatus::DecodeError,
        }
    }
}

/// Classify with the factory calibration.
pub fn classify(value: u64) -> MuscleStatus {
    Classifier::default().classify(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::decoder::DecodeError;
    use crate::config::ClassifierConfig;
    use proptest::prelude::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(classify(339), MuscleStatus::Contracted);
        assert_eq!(classify(340), MuscleStatus::Average);
        assert_eq!(classify(362), MuscleStatus::Average);
        assert_eq!(classify(363), MuscleStatus::Tense);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(classify(0), MuscleStatus::Contracted);
        assert_eq!(classify(u64::MAX), MuscleStatus::Tense);
    }

    #[test]
    fn test_decode_failures_map_to_decode_error() {
        let classifier = Classifier::default();
        for error in [DecodeError::NotText, DecodeError::NoDigits, DecodeError::ParseFailed] {
            assert_eq!(
                classifier.classify_reading(&Reading::Failed(error)),
                MuscleStatus::DecodeError
            );
        }
    }

    #[test]
    fn test_custom_bands() {
        let classifier = Classifier::new(100, 200).unwrap();
        assert_eq!(classifier.classify(99), MuscleStatus::Contracted);
        assert_eq!(classifier.classify(150), MuscleStatus::Average);
        assert_eq!(classifier.classify(201), MuscleStatus::Tense);

        // Empty average band is allowed, overlapping bands are not
        assert!(Classifier::new(201, 200).is_some());
        assert!(Classifier::new(202, 200).is_none());
        assert!(ClassifierConfig { contracted_below: 202, tense_above: 200 }.build().is_none());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&MuscleStatus::DecodeError).expect("Failed to serialize");
        assert_eq!(json, "\"decode_error\"");
        let status: MuscleStatus = serde_json::from_str(&json).expect("Failed to deserialize");
        assert_eq!(status, MuscleStatus::DecodeError);
    }

    proptest! {
        #[test]
        fn prop_bands_partition(v in any::<u64>()) {
            let status = classify(v);
            prop_assert_eq!(status == MuscleStatus::Contracted, v < 340);
            prop_assert_eq!(status == MuscleStatus::Average, (340..=362).contains(&v));
            prop_assert_eq!(status == MuscleStatus::Tense, v > 362);
        }
    }
}
