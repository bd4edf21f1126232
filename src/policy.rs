// policy.rs — Decision table: classifier outcome → cues to play and delay
// before the next capture.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ai::{Answer, ClassificationResult};
use crate::audio::{CUE_NEUTRAL, CUE_POSITIVE};

/// What a cycle's classification came back as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Yes,
    No,
    Unknown,
    Error,
}

impl From<&ClassificationResult> for Outcome {
    fn from(result: &ClassificationResult) -> Self {
        match result.answer {
            Answer::Yes => Outcome::Yes,
            Answer::No => Outcome::No,
            Answer::Unknown => Outcome::Unknown,
        }
    }
}

/// Play `cue` after waiting `delay_before_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CueStep {
    pub cue: String,
    pub delay_before_ms: u64,
}

impl CueStep {
    pub fn new(cue: impl Into<String>, delay_before_ms: u64) -> Self {
        Self {
            cue: cue.into(),
            delay_before_ms,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_before_ms)
    }
}

/// Cues in order, then a final wait before the next capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub cues: Vec<CueStep>,
    pub next_capture_delay_ms: u64,
}

impl Schedule {
    pub fn next_capture_delay(&self) -> Duration {
        Duration::from_millis(self.next_capture_delay_ms)
    }

    /// Time from the decision to the next capture.
    pub fn total(&self) -> Duration {
        self.cues.iter().map(CueStep::delay).sum::<Duration>() + self.next_capture_delay()
    }

    fn neutral_only(next_capture_delay_ms: u64) -> Self {
        Self {
            cues: vec![CueStep::new(CUE_NEUTRAL, 0)],
            next_capture_delay_ms,
        }
    }
}

/// Unset rows keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecisionPolicy {
    pub yes: Schedule,
    pub no: Schedule,
    pub unknown: Schedule,
    pub error: Schedule,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            yes: Schedule {
                cues: vec![CueStep::new(CUE_POSITIVE, 0), CueStep::new(CUE_NEUTRAL, 8_000)],
                next_capture_delay_ms: 4_000,
            },
            no: Schedule::neutral_only(4_000),
            unknown: Schedule::neutral_only(4_000),
            error: Schedule::neutral_only(4_000),
        }
    }
}

impl DecisionPolicy {
    pub fn schedule_for(&self, outcome: Outcome) -> &Schedule {
        match outcome {
            Outcome::Yes => &self.yes,
            Outcome::No => &self.no,
            Outcome::Unknown => &self.unknown,
            Outcome::Error => &self.error,
        }
    }
}
