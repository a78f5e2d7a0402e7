//! Loss & Adaptation assessment.
//!
//! A run collects yes/no answers. Each answer maps through the scoring table
//! to weights on four phases; the run's phase totals are the sums over its
//! scorecard. Finalising a run fixes the per-phase maxima used to turn
//! totals into percentages for the report.

pub mod content;
pub mod report;
pub mod scoring;

use std::fmt;
use std::ops::Add;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserId;

pub use report::{
    Band, CopingLabel, DISCLAIMER, LossReport, OverallAssessment, OverallBand, OverallItem,
    OverallItemKind, PhaseItem, PhaseReport, ProgressItem, ProgressNote, ReportContent, Tone,
    build_report,
};
pub use content::{
    ContentImportError, ReportContentImport, parse_overall_items_csv, parse_phase_items_csv,
    parse_progress_items_csv,
};
pub use scoring::{ScoringImportError, parse_scoring_csv, phase_maxima, weights_for};

/// Database identifier of an assessment run.
pub type RunId = i64;
/// Identifier of a question in the scoring table.
pub type QuestionId = i32;

/// Subject code stored on every run.
pub const LOSS_SUBJECT: &str = "LOSS";
/// Number of phases scored by the assessment.
pub const PHASE_COUNT: usize = 4;
/// Most runs returned by a run listing.
pub const RUN_LIST_LIMIT: i64 = 50;

/// A yes/no answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    /// Parse a submitted answer.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "1" => Some(Self::Yes),
            "no" | "n" | "false" | "0" => Some(Self::No),
            _ => None,
        }
    }

    /// Stable lowercase name stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Finished,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Finished => "finished",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "in_progress" => Some(Self::InProgress),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }
}

/// Weights or totals for the four phases, indexed from zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseScores(pub [i32; PHASE_COUNT]);

impl PhaseScores {
    /// Sum across phases.
    pub fn total(&self) -> i32 {
        self.0.iter().sum()
    }

    /// Element-wise maximum.
    pub fn max(self, other: Self) -> Self {
        let mut out = self.0;
        for (slot, value) in out.iter_mut().zip(other.0) {
            *slot = (*slot).max(value);
        }
        Self(out)
    }
}

impl Add for PhaseScores {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        let mut out = self.0;
        for (slot, value) in out.iter_mut().zip(other.0) {
            *slot = slot.saturating_add(value);
        }
        Self(out)
    }
}

/// A row of the scoring table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringRow {
    pub question_id: QuestionId,
    pub answer: Answer,
    pub weights: PhaseScores,
}

/// An assessment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LossRun {
    pub id: RunId,
    pub user_id: UserId,
    pub subject: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// A run with its running total, as shown in run listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run: LossRun,
    /// Zero until the first answer is scored.
    pub total: i32,
}

/// Accumulated totals for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LossResult {
    pub run_id: RunId,
    pub user_id: UserId,
    pub totals: PhaseScores,
    /// Per-phase maxima, fixed when the run is finalised.
    pub maxima: Option<PhaseScores>,
    pub total: i32,
    pub max_total: Option<i32>,
    pub created_at: DateTime<Utc>,
}
