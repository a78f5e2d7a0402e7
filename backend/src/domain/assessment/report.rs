//! Report assembly for a finished (or in-progress) run.
//!
//! Percentages are computed with [`Decimal`] to one decimal place and
//! clamped to `[0, 100]`. Bands split at 40 and 70. Phases 1 to 3 measure
//! distress, so a low band means the learner is coping; phase 4 measures
//! re-engagement and reads the other way round.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::{LossResult, PHASE_COUNT, RunId};
use crate::domain::user::UserId;

/// Shown at the foot of every report.
pub const DISCLAIMER: &str = "This report is an informational summary to support reflection and planning. \
It is not a diagnosis or a substitute for professional care. If you are in distress \
or worried about safety, please contact a health professional or local emergency services.";

const PHASE_LABELS: [&str; PHASE_COUNT] = ["Impact", "Hopelessness", "Helplessness", "Re-Engagement"];

fn low_threshold() -> Decimal {
    Decimal::from(40)
}

fn high_threshold() -> Decimal {
    Decimal::from(70)
}

/// Percentage band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Low,
    Mid,
    High,
}

impl Band {
    /// Band for a percentage: below 40 is low, below 70 is mid.
    pub fn from_pct(pct: Decimal) -> Self {
        if pct < low_threshold() {
            Self::Low
        } else if pct < high_threshold() {
            Self::Mid
        } else {
            Self::High
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" | "1" => Some(Self::Low),
            "mid" | "medium" | "2" => Some(Self::Mid),
            "high" | "3" => Some(Self::High),
            _ => None,
        }
    }

    /// Title shown next to the percentage.
    pub fn level(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Mid => "Medium",
            Self::High => "High",
        }
    }
}

/// Overall-assessment band, driven by phase 1 alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallBand {
    Low,
    High,
}

impl OverallBand {
    pub fn from_pct(pct: Decimal) -> Self {
        if pct < low_threshold() { Self::Low } else { Self::High }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::High => "High",
        }
    }
}

/// Tone of a progress note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Positive,
    SlightlyPositive,
    Negative,
}

impl Tone {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "slightly_positive" | "slightly" => Some(Self::SlightlyPositive),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::SlightlyPositive => "slightly_positive",
            Self::Negative => "negative",
        }
    }
}

/// How well the learner is coping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopingLabel {
    #[serde(rename = "Coping")]
    Coping,
    #[serde(rename = "Slightly Coping")]
    SlightlyCoping,
    #[serde(rename = "Not Coping")]
    NotCoping,
}

impl CopingLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coping => "Coping",
            Self::SlightlyCoping => "Slightly Coping",
            Self::NotCoping => "Not Coping",
        }
    }
}

/// Comment line for a phase, shown in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseItem {
    pub phase: u8,
    pub ordinal: i32,
    pub body: String,
}

/// Progress note for a phase and band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressItem {
    pub phase: u8,
    pub band: Band,
    pub tone: Tone,
    pub ordinal: i32,
    pub body: String,
}

/// Whether an overall item is the summary paragraph or a bullet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverallItemKind {
    Summary,
    Bullet,
}

impl OverallItemKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "summary" => Some(Self::Summary),
            "bullet" => Some(Self::Bullet),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Bullet => "bullet",
        }
    }
}

/// Overall-assessment copy stored per band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverallItem {
    pub band: OverallBand,
    pub kind: OverallItemKind,
    pub label: Option<String>,
    pub body: String,
    pub key_need: Option<String>,
    pub ordinal: i32,
}

/// Active report copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportContent {
    pub phase_items: Vec<PhaseItem>,
    pub progress_items: Vec<ProgressItem>,
    pub overall_items: Vec<OverallItem>,
}

/// A progress note as shown in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressNote {
    pub tone: Tone,
    pub body: String,
}

/// One phase of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: u8,
    pub label: &'static str,
    pub pct: Decimal,
    pub band: Band,
    pub coping: CopingLabel,
    pub items: Vec<String>,
    pub progress: Vec<ProgressNote>,
}

/// Overall assessment block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverallAssessment {
    pub band: OverallBand,
    pub label: String,
    pub pct: u8,
    pub summary: String,
    pub bullets: Vec<String>,
    pub key_need: Option<String>,
}

/// The full report for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LossReport {
    pub run_id: RunId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub phases: Vec<PhaseReport>,
    pub adaptive_vector: CopingLabel,
    pub overall: OverallAssessment,
    pub disclaimer: &'static str,
}

/// Percentage of `value` over `max`, one decimal place, clamped to `[0, 100]`.
pub fn phase_pct(value: i32, max: Decimal) -> Decimal {
    if max <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let raw = Decimal::ONE_HUNDRED * Decimal::from(value) / max;
    raw.round_dp_with_strategy(1, RoundingStrategy::MidpointNearestEven)
        .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
}

/// Maximum used for a phase.
///
/// A missing or zero per-phase maximum falls back to a quarter of the
/// overall maximum, then to one.
pub fn effective_max(result: &LossResult, index: usize) -> Decimal {
    let per_phase = result
        .maxima
        .and_then(|maxima| maxima.0.get(index).copied())
        .filter(|max| *max != 0);
    match (per_phase, result.max_total.filter(|total| *total > 0)) {
        (Some(max), _) => Decimal::from(max),
        (None, Some(total)) => Decimal::from(total) / Decimal::from(PHASE_COUNT),
        (None, None) => Decimal::ONE,
    }
}

/// Number of comment items shown for a phase at `pct`.
pub fn item_count(phase: u8, pct: Decimal) -> usize {
    let (step, cap) = if phase <= 2 {
        (Decimal::new(111, 1), 9)
    } else {
        (Decimal::new(125, 1), 8)
    };
    let pct = pct.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    (pct / step).floor().to_usize().unwrap_or(0).min(cap)
}

/// Coping label for one phase.
pub fn coping_label(phase: u8, band: Band) -> CopingLabel {
    match (phase >= 4, band) {
        (_, Band::Mid) => CopingLabel::SlightlyCoping,
        (false, Band::Low) | (true, Band::High) => CopingLabel::Coping,
        (false, Band::High) | (true, Band::Low) => CopingLabel::NotCoping,
    }
}

/// Adaptive vector across all four phases.
pub fn adaptive_vector(pcts: [Decimal; PHASE_COUNT]) -> CopingLabel {
    let [impact, hopeless, helpless, reengage] = pcts;
    let low = low_threshold();
    let high = high_threshold();
    if impact < low && hopeless < low && helpless >= high && reengage >= high {
        CopingLabel::Coping
    } else if (helpless >= low || reengage >= low) && impact < high && hopeless < high {
        CopingLabel::SlightlyCoping
    } else {
        CopingLabel::NotCoping
    }
}

/// Overall assessment from the phase 1 percentage.
pub fn overall_assessment(phase_one_pct: Decimal, items: &[OverallItem]) -> OverallAssessment {
    let pct = phase_one_pct.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    let band = OverallBand::from_pct(pct);
    let whole = pct.trunc().to_u8().unwrap_or(0);
    let mut for_band: Vec<&OverallItem> = items.iter().filter(|item| item.band == band).collect();
    for_band.sort_by_key(|item| item.ordinal);

    let summary = for_band
        .iter()
        .find(|item| item.kind == OverallItemKind::Summary);
    match summary {
        Some(summary) => OverallAssessment {
            band,
            label: summary
                .label
                .clone()
                .unwrap_or_else(|| band.label().to_owned()),
            pct: whole,
            summary: summary.body.clone(),
            bullets: for_band
                .iter()
                .filter(|item| item.kind == OverallItemKind::Bullet)
                .map(|item| item.body.clone())
                .collect(),
            key_need: summary.key_need.clone(),
        },
        None => fallback_overall(band, whole),
    }
}

fn fallback_overall(band: OverallBand, pct: u8) -> OverallAssessment {
    let (summary, bullets, key_need): (&str, &[&str], Option<&str>) = match band {
        OverallBand::Low => (
            "You're carrying this experience with steadiness. Keep what's working, simple routines, \
             small connections and naming needs, so your footing stays firm as you move forward.",
            &[],
            None,
        ),
        OverallBand::High => (
            "It looks like this event is still taking up a lot of space, which can tug anyone into a place \
             where adjusting feels hard. The good news is you're not stuck: most people regain their footing \
             with a little gentle structure and reliable support.",
            &[
                "Anchor one small daily routine (wake, eat, move, rest).",
                "Reconnect with one trusted person this week.",
                "Name one feeling and one need each day to lower overload.",
                "Keep a brief worry window (for example 10 minutes) to reduce rumination.",
                "Use a calming reset (slow exhale breathing, short walk, stretch).",
                "If distress stays high or safety is a concern, speak to a counsellor or GP.",
            ],
            Some("gentle structure + reliable support"),
        ),
    };
    OverallAssessment {
        band,
        label: band.label().to_owned(),
        pct,
        summary: summary.to_owned(),
        bullets: bullets.iter().map(|line| (*line).to_owned()).collect(),
        key_need: key_need.map(str::to_owned),
    }
}

/// Assemble the report for a run's result.
pub fn build_report(result: &LossResult, content: &ReportContent) -> LossReport {
    let phases: Vec<PhaseReport> = (1u8..)
        .zip(PHASE_LABELS)
        .zip(result.totals.0)
        .enumerate()
        .map(|(index, ((phase, label), total))| {
            let pct = phase_pct(total, effective_max(result, index));
            let band = Band::from_pct(pct);
            PhaseReport {
                phase,
                label,
                pct,
                band,
                coping: coping_label(phase, band),
                items: phase_items(content, phase, item_count(phase, pct)),
                progress: progress_notes(content, phase, band),
            }
        })
        .collect();
    let pcts: [Decimal; PHASE_COUNT] =
        std::array::from_fn(|index| phases.get(index).map_or(Decimal::ZERO, |phase| phase.pct));

    LossReport {
        run_id: result.run_id,
        user_id: result.user_id,
        created_at: result.created_at,
        adaptive_vector: adaptive_vector(pcts),
        overall: overall_assessment(pcts[0], &content.overall_items),
        phases,
        disclaimer: DISCLAIMER,
    }
}

fn phase_items(content: &ReportContent, phase: u8, count: usize) -> Vec<String> {
    let mut items: Vec<&PhaseItem> = content
        .phase_items
        .iter()
        .filter(|item| item.phase == phase)
        .collect();
    items.sort_by_key(|item| item.ordinal);
    items
        .into_iter()
        .take(count)
        .map(|item| item.body.clone())
        .collect()
}

fn progress_notes(content: &ReportContent, phase: u8, band: Band) -> Vec<ProgressNote> {
    let mut notes: Vec<&ProgressItem> = content
        .progress_items
        .iter()
        .filter(|item| item.phase == phase && item.band == band)
        .collect();
    notes.sort_by_key(|item| item.ordinal);
    notes
        .into_iter()
        .map(|item| ProgressNote {
            tone: item.tone,
            body: item.body.clone(),
        })
        .collect()
}
