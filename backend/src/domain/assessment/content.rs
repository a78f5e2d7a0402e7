//! Report copy imports.
//!
//! Each CSV carries an `active` column; inactive rows are dropped on import
//! so the stored tables only hold copy the report renders.

use std::io::Read;

use serde::Deserialize;

use super::report::{Band, OverallBand, OverallItem, OverallItemKind, PhaseItem, ProgressItem, Tone};

/// Errors raised while importing report copy.
#[derive(Debug, thiserror::Error)]
pub enum ContentImportError {
    #[error("report copy csv is unreadable: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: {field} {value:?} is not recognised")]
    Field {
        line: usize,
        field: &'static str,
        value: String,
    },
}

/// Replacement copy for the report tables.
///
/// `None` leaves the matching table untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportContentImport {
    pub phase_items: Option<Vec<PhaseItem>>,
    pub progress_items: Option<Vec<ProgressItem>>,
    pub overall_items: Option<Vec<OverallItem>>,
}

impl ReportContentImport {
    pub fn is_empty(&self) -> bool {
        self.phase_items.is_none() && self.progress_items.is_none() && self.overall_items.is_none()
    }

    /// Rows across every table that will be written.
    pub fn row_count(&self) -> usize {
        self.phase_items.as_ref().map_or(0, Vec::len)
            + self.progress_items.as_ref().map_or(0, Vec::len)
            + self.overall_items.as_ref().map_or(0, Vec::len)
    }
}

#[derive(Debug, Deserialize)]
struct PhaseItemRecord {
    #[serde(alias = "phase_id")]
    phase: String,
    #[serde(default)]
    ordinal: i32,
    body: String,
    #[serde(default)]
    active: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProgressItemRecord {
    #[serde(alias = "phase_id")]
    phase: String,
    band: String,
    tone: String,
    #[serde(default)]
    ordinal: i32,
    body: String,
    #[serde(default)]
    active: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OverallItemRecord {
    band: String,
    kind: String,
    #[serde(default)]
    label: Option<String>,
    body: String,
    #[serde(default)]
    key_need: Option<String>,
    #[serde(default)]
    ordinal: i32,
    #[serde(default)]
    active: Option<String>,
}

fn reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// A blank `active` cell counts as active.
fn is_active(raw: Option<&str>) -> bool {
    match raw.map(str::trim) {
        None | Some("") => true,
        Some(value) => matches!(
            value.to_ascii_lowercase().as_str(),
            "1" | "true" | "t" | "yes" | "y"
        ),
    }
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.filter(|value| !value.trim().is_empty())
}

fn field_error(line: usize, field: &'static str, value: &str) -> ContentImportError {
    ContentImportError::Field {
        line,
        field,
        value: value.to_owned(),
    }
}

fn parse_phase(line: usize, raw: &str) -> Result<u8, ContentImportError> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .filter(|phase| (1..=4).contains(phase))
        .ok_or_else(|| field_error(line, "phase", raw))
}

/// Parse phase copy with the header `phase,ordinal,body,active`.
pub fn parse_phase_items_csv<R: Read>(input: R) -> Result<Vec<PhaseItem>, ContentImportError> {
    let mut items = Vec::new();
    for (index, record) in reader(input).deserialize::<PhaseItemRecord>().enumerate() {
        let record = record?;
        if !is_active(record.active.as_deref()) {
            continue;
        }
        items.push(PhaseItem {
            phase: parse_phase(index + 2, &record.phase)?,
            ordinal: record.ordinal,
            body: record.body,
        });
    }
    Ok(items)
}

/// Parse progress notes with the header `phase,band,tone,ordinal,body,active`.
pub fn parse_progress_items_csv<R: Read>(input: R) -> Result<Vec<ProgressItem>, ContentImportError> {
    let mut items = Vec::new();
    for (index, record) in reader(input).deserialize::<ProgressItemRecord>().enumerate() {
        let record = record?;
        if !is_active(record.active.as_deref()) {
            continue;
        }
        let line = index + 2;
        items.push(ProgressItem {
            phase: parse_phase(line, &record.phase)?,
            band: Band::parse(&record.band).ok_or_else(|| field_error(line, "band", &record.band))?,
            tone: Tone::parse(&record.tone).ok_or_else(|| field_error(line, "tone", &record.tone))?,
            ordinal: record.ordinal,
            body: record.body,
        });
    }
    Ok(items)
}

/// Parse overall copy with the header
/// `band,kind,label,body,key_need,ordinal,active`.
pub fn parse_overall_items_csv<R: Read>(input: R) -> Result<Vec<OverallItem>, ContentImportError> {
    let mut items = Vec::new();
    for (index, record) in reader(input).deserialize::<OverallItemRecord>().enumerate() {
        let record = record?;
        if !is_active(record.active.as_deref()) {
            continue;
        }
        let line = index + 2;
        items.push(OverallItem {
            band: OverallBand::parse(&record.band)
                .ok_or_else(|| field_error(line, "band", &record.band))?,
            kind: OverallItemKind::parse(&record.kind)
                .ok_or_else(|| field_error(line, "kind", &record.kind))?,
            label: non_blank(record.label),
            body: record.body,
            key_need: non_blank(record.key_need),
            ordinal: record.ordinal,
        });
    }
    Ok(items)
}
