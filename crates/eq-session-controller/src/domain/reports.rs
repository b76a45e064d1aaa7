//! Event report decoding
//!
//! An S6F11 body is `L,3 {DATAID, CEID, L,n {L,2 {RPTID, L,m {V...}}}}`.
//! Reports are first decoded generically, then turned into a typed variant
//! selected by the model's subscription table, so nothing downstream indexes
//! values by position.

use shared_types::{ItemError, SecsItem};

use super::errors::ReportError;
use super::model::{EquipmentModel, LotScanShape, ReportRole};

/// One `(RPTID, values)` pair from an event report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportData {
    /// Report id.
    pub report_id: u32,
    /// Values in VID order.
    pub values: Vec<SecsItem>,
}

/// A decoded S6F11 event report.
#[derive(Debug, Clone, PartialEq)]
pub struct EventReport {
    /// DATAID chosen by the tool.
    pub data_id: u64,
    /// Collection event that fired.
    pub ceid: u32,
    /// Linked reports (may be empty).
    pub reports: Vec<ReportData>,
}

impl EventReport {
    /// Decode an S6F11 body.
    pub fn parse(body: &SecsItem) -> Result<Self, ReportError> {
        let top = body.expect_list(3)?;
        let data_id = top[0].as_u64().ok_or(ItemError::ExpectedNumeric)?;
        let ceid = as_id(&top[1])?;
        let raw_reports = top[2].as_list().ok_or(ItemError::ExpectedList)?;

        let mut reports = Vec::with_capacity(raw_reports.len());
        for raw in raw_reports {
            let pair = raw.expect_list(2)?;
            let report_id = as_id(&pair[0])?;
            let values = pair[1].as_list().ok_or(ItemError::ExpectedList)?.to_vec();
            reports.push(ReportData { report_id, values });
        }

        Ok(Self {
            data_id,
            ceid,
            reports,
        })
    }
}

fn as_id(item: &SecsItem) -> Result<u32, ItemError> {
    item.as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or(ItemError::ExpectedNumeric)
}

/// Positional lot-scan values, named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotScanReport {
    /// Raw scanned lot id (may carry a program-request suffix).
    pub lot_id: String,
    /// Program the tool reports as selected.
    pub program_name: String,
    /// Lots planned on the tool (four-value models).
    pub planned_lots: Option<u64>,
    /// Lots currently active on the tool (four-value models).
    pub active_lots: Option<u64>,
}

/// A report decoded by role.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedReport {
    /// Lot scanned; validate it.
    LotScan(LotScanReport),
    /// Lot opened.
    LotOpen { lot_id: String },
    /// Lot closed.
    LotClose { lot_id: String },
    /// Selected program changed.
    ProgramChange { program: String },
    /// Report id not in the subscription table.
    Unrecognized { report_id: u32 },
}

impl TypedReport {
    /// Decode `report` according to the model's subscription table.
    pub fn classify(model: &EquipmentModel, report: &ReportData) -> Result<Self, ReportError> {
        let Some(entry) = model.subscription_for_report(report.report_id) else {
            return Ok(Self::Unrecognized {
                report_id: report.report_id,
            });
        };

        match entry.role {
            ReportRole::LotScan => decode_lot_scan(model.lot_scan_shape, report).map(Self::LotScan),
            ReportRole::LotOpen => Ok(Self::LotOpen {
                lot_id: single_text(report)?,
            }),
            ReportRole::LotClose => Ok(Self::LotClose {
                lot_id: single_text(report)?,
            }),
            ReportRole::ProgramChange => Ok(Self::ProgramChange {
                program: single_text(report)?,
            }),
        }
    }
}

fn decode_lot_scan(shape: LotScanShape, report: &ReportData) -> Result<LotScanReport, ReportError> {
    let (expected, label) = match shape {
        LotScanShape::TwoValue => (2, "2"),
        LotScanShape::FourValue => (4, "4"),
    };
    if report.values.len() != expected {
        return Err(ReportError::ValueCount {
            report_id: report.report_id,
            expected: label,
            actual: report.values.len(),
        });
    }

    let lot_id = text_at(report, 0)?;
    let program_name = text_at(report, 1)?;
    let (planned_lots, active_lots) = match shape {
        LotScanShape::TwoValue => (None, None),
        LotScanShape::FourValue => (report.values[2].as_u64(), report.values[3].as_u64()),
    };

    Ok(LotScanReport {
        lot_id,
        program_name,
        planned_lots,
        active_lots,
    })
}

fn single_text(report: &ReportData) -> Result<String, ReportError> {
    if report.values.is_empty() {
        return Err(ReportError::ValueCount {
            report_id: report.report_id,
            expected: "at least 1",
            actual: 0,
        });
    }
    text_at(report, 0)
}

fn text_at(report: &ReportData, index: usize) -> Result<String, ReportError> {
    report.values[index]
        .to_text()
        .map(|s| s.trim().to_string())
        .ok_or(ReportError::NotScalar {
            report_id: report.report_id,
            index,
        })
}
