//! Equipment model registry
//!
//! Static per-model tables: status variable ids, state-code dictionaries,
//! state-change collection events, the report subscription table and the
//! host command vocabulary. Sessions receive a `&'static EquipmentModel`
//! at construction; nothing downstream carries model-specific literals.

use std::fmt;
use std::str::FromStr;

use super::errors::SessionError;

/// What a subscribed report means to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportRole {
    /// Lot scanned at the tool; triggers validation.
    LotScan,
    /// Lot opened (tracked as active lot).
    LotOpen,
    /// Lot closed (clears active lot).
    LotClose,
    /// Currently selected program changed.
    ProgramChange,
}

/// One `(ceid, rptid, vids)` subscription, linked during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionEntry {
    /// Collection event.
    pub ceid: u32,
    /// Report defined for and linked to `ceid`.
    pub report_id: u32,
    /// Data variables carried by the report, in value order.
    pub vids: &'static [u32],
    /// How inbound reports with this id are decoded.
    pub role: ReportRole,
}

/// Positional layout of the lot-scan report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotScanShape {
    /// `(lotId, programName)`
    TwoValue,
    /// `(lotId, programName, plannedLots, activeLots)`
    FourValue,
}

/// Host command names and parameter names understood by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCommands {
    /// RCMD accepting a lot.
    pub accept: &'static str,
    /// RCMD rejecting a lot.
    pub reject: &'static str,
    /// RCMD selecting a process program.
    pub select: &'static str,
    /// CPNAME carrying the lot id.
    pub lot_param: &'static str,
    /// CPNAME carrying the reject reason.
    pub reason_param: &'static str,
    /// CPNAME carrying the program id.
    pub program_param: &'static str,
}

/// Model tags known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Die attach; four-value lot scan, program-change report.
    DieBonder,
    /// Wire bond; two-value lot scan, program queried on change.
    WireBonder,
}

impl ModelKind {
    /// Every registered tag.
    pub const ALL: [ModelKind; 2] = [ModelKind::DieBonder, ModelKind::WireBonder];

    /// Tag as written in the equipment list.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DieBonder => "DIE_BONDER",
            Self::WireBonder => "WIRE_BONDER",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| SessionError::UnknownModel(s.to_string()))
    }
}

/// Static description of one tool family.
#[derive(Debug, PartialEq, Eq)]
pub struct EquipmentModel {
    /// Registry tag.
    pub kind: ModelKind,
    /// SVID answering the GEM control state code.
    pub control_state_vid: u32,
    /// Control state code → name.
    pub control_states: &'static [(u64, &'static str)],
    /// Control-state-change CEID → resulting state name.
    pub control_state_events: &'static [(u32, &'static str)],
    /// SVID answering the process state code.
    pub process_state_vid: u32,
    /// Process state code → name.
    pub process_states: &'static [(u64, &'static str)],
    /// Process-state-change CEID → resulting state name.
    pub process_state_events: &'static [(u32, &'static str)],
    /// SVID answering the selected program name.
    pub program_vid: u32,
    /// CEID raised when the selected program changes.
    pub program_change_ceid: u32,
    /// Reports to define and link during the handshake.
    pub subscriptions: &'static [SubscriptionEntry],
    /// Lot-scan report layout.
    pub lot_scan_shape: LotScanShape,
    /// Host command vocabulary.
    pub commands: HostCommands,
}

impl EquipmentModel {
    /// Name for a control state code; unmapped codes are reported verbatim.
    #[must_use]
    pub fn control_state_name(&self, code: u64) -> String {
        lookup_state(self.control_states, code)
    }

    /// Name for a process state code; unmapped codes are reported verbatim.
    #[must_use]
    pub fn process_state_name(&self, code: u64) -> String {
        lookup_state(self.process_states, code)
    }

    /// Control state entered when `ceid` fires, if it is a control-state event.
    #[must_use]
    pub fn control_state_for_event(&self, ceid: u32) -> Option<&'static str> {
        find_event(self.control_state_events, ceid)
    }

    /// Process state entered when `ceid` fires, if it is a process-state event.
    #[must_use]
    pub fn process_state_for_event(&self, ceid: u32) -> Option<&'static str> {
        find_event(self.process_state_events, ceid)
    }

    /// Subscription entry owning `report_id`.
    #[must_use]
    pub fn subscription_for_report(&self, report_id: u32) -> Option<&'static SubscriptionEntry> {
        self.subscriptions.iter().find(|e| e.report_id == report_id)
    }

    /// First subscription entry with the given role.
    #[must_use]
    pub fn subscription_for_role(&self, role: ReportRole) -> Option<&'static SubscriptionEntry> {
        self.subscriptions.iter().find(|e| e.role == role)
    }
}

fn lookup_state(table: &[(u64, &str)], code: u64) -> String {
    table
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("Unknown State ({code})"))
}

fn find_event(table: &[(u32, &'static str)], ceid: u32) -> Option<&'static str> {
    table.iter().find(|(c, _)| *c == ceid).map(|(_, name)| *name)
}

// =============================================================================
// STATIC TABLES
// =============================================================================

/// GEM control state codes shared by both families.
const GEM_CONTROL_STATES: &[(u64, &str)] = &[
    (1, "Off-Line/Equipment Off-Line"),
    (2, "Off-Line/Attempt On-Line"),
    (3, "Off-Line/Host Off-Line"),
    (4, "On-Line/Local"),
    (5, "On-Line/Remote"),
];

static DIE_BONDER: EquipmentModel = EquipmentModel {
    kind: ModelKind::DieBonder,
    control_state_vid: 1,
    control_states: GEM_CONTROL_STATES,
    control_state_events: &[
        (1, "Off-Line/Equipment Off-Line"),
        (2, "On-Line/Local"),
        (3, "On-Line/Remote"),
        (4, "Off-Line/Host Off-Line"),
    ],
    process_state_vid: 2,
    process_states: &[
        (0, "Init"),
        (1, "Idle"),
        (2, "Setup"),
        (3, "Ready"),
        (4, "Executing"),
        (5, "Pause"),
        (6, "Alarm"),
    ],
    process_state_events: &[
        (10, "Idle"),
        (11, "Setup"),
        (12, "Executing"),
        (13, "Pause"),
        (14, "Alarm"),
    ],
    program_vid: 3,
    program_change_ceid: 20,
    subscriptions: &[
        SubscriptionEntry {
            ceid: 100,
            report_id: 100,
            vids: &[501, 502, 503, 504],
            role: ReportRole::LotScan,
        },
        SubscriptionEntry {
            ceid: 101,
            report_id: 101,
            vids: &[501],
            role: ReportRole::LotOpen,
        },
        SubscriptionEntry {
            ceid: 102,
            report_id: 102,
            vids: &[501],
            role: ReportRole::LotClose,
        },
        SubscriptionEntry {
            ceid: 20,
            report_id: 120,
            vids: &[3],
            role: ReportRole::ProgramChange,
        },
    ],
    lot_scan_shape: LotScanShape::FourValue,
    commands: HostCommands {
        accept: "LOT_ACCEPT",
        reject: "LOT_REJECT",
        select: "PP-SELECT",
        lot_param: "LOTID",
        reason_param: "REASON",
        program_param: "PPID",
    },
};

static WIRE_BONDER: EquipmentModel = EquipmentModel {
    kind: ModelKind::WireBonder,
    control_state_vid: 2001,
    control_states: GEM_CONTROL_STATES,
    control_state_events: &[
        (201, "Off-Line/Equipment Off-Line"),
        (202, "On-Line/Local"),
        (203, "On-Line/Remote"),
    ],
    process_state_vid: 2002,
    process_states: &[(1, "Idle"), (2, "Run"), (3, "Stop"), (4, "Down")],
    process_state_events: &[(210, "Idle"), (211, "Run"), (212, "Stop"), (213, "Down")],
    program_vid: 2003,
    program_change_ceid: 230,
    subscriptions: &[
        SubscriptionEntry {
            ceid: 300,
            report_id: 30,
            vids: &[3001, 3002],
            role: ReportRole::LotScan,
        },
        SubscriptionEntry {
            ceid: 301,
            report_id: 31,
            vids: &[3001],
            role: ReportRole::LotOpen,
        },
        SubscriptionEntry {
            ceid: 302,
            report_id: 32,
            vids: &[3001],
            role: ReportRole::LotClose,
        },
    ],
    lot_scan_shape: LotScanShape::TwoValue,
    commands: HostCommands {
        accept: "ACCEPT",
        reject: "REJECT",
        select: "PP_SELECT",
        lot_param: "LOT_ID",
        reason_param: "REASON",
        program_param: "PPID",
    },
};

/// Immutable registry of model tables, indexed by tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelRegistry;

impl ModelRegistry {
    /// The built-in registry.
    #[must_use]
    pub fn standard() -> Self {
        Self
    }

    /// Tables for a tag.
    #[must_use]
    pub fn get(&self, kind: ModelKind) -> &'static EquipmentModel {
        match kind {
            ModelKind::DieBonder => &DIE_BONDER,
            ModelKind::WireBonder => &WIRE_BONDER,
        }
    }

    /// Tables for a configured model string.
    pub fn resolve(&self, tag: &str) -> Result<&'static EquipmentModel, SessionError> {
        tag.parse::<ModelKind>().map(|kind| self.get(kind))
    }
}
