//! Domain layer: model tables, session state and the pure validation logic.

pub mod acks;
pub mod errors;
pub mod lot;
pub mod model;
pub mod reports;
pub mod rules;
pub mod selection;
pub mod session;

pub use acks::{
    DefineReportAck, EnableEventAck, HostCommandAck, LinkReportAck, OfflineAck, OnlineAck,
    ProgramAck,
};
pub use errors::{
    HandshakeStep, LookupError, PackageCodeError, RecipeError, RecipeStep, ReportError,
    RuleError, SessionError, StepFailure, SubscriptionError, TransactionError,
};
pub use lot::{LotDecision, LotInfo, LotRequest, RejectReason};
pub use model::{
    EquipmentModel, HostCommands, LotScanShape, ModelKind, ModelRegistry, ReportRole,
    SubscriptionEntry,
};
pub use reports::{EventReport, LotScanReport, ReportData, TypedReport};
pub use rules::{RuleBook, RuleGroup, RuleGroupRecord, RuleOptions, RuleRecord, ValidateType, ValidationRule};
pub use selection::{derive_selection_key, SelectionMask};
pub use session::EquipmentSession;
