//! Featured placement domain types, schedule rules, and state machine.
//!
//! Status and placement values are stored as lowercase text in the database
//! (guarded by CHECK constraints), so every enum here round-trips through
//! [`as_str`](Placement::as_str) and [`FromStr`].

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Longest schedule a single placement request may cover.
pub const MAX_DURATION_DAYS: i32 = 365;

/// Furthest a schedule may start from today, in either direction.
pub const MAX_START_OFFSET_DAYS: i64 = 365;

/// Maximum length of free-text notes and cancellation reasons.
pub const MAX_NOTES_LEN: usize = 2000;

/// Actor label recorded on audit entries written by the lifecycle sweep.
pub const SYSTEM_ACTOR_LABEL: &str = "system";

/// Ad catalog status an ad must have before it can be featured.
pub const AD_STATUS_ACTIVE: &str = "active";

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// A surface on which a featured ad may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Homepage,
    Results,
    Detail,
}

impl Placement {
    pub const ALL: [Placement; 3] = [Placement::Homepage, Placement::Results, Placement::Detail];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Homepage => "homepage",
            Self::Results => "results",
            Self::Detail => "detail",
        }
    }

    /// Stable small integer used when deriving lock keys.
    pub fn ordinal(self) -> i64 {
        match self {
            Self::Homepage => 0,
            Self::Results => 1,
            Self::Detail => 2,
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Placement {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "homepage" => Ok(Self::Homepage),
            "results" => Ok(Self::Results),
            "detail" => Ok(Self::Detail),
            other => Err(CoreError::Validation(format!(
                "Invalid placement '{other}'. Expected one of: homepage, results, detail"
            ))),
        }
    }
}

impl TryFrom<String> for Placement {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a placement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeaturedStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
}

impl FeaturedStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether a row in this status counts against capacity.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_live()
    }
}

impl fmt::Display for FeaturedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeaturedStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(CoreError::Validation(format!(
                "Invalid status '{other}'. Expected one of: pending, active, expired, cancelled"
            ))),
        }
    }
}

impl TryFrom<String> for FeaturedStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Placement request state machine.
///
/// ```text
/// pending --sweep--> active --sweep--> expired
///    \                 |
///     +----cancel------+--> cancelled
/// ```
///
/// `expired` and `cancelled` are terminal.
pub mod state_machine {
    use super::FeaturedStatus;

    /// Returns the statuses reachable from `from`.
    pub fn valid_transitions(from: FeaturedStatus) -> &'static [FeaturedStatus] {
        match from {
            FeaturedStatus::Pending => &[FeaturedStatus::Active, FeaturedStatus::Cancelled],
            FeaturedStatus::Active => &[FeaturedStatus::Expired, FeaturedStatus::Cancelled],
            FeaturedStatus::Expired | FeaturedStatus::Cancelled => &[],
        }
    }

    pub fn can_transition(from: FeaturedStatus, to: FeaturedStatus) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a transition, returning an error message for invalid ones.
    pub fn validate_transition(from: FeaturedStatus, to: FeaturedStatus) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(format!("Invalid transition: {from} -> {to}"))
        }
    }
}

// ---------------------------------------------------------------------------
// Audit actions
// ---------------------------------------------------------------------------

/// Action recorded on a featured audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ManualActivation,
    SelfServiceActivation,
    CancelledByAdmin,
    ExpiredBySweep,
    ActivatedBySweep,
    Restored,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManualActivation => "manual_activation",
            Self::SelfServiceActivation => "self_service_activation",
            Self::CancelledByAdmin => "cancelled_by_admin",
            Self::ExpiredBySweep => "expired_by_sweep",
            Self::ActivatedBySweep => "activated_by_sweep",
            Self::Restored => "restored",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual_activation" => Ok(Self::ManualActivation),
            "self_service_activation" => Ok(Self::SelfServiceActivation),
            "cancelled_by_admin" => Ok(Self::CancelledByAdmin),
            "expired_by_sweep" => Ok(Self::ExpiredBySweep),
            "activated_by_sweep" => Ok(Self::ActivatedBySweep),
            "restored" => Ok(Self::Restored),
            other => Err(CoreError::Validation(format!("Invalid audit action '{other}'"))),
        }
    }
}

impl TryFrom<String> for AuditAction {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Funding
// ---------------------------------------------------------------------------

/// How a placement is paid for. Exactly one source per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Funding {
    /// Admin-granted; no credits are debited.
    Manual { granted_by: DbId },
    /// User-initiated; the caller has already debited `credits_spent`.
    SelfService { credits_spent: i32 },
}

impl Funding {
    pub fn is_manual(&self) -> bool {
        matches!(self, Self::Manual { .. })
    }

    pub fn credit_consumed(&self) -> bool {
        matches!(self, Self::SelfService { .. })
    }

    pub fn credits_spent(&self) -> i32 {
        match *self {
            Self::Manual { .. } => 0,
            Self::SelfService { credits_spent } => credits_spent,
        }
    }

    pub fn manual_activated_by(&self) -> Option<DbId> {
        match *self {
            Self::Manual { granted_by } => Some(granted_by),
            Self::SelfService { .. } => None,
        }
    }

    /// Audit action written when this funding path admits a request.
    pub fn activation_action(&self) -> AuditAction {
        if self.is_manual() {
            AuditAction::ManualActivation
        } else {
            AuditAction::SelfServiceActivation
        }
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// Expiry of a placement: midnight UTC of `scheduled_start` plus whole days.
///
/// Computed once at admission and never recomputed. Dates past the end of
/// the calendar are a validation error.
pub fn compute_expires_at(
    scheduled_start: NaiveDate,
    duration_days: i32,
) -> Result<Timestamp, CoreError> {
    scheduled_start
        .and_time(NaiveTime::MIN)
        .and_utc()
        .checked_add_signed(Duration::days(i64::from(duration_days)))
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "scheduled_start {scheduled_start} plus {duration_days} days is out of range"
            ))
        })
}

/// Whether a request starting on `scheduled_start` activates at admission.
pub fn is_immediate(scheduled_start: NaiveDate, now: Timestamp) -> bool {
    scheduled_start <= now.date_naive()
}

/// Status a freshly admitted row starts in.
pub fn initial_status(scheduled_start: NaiveDate, now: Timestamp) -> FeaturedStatus {
    if is_immediate(scheduled_start, now) {
        FeaturedStatus::Active
    } else {
        FeaturedStatus::Pending
    }
}

/// Slots left for display after an admission that saw `occupied_before`.
pub fn slots_remaining(max_slots: i32, occupied_before: i64) -> i64 {
    (i64::from(max_slots) - (occupied_before + 1)).max(0)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a requested duration in days.
pub fn validate_duration(duration_days: i32) -> Result<(), CoreError> {
    if duration_days <= 0 {
        return Err(CoreError::Validation(format!(
            "duration_days must be positive, got {duration_days}"
        )));
    }
    if duration_days > MAX_DURATION_DAYS {
        return Err(CoreError::Validation(format!(
            "duration_days must be at most {MAX_DURATION_DAYS}, got {duration_days}"
        )));
    }
    Ok(())
}

/// Validate that a start date lies within [`MAX_START_OFFSET_DAYS`] of today.
pub fn validate_scheduled_start(
    scheduled_start: NaiveDate,
    now: Timestamp,
) -> Result<(), CoreError> {
    let offset = scheduled_start
        .signed_duration_since(now.date_naive())
        .num_days();
    if offset.abs() > MAX_START_OFFSET_DAYS {
        return Err(CoreError::Validation(format!(
            "scheduled_start must be within {MAX_START_OFFSET_DAYS} days of today, got {scheduled_start}"
        )));
    }
    Ok(())
}

/// Validate an optional free-text field (notes, cancellation reason).
pub fn validate_free_text(field: &str, value: Option<&str>) -> Result<(), CoreError> {
    match value {
        Some(v) if v.chars().count() > MAX_NOTES_LEN => Err(CoreError::Validation(format!(
            "{field} must be at most {MAX_NOTES_LEN} characters"
        ))),
        _ => Ok(()),
    }
}
