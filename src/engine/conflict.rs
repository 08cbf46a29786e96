use ulid::Ulid;

use crate::calendar::DayRange;
use crate::limits::*;
use crate::model::*;

use super::error::{ConflictError, ConflictKind};
use super::EngineError;

/// What is being placed; decides how the proposed range is read against bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proposal {
    /// `range.end` is the check-out day.
    Booking,
    /// `range.end` is the last held day.
    Hold,
}

#[derive(Debug, Clone, Copy)]
pub struct ConflictProbe {
    pub range: DayRange,
    pub time_slot: Option<TimeSlot>,
    pub proposal: Proposal,
    /// The booking being edited, ignored when checking against bookings.
    pub exclude_booking: Option<Ulid>,
}

impl ConflictProbe {
    pub fn booking(range: DayRange, time_slot: Option<TimeSlot>) -> Self {
        Self {
            range,
            time_slot,
            proposal: Proposal::Booking,
            exclude_booking: None,
        }
    }

    pub fn hold(range: DayRange, time_slot: Option<TimeSlot>) -> Self {
        Self {
            range,
            time_slot,
            proposal: Proposal::Hold,
            exclude_booking: None,
        }
    }

    pub fn excluding(mut self, booking_id: Ulid) -> Self {
        self.exclude_booking = Some(booking_id);
        self
    }
}

fn slots_disjoint(a: Option<TimeSlot>, b: Option<TimeSlot>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a != b)
}

/// First conflict wins: maintenance, then holds, then bookings.
///
/// Pure over the snapshot in `rs`; the caller holds the resource lock.
pub fn check_conflict(rs: &ResourceState, probe: &ConflictProbe) -> Option<ConflictError> {
    let conflict = |kind, range, source_id| ConflictError {
        resource_id: rs.id,
        kind,
        range,
        source_id,
    };

    if let Some(m) = rs.maintenance_overlapping(&probe.range).next() {
        return Some(conflict(ConflictKind::Maintenance, m.range, m.id));
    }

    let slot_based = rs.category.is_slot_based();
    for hold in rs.holds_overlapping(&probe.range) {
        if slot_based && hold.time_slot != probe.time_slot {
            continue;
        }
        // Re-proposing the exact hold is a toggle, not a clash.
        if hold.is_same_hold(&probe.range, probe.time_slot) {
            continue;
        }
        return Some(conflict(ConflictKind::Hold, hold.range, hold.id));
    }

    let occupied = match probe.proposal {
        Proposal::Booking => probe.range,
        Proposal::Hold => probe.range.inclusive_as_half_open(),
    };
    for booking in rs.bookings_overlapping(&occupied) {
        if probe.exclude_booking == Some(booking.id) {
            continue;
        }
        if slot_based && slots_disjoint(booking.time_slot, probe.time_slot) {
            continue;
        }
        return Some(conflict(ConflictKind::Booking, booking.range, booking.id));
    }

    None
}

/// Slot-based categories need a slot; the rest must not carry one.
pub(crate) fn validate_slot(category: Category, time_slot: Option<TimeSlot>) -> Result<(), EngineError> {
    match (category.is_slot_based(), time_slot) {
        (true, None) => Err(EngineError::Validation(format!(
            "time slot is required for {}",
            category.as_str()
        ))),
        (false, Some(_)) => Err(EngineError::Validation(format!(
            "time slot does not apply to {}",
            category.as_str()
        ))),
        _ => Ok(()),
    }
}

pub(crate) fn validate_text(value: &str, what: &'static str) -> Result<(), EngineError> {
    if value.len() > MAX_TEXT_LEN {
        return Err(EngineError::LimitExceeded(what));
    }
    Ok(())
}

pub(crate) fn validate_rates(rates: &Rates) -> Result<(), EngineError> {
    for rate in [rates.member, rates.guest] {
        if rate < 0 {
            return Err(EngineError::Validation(format!("rate must not be negative: {rate}")));
        }
        if rate > MAX_AMOUNT {
            return Err(EngineError::LimitExceeded("rate too large"));
        }
    }
    Ok(())
}
