use crate::calendar::DayRange;
use crate::model::*;

/// Every period touching `window` (inclusive), clipped to it and ordered by
/// displayed start.
pub fn project(rs: &ResourceState, window: &DayRange) -> Vec<TimelinePeriod> {
    let mut periods: Vec<TimelinePeriod> = Vec::new();

    for m in rs.maintenance_overlapping(window) {
        let shown = m.range.clip(window);
        periods.push(TimelinePeriod {
            kind: PeriodKind::Maintenance,
            start: shown.start,
            end: shown.end,
            source_id: m.id,
            time_slot: None,
            payment_status: None,
        });
    }

    for h in rs.holds_overlapping(window) {
        let shown = h.range.clip(window);
        periods.push(TimelinePeriod {
            kind: PeriodKind::Hold,
            start: shown.start,
            end: shown.end,
            source_id: h.id,
            time_slot: h.time_slot,
            payment_status: None,
        });
    }

    // Bookings are listed by start, so the first one past the window ends the
    // scan. A check-out day is free, so a stay leaving on `window.start` is not shown.
    let occupied = window.inclusive_as_half_open();
    for b in rs.bookings.iter().take_while(|b| b.range.start <= window.end) {
        if !b.range.overlaps_half_open(&occupied) {
            continue;
        }
        let shown = b.range.clip(window);
        periods.push(TimelinePeriod {
            kind: PeriodKind::Booking,
            start: shown.start,
            end: shown.end,
            source_id: b.id,
            time_slot: b.time_slot,
            payment_status: Some(b.payment.status),
        });
    }

    periods.sort_by_key(|p| p.start);
    periods
}
