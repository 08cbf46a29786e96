use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::calendar::{Day, DayRange};

/// Money in the club's minor unit.
pub type Amount = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Room,
    Hall,
    Lawn,
    Photoshoot,
}

impl Category {
    /// Rooms are stayed in per night; everything else is a single occurrence.
    pub fn is_multi_night(self) -> bool {
        matches!(self, Category::Room)
    }

    /// Halls are booked and held per time slot.
    pub fn is_slot_based(self) -> bool {
        matches!(self, Category::Hall)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Room => "room",
            Category::Hall => "hall",
            Category::Lawn => "lawn",
            Category::Photoshoot => "photoshoot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeSlot {
    Morning,
    Evening,
    Night,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PricingType {
    Member,
    Guest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    HalfPaid,
    Paid,
    /// Charged to the member's account, settled outside the engine.
    ToBill,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::HalfPaid => "HALF_PAID",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::ToBill => "TO_BILL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rates {
    pub member: Amount,
    pub guest: Amount,
}

impl Rates {
    pub fn for_pricing(&self, pricing_type: PricingType) -> Amount {
        match pricing_type {
            PricingType::Member => self.member,
            PricingType::Guest => self.guest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub reason: String,
    /// Inclusive.
    pub range: DayRange,
}

/// A staff-imposed hold, distinct from a customer booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationBlock {
    pub id: Ulid,
    pub resource_id: Ulid,
    /// Inclusive.
    pub range: DayRange,
    pub time_slot: Option<TimeSlot>,
    pub created_by: String,
    pub remarks: Option<String>,
}

impl ReservationBlock {
    /// Same range and slot means the same hold.
    pub fn is_same_hold(&self, range: &DayRange, time_slot: Option<TimeSlot>) -> bool {
        self.range == *range && self.time_slot == time_slot
    }
}

/// Amounts always satisfy `paid_amount + pending_amount == total_price`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub status: PaymentStatus,
    pub total_price: Amount,
    pub paid_amount: Amount,
    pub pending_amount: Amount,
}

impl Payment {
    pub fn unpaid(total_price: Amount) -> Self {
        Self {
            status: PaymentStatus::Unpaid,
            total_price,
            paid_amount: 0,
            pending_amount: total_price,
        }
    }

    pub fn is_consistent(&self) -> bool {
        if self.paid_amount + self.pending_amount != self.total_price {
            return false;
        }
        match self.status {
            PaymentStatus::Paid => self.pending_amount == 0,
            PaymentStatus::Unpaid | PaymentStatus::ToBill => self.paid_amount == 0,
            PaymentStatus::HalfPaid => self.paid_amount > 0 && self.pending_amount > 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Guest {
    pub name: String,
    pub contact: Option<String>,
    pub id_number: Option<String>,
}

/// A confirmed customer reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub resource_id: Ulid,
    /// Check-in/check-out for rooms; a single day for everything else.
    pub range: DayRange,
    pub time_slot: Option<TimeSlot>,
    pub pricing_type: PricingType,
    pub payment: Payment,
    /// Refund obligations emitted so far.
    pub refund_amount: Amount,
    pub paid_by: Option<String>,
    pub guest: Option<Guest>,
}

#[derive(Debug, Clone)]
pub struct ResourceState {
    pub id: Ulid,
    pub category: Category,
    pub name: Option<String>,
    pub rates: Rates,
    pub is_active: bool,
    /// Each period list is sorted by `range.start`.
    pub maintenance: Vec<MaintenanceWindow>,
    pub holds: Vec<ReservationBlock>,
    pub bookings: Vec<Booking>,
    /// Set under the write guard by a delete. Tasks that were queued on the
    /// lock find it set and must not write.
    pub deleted: bool,
}

fn insert_by_start<T>(items: &mut Vec<T>, item: T, start: impl Fn(&T) -> Day) {
    let key = start(&item);
    let pos = items.partition_point(|i| start(i) <= key);
    items.insert(pos, item);
}

fn remove_by_id<T>(items: &mut Vec<T>, id: Ulid, item_id: impl Fn(&T) -> Ulid) -> Option<T> {
    let pos = items.iter().position(|i| item_id(i) == id)?;
    Some(items.remove(pos))
}

impl ResourceState {
    pub fn new(id: Ulid, category: Category, name: Option<String>, rates: Rates, is_active: bool) -> Self {
        Self {
            id,
            category,
            name,
            rates,
            is_active,
            maintenance: Vec::new(),
            holds: Vec::new(),
            bookings: Vec::new(),
            deleted: false,
        }
    }

    pub fn period_count(&self) -> usize {
        self.maintenance.len() + self.holds.len() + self.bookings.len()
    }

    pub fn insert_maintenance(&mut self, window: MaintenanceWindow) {
        insert_by_start(&mut self.maintenance, window, |m| m.range.start);
    }

    pub fn remove_maintenance(&mut self, id: Ulid) -> Option<MaintenanceWindow> {
        remove_by_id(&mut self.maintenance, id, |m| m.id)
    }

    pub fn insert_hold(&mut self, hold: ReservationBlock) {
        insert_by_start(&mut self.holds, hold, |h| h.range.start);
    }

    pub fn remove_hold(&mut self, id: Ulid) -> Option<ReservationBlock> {
        remove_by_id(&mut self.holds, id, |h| h.id)
    }

    pub fn insert_booking(&mut self, booking: Booking) {
        insert_by_start(&mut self.bookings, booking, |b| b.range.start);
    }

    pub fn remove_booking(&mut self, id: Ulid) -> Option<Booking> {
        remove_by_id(&mut self.bookings, id, |b| b.id)
    }

    pub fn booking(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    /// The hold with exactly this range and slot, if any.
    pub fn find_hold(&self, range: &DayRange, time_slot: Option<TimeSlot>) -> Option<&ReservationBlock> {
        self.holds.iter().find(|h| h.is_same_hold(range, time_slot))
    }

    /// Maintenance windows intersecting `query`, inclusively.
    pub fn maintenance_overlapping(&self, query: &DayRange) -> impl Iterator<Item = &MaintenanceWindow> {
        let right_bound = self.maintenance.partition_point(|m| m.range.start <= query.end);
        self.maintenance[..right_bound]
            .iter()
            .filter(move |m| m.range.end >= query.start)
    }

    /// Holds intersecting `query`, inclusively.
    pub fn holds_overlapping(&self, query: &DayRange) -> impl Iterator<Item = &ReservationBlock> {
        let right_bound = self.holds.partition_point(|h| h.range.start <= query.end);
        self.holds[..right_bound]
            .iter()
            .filter(move |h| h.range.end >= query.start)
    }

    /// Bookings intersecting `query`, half-open.
    pub fn bookings_overlapping(&self, query: &DayRange) -> impl Iterator<Item = &Booking> {
        let query_end = query.exclusive_end();
        let right_bound = self.bookings.partition_point(|b| b.range.start < query_end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.range.exclusive_end() > query.start)
    }

    /// Ids of every period owned by this resource.
    pub fn period_ids(&self) -> Vec<Ulid> {
        self.maintenance
            .iter()
            .map(|m| m.id)
            .chain(self.holds.iter().map(|h| h.id))
            .chain(self.bookings.iter().map(|b| b.id))
            .collect()
    }

    pub fn info(&self) -> ResourceInfo {
        ResourceInfo {
            id: self.id,
            category: self.category,
            name: self.name.clone(),
            rates: self.rates,
            is_active: self.is_active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldRef {
    pub id: Ulid,
    pub resource_id: Ulid,
}

/// The event types. This is the journal record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ResourceCreated {
        id: Ulid,
        category: Category,
        name: Option<String>,
        rates: Rates,
        is_active: bool,
    },
    ResourceUpdated {
        id: Ulid,
        name: Option<String>,
        rates: Rates,
        is_active: bool,
    },
    ResourceDeleted {
        id: Ulid,
    },
    MaintenanceScheduled {
        window: MaintenanceWindow,
    },
    MaintenanceUpdated {
        window: MaintenanceWindow,
    },
    MaintenanceCleared {
        id: Ulid,
        resource_id: Ulid,
    },
    /// One bulk hold sync; both halves commit together.
    HoldsSynced {
        created: Vec<ReservationBlock>,
        released: Vec<HoldRef>,
    },
    BookingCreated {
        booking: Booking,
        released_hold: Option<Ulid>,
    },
    BookingUpdated {
        booking: Booking,
        released_hold: Option<Ulid>,
        refund_due: Amount,
    },
    BookingCancelled {
        id: Ulid,
        resource_id: Ulid,
        refund_due: Amount,
    },
}

impl Event {
    /// Resources whose state this event changes.
    pub fn resource_ids(&self) -> Vec<Ulid> {
        match self {
            Event::ResourceCreated { id, .. }
            | Event::ResourceUpdated { id, .. }
            | Event::ResourceDeleted { id } => vec![*id],
            Event::MaintenanceScheduled { window } | Event::MaintenanceUpdated { window } => {
                vec![window.resource_id]
            }
            Event::MaintenanceCleared { resource_id, .. }
            | Event::BookingCancelled { resource_id, .. } => vec![*resource_id],
            Event::BookingCreated { booking, .. } | Event::BookingUpdated { booking, .. } => {
                vec![booking.resource_id]
            }
            Event::HoldsSynced { created, released } => {
                let mut ids: Vec<Ulid> = created
                    .iter()
                    .map(|h| h.resource_id)
                    .chain(released.iter().map(|h| h.resource_id))
                    .collect();
                ids.sort();
                ids.dedup();
                ids
            }
        }
    }

    /// The refund obligation this event creates, if any.
    pub fn refund_due(&self) -> Option<RefundDue> {
        let (booking_id, resource_id, amount) = match self {
            Event::BookingUpdated { booking, refund_due, .. } => (booking.id, booking.resource_id, *refund_due),
            Event::BookingCancelled {
                id,
                resource_id,
                refund_due,
            } => (*id, *resource_id, *refund_due),
            _ => return None,
        };
        (amount > 0).then_some(RefundDue {
            booking_id,
            resource_id,
            amount,
        })
    }
}

/// Money owed back to a payer after a reprice or a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundDue {
    pub booking_id: Ulid,
    pub resource_id: Ulid,
    pub amount: Amount,
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub id: Ulid,
    pub category: Category,
    pub name: Option<String>,
    pub rates: Rates,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Booking,
    Hold,
    Maintenance,
}

/// A period clipped for display. `source_id` leads back to the record with
/// its true dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelinePeriod {
    pub kind: PeriodKind,
    pub start: Day,
    pub end: Day,
    pub source_id: Ulid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_slot: Option<TimeSlot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(a: &str, b: &str) -> DayRange {
        DayRange::parse(a, b).unwrap()
    }

    fn rates() -> Rates {
        Rates { member: 5000, guest: 8000 }
    }

    fn booking(rid: Ulid, a: &str, b: &str) -> Booking {
        Booking {
            id: Ulid::new(),
            resource_id: rid,
            range: range(a, b),
            time_slot: None,
            pricing_type: PricingType::Member,
            payment: Payment::unpaid(0),
            refund_amount: 0,
            paid_by: None,
            guest: None,
        }
    }

    fn hold(rid: Ulid, a: &str, b: &str, slot: Option<TimeSlot>) -> ReservationBlock {
        ReservationBlock {
            id: Ulid::new(),
            resource_id: rid,
            range: range(a, b),
            time_slot: slot,
            created_by: "desk".into(),
            remarks: None,
        }
    }

    #[test]
    fn periods_stay_sorted_by_start() {
        let mut rs = ResourceState::new(Ulid::new(), Category::Room, None, rates(), true);
        rs.insert_booking(booking(rs.id, "2024-05-20", "2024-05-22"));
        rs.insert_booking(booking(rs.id, "2024-05-01", "2024-05-03"));
        rs.insert_booking(booking(rs.id, "2024-05-10", "2024-05-12"));
        let starts: Vec<String> = rs.bookings.iter().map(|b| b.range.start.to_string()).collect();
        assert_eq!(starts, ["2024-05-01", "2024-05-10", "2024-05-20"]);
    }

    #[test]
    fn remove_nonexistent_returns_none() {
        let mut rs = ResourceState::new(Ulid::new(), Category::Room, None, rates(), true);
        rs.insert_hold(hold(rs.id, "2024-05-01", "2024-05-01", None));
        assert!(rs.remove_hold(Ulid::new()).is_none());
        assert_eq!(rs.holds.len(), 1);
    }

    #[test]
    fn bookings_overlapping_is_half_open() {
        let mut rs = ResourceState::new(Ulid::new(), Category::Room, None, rates(), true);
        rs.insert_booking(booking(rs.id, "2024-05-10", "2024-05-12"));
        assert_eq!(rs.bookings_overlapping(&range("2024-05-11", "2024-05-13")).count(), 1);
        assert_eq!(rs.bookings_overlapping(&range("2024-05-12", "2024-05-14")).count(), 0);
        assert_eq!(rs.bookings_overlapping(&range("2024-05-08", "2024-05-10")).count(), 0);
    }

    #[test]
    fn holds_overlapping_is_inclusive() {
        let mut rs = ResourceState::new(Ulid::new(), Category::Hall, None, rates(), true);
        rs.insert_hold(hold(rs.id, "2024-06-01", "2024-06-03", Some(TimeSlot::Morning)));
        rs.insert_hold(hold(rs.id, "2024-07-01", "2024-07-01", Some(TimeSlot::Morning)));
        let hits: Vec<_> = rs.holds_overlapping(&range("2024-06-03", "2024-06-10")).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].range, range("2024-06-01", "2024-06-03"));
    }

    #[test]
    fn long_maintenance_spanning_query_is_found() {
        let mut rs = ResourceState::new(Ulid::new(), Category::Lawn, None, rates(), true);
        rs.insert_maintenance(MaintenanceWindow {
            id: Ulid::new(),
            resource_id: rs.id,
            reason: "re-turfing".into(),
            range: range("2024-01-01", "2024-12-31"),
        });
        assert_eq!(rs.maintenance_overlapping(&range("2024-06-01", "2024-06-01")).count(), 1);
    }

    #[test]
    fn find_hold_matches_range_and_slot() {
        let mut rs = ResourceState::new(Ulid::new(), Category::Hall, None, rates(), true);
        let h = hold(rs.id, "2024-06-01", "2024-06-01", Some(TimeSlot::Morning));
        let id = h.id;
        rs.insert_hold(h);
        let day = range("2024-06-01", "2024-06-01");
        assert_eq!(rs.find_hold(&day, Some(TimeSlot::Morning)).map(|h| h.id), Some(id));
        assert!(rs.find_hold(&day, Some(TimeSlot::Night)).is_none());
        assert!(rs.find_hold(&range("2024-06-01", "2024-06-02"), Some(TimeSlot::Morning)).is_none());
    }

    #[test]
    fn payment_consistency() {
        assert!(Payment::unpaid(10_000).is_consistent());
        let half = Payment {
            status: PaymentStatus::HalfPaid,
            total_price: 10_000,
            paid_amount: 4_000,
            pending_amount: 6_000,
        };
        assert!(half.is_consistent());
        assert!(!Payment { pending_amount: 5_000, ..half }.is_consistent());
        assert!(!Payment { status: PaymentStatus::Paid, ..half }.is_consistent());
    }

    #[test]
    fn holds_synced_touches_each_resource_once() {
        let a = Ulid::new();
        let b = Ulid::new();
        let event = Event::HoldsSynced {
            created: vec![hold(a, "2024-06-01", "2024-06-01", None), hold(b, "2024-06-01", "2024-06-01", None)],
            released: vec![HoldRef { id: Ulid::new(), resource_id: a }],
        };
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(event.resource_ids(), expected);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let rid = Ulid::new();
        let event = Event::BookingCreated {
            booking: booking(rid, "2024-05-10", "2024-05-12"),
            released_hold: Some(Ulid::new()),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
