use std::sync::Arc;

use tokio::sync::{oneshot, RwLock};
use tracing::{debug, info};
use ulid::Ulid;

use crate::calendar::{validate_range, DayRange};
use crate::limits::*;
use crate::model::*;

use super::conflict::{check_conflict, validate_rates, validate_slot, validate_text, ConflictProbe};
use super::payment::{reconcile, PaymentChange};
use super::pricing::price;
use super::{Engine, EngineError, JournalCommand};

/// A validated reservation action from the front desk.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub range: DayRange,
    pub time_slot: Option<TimeSlot>,
    pub pricing_type: PricingType,
    /// Initial payment state; `paid_amount` only matters for `HalfPaid`.
    pub status: PaymentStatus,
    pub paid_amount: Amount,
    pub paid_by: Option<String>,
    pub guest: Option<Guest>,
}

/// A booking after an edit, plus any money now owed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingChange {
    pub booking: Booking,
    pub refund_due: Amount,
}

fn validate_guest(guest: &Guest) -> Result<(), EngineError> {
    validate_text(&guest.name, "guest name too long")?;
    for field in [&guest.contact, &guest.id_number].into_iter().flatten() {
        validate_text(field, "guest detail too long")?;
    }
    Ok(())
}

fn conflict_rejected(conflict: super::ConflictError) -> EngineError {
    metrics::counter!(crate::observability::CONFLICTS_TOTAL, "kind" => conflict.kind.as_str()).increment(1);
    debug!("rejected: {} busy with {} {}", conflict.resource_id, conflict.kind.as_str(), conflict.range);
    EngineError::Conflict(conflict)
}

impl Engine {
    // ── Resources ────────────────────────────────────────────

    pub async fn create_resource(
        &self,
        id: Ulid,
        category: Category,
        name: Option<String>,
        rates: Rates,
        is_active: bool,
    ) -> Result<(), EngineError> {
        if let Some(n) = &name {
            validate_text(n, "resource name too long")?;
        }
        validate_rates(&rates)?;
        let _catalog = self.catalog.lock().await;
        if self.state.len() >= MAX_RESOURCES {
            return Err(EngineError::LimitExceeded("too many resources"));
        }
        if self.state.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::ResourceCreated {
            id,
            category,
            name: name.clone(),
            rates,
            is_active,
        };
        self.journal_append(&event).await?;
        let rs = ResourceState::new(id, category, name, rates, is_active);
        self.state.insert(id, Arc::new(RwLock::new(rs)));
        self.notify.send(id, &event);
        Ok(())
    }

    pub async fn update_resource(
        &self,
        id: Ulid,
        name: Option<String>,
        rates: Rates,
        is_active: bool,
    ) -> Result<(), EngineError> {
        if let Some(n) = &name {
            validate_text(n, "resource name too long")?;
        }
        validate_rates(&rates)?;
        let mut guard = self.resource_write(id).await?;

        let event = Event::ResourceUpdated {
            id,
            name,
            rates,
            is_active,
        };
        self.persist_and_apply(id, &mut guard, &event).await
    }

    /// Remove a resource together with every period it owns.
    pub async fn delete_resource(&self, id: Ulid) -> Result<(), EngineError> {
        let mut guard = self.resource_write(id).await?;

        let event = Event::ResourceDeleted { id };
        self.journal_append(&event).await?;
        guard.deleted = true;
        for period_id in guard.period_ids() {
            self.entity_to_resource.remove(&period_id);
        }
        self.state.remove(&id);
        self.notify.send(id, &event);
        self.notify.remove(&id);
        Ok(())
    }

    // ── Maintenance ──────────────────────────────────────────

    pub async fn schedule_maintenance(
        &self,
        id: Ulid,
        resource_id: Ulid,
        range: DayRange,
        reason: String,
    ) -> Result<(), EngineError> {
        validate_range(&range)?;
        validate_text(&reason, "maintenance reason too long")?;
        if self.entity_to_resource.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let mut guard = self.resource_write(resource_id).await?;
        if guard.period_count() >= MAX_PERIODS_PER_RESOURCE {
            return Err(EngineError::LimitExceeded("too many periods on resource"));
        }

        let event = Event::MaintenanceScheduled {
            window: MaintenanceWindow {
                id,
                resource_id,
                reason,
                range,
            },
        };
        self.persist_and_apply(resource_id, &mut guard, &event).await
    }

    pub async fn update_maintenance(&self, id: Ulid, range: DayRange, reason: String) -> Result<Ulid, EngineError> {
        validate_range(&range)?;
        validate_text(&reason, "maintenance reason too long")?;
        let (resource_id, mut guard) = self.resolve_entity_write(&id).await?;
        if !guard.maintenance.iter().any(|m| m.id == id) {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::MaintenanceUpdated {
            window: MaintenanceWindow {
                id,
                resource_id,
                reason,
                range,
            },
        };
        self.persist_and_apply(resource_id, &mut guard, &event).await?;
        Ok(resource_id)
    }

    pub async fn clear_maintenance(&self, id: Ulid) -> Result<Ulid, EngineError> {
        let (resource_id, mut guard) = self.resolve_entity_write(&id).await?;
        if !guard.maintenance.iter().any(|m| m.id == id) {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::MaintenanceCleared { id, resource_id };
        self.persist_and_apply(resource_id, &mut guard, &event).await?;
        Ok(resource_id)
    }

    // ── Bookings ─────────────────────────────────────────────

    /// Confirm a booking. An exact-match hold on the same range and slot is
    /// released in the same commit.
    pub async fn create_booking(&self, req: BookingRequest) -> Result<Booking, EngineError> {
        validate_range(&req.range)?;
        if let Some(paid_by) = &req.paid_by {
            validate_text(paid_by, "paid_by too long")?;
        }
        if let Some(guest) = &req.guest {
            validate_guest(guest)?;
        }
        if self.entity_to_resource.contains_key(&req.id) {
            return Err(EngineError::AlreadyExists(req.id));
        }
        let mut guard = self.resource_write(req.resource_id).await?;
        if !guard.is_active {
            return Err(EngineError::Validation(format!("resource {} is not active", req.resource_id)));
        }
        validate_slot(guard.category, req.time_slot)?;
        if guard.period_count() >= MAX_PERIODS_PER_RESOURCE {
            return Err(EngineError::LimitExceeded("too many periods on resource"));
        }

        if let Some(conflict) = check_conflict(&guard, &ConflictProbe::booking(req.range, req.time_slot)) {
            return Err(conflict_rejected(conflict));
        }
        let released_hold = guard.find_hold(&req.range, req.time_slot).map(|h| h.id);

        let total = price(guard.category, req.pricing_type, &guard.rates, &req.range)?;
        let payment = reconcile(
            &Payment::unpaid(total),
            PaymentChange::StatusSet {
                status: req.status,
                paid_amount: req.paid_amount,
            },
        )?
        .payment;

        let booking = Booking {
            id: req.id,
            resource_id: req.resource_id,
            range: req.range,
            time_slot: req.time_slot,
            pricing_type: req.pricing_type,
            payment,
            refund_amount: 0,
            paid_by: req.paid_by,
            guest: req.guest,
        };
        let event = Event::BookingCreated {
            booking: booking.clone(),
            released_hold,
        };
        self.persist_and_apply(req.resource_id, &mut guard, &event).await?;

        metrics::counter!(crate::observability::BOOKINGS_TOTAL, "op" => "create").increment(1);
        info!(
            "booked {} on {} for {} ({} {})",
            booking.id,
            booking.resource_id,
            booking.range,
            booking.payment.total_price,
            booking.payment.status.as_str()
        );
        Ok(booking)
    }

    /// Move a booking to new dates, reprice it and reconcile what was paid.
    pub async fn reschedule_booking(
        &self,
        id: Ulid,
        range: DayRange,
        time_slot: Option<TimeSlot>,
    ) -> Result<BookingChange, EngineError> {
        validate_range(&range)?;
        let (resource_id, mut guard) = self.resolve_entity_write(&id).await?;
        let current = guard.booking(id).cloned().ok_or(EngineError::NotFound(id))?;
        validate_slot(guard.category, time_slot)?;

        let probe = ConflictProbe::booking(range, time_slot).excluding(id);
        if let Some(conflict) = check_conflict(&guard, &probe) {
            return Err(conflict_rejected(conflict));
        }
        let released_hold = guard.find_hold(&range, time_slot).map(|h| h.id);

        let new_total = price(guard.category, current.pricing_type, &guard.rates, &range)?;
        let reconciled = reconcile(&current.payment, PaymentChange::Repriced { new_total })?;

        let booking = Booking {
            range,
            time_slot,
            payment: reconciled.payment,
            refund_amount: current.refund_amount + reconciled.refund_due,
            ..current
        };
        let event = Event::BookingUpdated {
            booking: booking.clone(),
            released_hold,
            refund_due: reconciled.refund_due,
        };
        self.persist_and_apply(resource_id, &mut guard, &event).await?;

        metrics::counter!(crate::observability::BOOKINGS_TOTAL, "op" => "reschedule").increment(1);
        if reconciled.refund_due > 0 {
            metrics::counter!(crate::observability::REFUNDS_DUE_TOTAL).increment(1);
            info!("booking {id} rescheduled to {range}, refund due {}", reconciled.refund_due);
        } else {
            info!("booking {id} rescheduled to {range}");
        }
        Ok(BookingChange {
            booking,
            refund_due: reconciled.refund_due,
        })
    }

    /// Record an operator payment action on a booking.
    pub async fn record_payment(
        &self,
        id: Ulid,
        status: PaymentStatus,
        paid_amount: Amount,
    ) -> Result<Booking, EngineError> {
        let (resource_id, mut guard) = self.resolve_entity_write(&id).await?;
        let current = guard.booking(id).cloned().ok_or(EngineError::NotFound(id))?;
        let reconciled = reconcile(&current.payment, PaymentChange::StatusSet { status, paid_amount })?;

        let booking = Booking {
            payment: reconciled.payment,
            ..current
        };
        let event = Event::BookingUpdated {
            booking: booking.clone(),
            released_hold: None,
            refund_due: 0,
        };
        self.persist_and_apply(resource_id, &mut guard, &event).await?;
        metrics::counter!(crate::observability::BOOKINGS_TOTAL, "op" => "payment").increment(1);
        Ok(booking)
    }

    /// Cancel a booking. Whatever was paid becomes a refund obligation.
    pub async fn cancel_booking(&self, id: Ulid) -> Result<BookingChange, EngineError> {
        let (resource_id, mut guard) = self.resolve_entity_write(&id).await?;
        let current = guard.booking(id).cloned().ok_or(EngineError::NotFound(id))?;
        let refund_due = current.payment.paid_amount;

        let event = Event::BookingCancelled {
            id,
            resource_id,
            refund_due,
        };
        self.persist_and_apply(resource_id, &mut guard, &event).await?;

        metrics::counter!(crate::observability::BOOKINGS_TOTAL, "op" => "cancel").increment(1);
        if refund_due > 0 {
            metrics::counter!(crate::observability::REFUNDS_DUE_TOTAL).increment(1);
        }
        info!("booking {id} cancelled, refund due {refund_due}");
        Ok(BookingChange {
            booking: current,
            refund_due,
        })
    }

    // ── Journal maintenance ──────────────────────────────────

    /// Rewrite the journal with only the events needed to recreate the current state.
    ///
    /// Every resource stays read-locked until the rewritten file is in place, so
    /// no commit can land in the old journal after its resource was snapshotted.
    pub async fn compact_journal(&self) -> Result<(), EngineError> {
        let _catalog = self.catalog.lock().await;
        let mut ids: Vec<Ulid> = self.state.iter().map(|e| *e.key()).collect();
        ids.sort();
        let mut guards = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(rs) = self.get_resource(id) {
                guards.push(rs.read_owned().await);
            }
        }

        let mut events = Vec::new();
        for guard in guards.iter().filter(|g| !g.deleted) {
            events.push(Event::ResourceCreated {
                id: guard.id,
                category: guard.category,
                name: guard.name.clone(),
                rates: guard.rates,
                is_active: guard.is_active,
            });
            for window in &guard.maintenance {
                events.push(Event::MaintenanceScheduled { window: window.clone() });
            }
            if !guard.holds.is_empty() {
                events.push(Event::HoldsSynced {
                    created: guard.holds.clone(),
                    released: Vec::new(),
                });
            }
            for booking in &guard.bookings {
                events.push(Event::BookingCreated {
                    booking: booking.clone(),
                    released_hold: None,
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::JournalError("journal writer shut down".into()))?;
        let result = rx
            .await
            .map_err(|_| EngineError::JournalError("journal writer dropped response".into()))?
            .map_err(|e| EngineError::JournalError(e.to_string()));
        drop(guards);
        result
    }

    pub async fn journal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .journal_tx
            .send(JournalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
