use std::collections::HashMap;

use tracing::{debug, info};
use ulid::Ulid;

use crate::calendar::{validate_range, DayRange};
use crate::limits::*;
use crate::model::*;

use super::conflict::{check_conflict, validate_slot, validate_text, ConflictProbe};
use super::{apply_to_resource, Engine, EngineError};

/// Make `range`/`time_slot` held (or not) on every listed resource.
#[derive(Debug, Clone)]
pub struct HoldSyncRequest {
    pub resource_ids: Vec<Ulid>,
    /// Inclusive.
    pub range: DayRange,
    pub time_slot: Option<TimeSlot>,
    pub reserved: bool,
    pub created_by: String,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub to_create: Vec<ReservationBlock>,
    pub to_delete: Vec<HoldRef>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldChange {
    Create,
    Delete(Ulid),
}

/// Decide what one resource needs to reach the desired hold state.
///
/// Already in the desired state yields `None`, so resends are no-ops.
pub fn plan_hold_change(
    rs: &ResourceState,
    range: &DayRange,
    time_slot: Option<TimeSlot>,
    reserved: bool,
) -> Result<Option<HoldChange>, EngineError> {
    validate_slot(rs.category, time_slot)?;
    match (rs.find_hold(range, time_slot), reserved) {
        (Some(hold), false) => Ok(Some(HoldChange::Delete(hold.id))),
        (Some(_), true) | (None, false) => Ok(None),
        (None, true) => match check_conflict(rs, &ConflictProbe::hold(*range, time_slot)) {
            Some(conflict) => Err(EngineError::Conflict(conflict)),
            None => Ok(Some(HoldChange::Create)),
        },
    }
}

impl Engine {
    /// All-or-nothing bulk hold toggle. One conflict aborts the whole batch;
    /// otherwise creations and releases land in a single journal record.
    pub async fn sync_holds(&self, req: HoldSyncRequest) -> Result<SyncPlan, EngineError> {
        validate_range(&req.range)?;
        validate_text(&req.created_by, "created_by too long")?;
        if let Some(remarks) = &req.remarks {
            validate_text(remarks, "remarks too long")?;
        }
        if req.resource_ids.len() > MAX_BATCH_SIZE {
            return Err(EngineError::LimitExceeded("batch too large"));
        }

        // Acquire write locks in sorted order to prevent deadlocks.
        let mut resource_ids = req.resource_ids.clone();
        resource_ids.sort();
        resource_ids.dedup();

        let mut guards = Vec::with_capacity(resource_ids.len());
        for rid in &resource_ids {
            guards.push(self.resource_write(*rid).await?);
        }

        // Phase 1: plan against the locked snapshot.
        let mut plan = SyncPlan::default();
        for guard in &guards {
            let change = match plan_hold_change(guard, &req.range, req.time_slot, req.reserved) {
                Ok(change) => change,
                Err(e) => {
                    if let EngineError::Conflict(c) = &e {
                        metrics::counter!(crate::observability::CONFLICTS_TOTAL, "kind" => c.kind.as_str())
                            .increment(1);
                        metrics::counter!(crate::observability::HOLD_SYNC_TOTAL, "outcome" => "conflict")
                            .increment(1);
                    }
                    debug!("hold sync rejected on {}: {e}", guard.id);
                    return Err(e);
                }
            };
            match change {
                Some(HoldChange::Create) => {
                    if guard.period_count() >= MAX_PERIODS_PER_RESOURCE {
                        return Err(EngineError::LimitExceeded("too many periods on resource"));
                    }
                    plan.to_create.push(ReservationBlock {
                        id: Ulid::new(),
                        resource_id: guard.id,
                        range: req.range,
                        time_slot: req.time_slot,
                        created_by: req.created_by.clone(),
                        remarks: req.remarks.clone(),
                    });
                }
                Some(HoldChange::Delete(id)) => plan.to_delete.push(HoldRef {
                    id,
                    resource_id: guard.id,
                }),
                None => {}
            }
        }

        if plan.is_empty() {
            metrics::counter!(crate::observability::HOLD_SYNC_TOTAL, "outcome" => "unchanged").increment(1);
            return Ok(plan);
        }

        // Phase 2: one record, then apply everywhere.
        let event = Event::HoldsSynced {
            created: plan.to_create.clone(),
            released: plan.to_delete.clone(),
        };
        self.journal_append(&event).await?;

        let index: HashMap<Ulid, usize> = guards.iter().enumerate().map(|(i, g)| (g.id, i)).collect();
        for resource_id in event.resource_ids() {
            if let Some(&i) = index.get(&resource_id) {
                apply_to_resource(&mut guards[i], &event, &self.entity_to_resource);
                self.notify.send(resource_id, &event);
            }
        }

        metrics::counter!(crate::observability::HOLD_SYNC_TOTAL, "outcome" => "applied").increment(1);
        metrics::counter!(crate::observability::HOLDS_CHANGED_TOTAL, "change" => "created")
            .increment(plan.to_create.len() as u64);
        metrics::counter!(crate::observability::HOLDS_CHANGED_TOTAL, "change" => "released")
            .increment(plan.to_delete.len() as u64);
        info!(
            "synced holds for {}: {} created, {} released",
            req.range,
            plan.to_create.len(),
            plan.to_delete.len()
        );
        Ok(plan)
    }
}
