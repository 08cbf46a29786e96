use ulid::Ulid;

use crate::calendar::{validate_range, DayRange};
use crate::limits::*;
use crate::model::*;

use super::conflict::{check_conflict, validate_slot, ConflictProbe};
use super::pricing::price;
use super::timeline::project;
use super::{ConflictError, Engine, EngineError};

impl Engine {
    pub async fn list_resources(&self) -> Vec<ResourceInfo> {
        let resources: Vec<_> = self.state.iter().map(|e| e.value().clone()).collect();
        let mut infos = Vec::with_capacity(resources.len());
        for rs in resources {
            let guard = rs.read().await;
            if !guard.deleted {
                infos.push(guard.info());
            }
        }
        infos
    }

    pub async fn resource(&self, id: Ulid) -> Result<ResourceInfo, EngineError> {
        Ok(self.resource_read(id).await?.info())
    }

    /// Read-only conflict check against a consistent snapshot of one resource.
    ///
    /// Advisory only: a later write re-checks under the write lock.
    pub async fn check_conflict(&self, resource_id: Ulid, probe: ConflictProbe) -> Result<Option<ConflictError>, EngineError> {
        validate_range(&probe.range)?;
        let guard = self.resource_read(resource_id).await?;
        validate_slot(guard.category, probe.time_slot)?;
        Ok(check_conflict(&guard, &probe))
    }

    /// Price a stay at the resource's current rates without booking it.
    pub async fn quote(&self, resource_id: Ulid, pricing_type: PricingType, range: DayRange) -> Result<Amount, EngineError> {
        validate_range(&range)?;
        let guard = self.resource_read(resource_id).await?;
        price(guard.category, pricing_type, &guard.rates, &range)
    }

    pub async fn timeline(&self, resource_id: Ulid, window: DayRange) -> Result<Vec<TimelinePeriod>, EngineError> {
        if window.start > window.end {
            return Err(EngineError::Validation(format!(
                "window start {} is after end {}",
                window.start, window.end
            )));
        }
        if window.len_days() > MAX_TIMELINE_WINDOW_DAYS {
            return Err(EngineError::LimitExceeded("timeline window too wide"));
        }
        let guard = self.resource_read(resource_id).await?;
        Ok(project(&guard, &window))
    }

    pub async fn bookings(&self, resource_id: Ulid) -> Result<Vec<Booking>, EngineError> {
        let guard = self.resource_read(resource_id).await?;
        Ok(guard.bookings.clone())
    }

    pub async fn booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let resource_id = self.get_resource_for_entity(&id).ok_or(EngineError::NotFound(id))?;
        let guard = self.resource_read(resource_id).await?;
        guard.booking(id).cloned().ok_or(EngineError::NotFound(id))
    }

    pub async fn holds(&self, resource_id: Ulid) -> Result<Vec<ReservationBlock>, EngineError> {
        let guard = self.resource_read(resource_id).await?;
        Ok(guard.holds.clone())
    }

    pub async fn maintenance(&self, resource_id: Ulid) -> Result<Vec<MaintenanceWindow>, EngineError> {
        let guard = self.resource_read(resource_id).await?;
        Ok(guard.maintenance.clone())
    }
}
