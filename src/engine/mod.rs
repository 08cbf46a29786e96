mod conflict;
mod error;
mod mutations;
mod payment;
mod pricing;
mod queries;
mod sync;
mod timeline;

pub use conflict::{check_conflict, ConflictProbe, Proposal};
pub use error::{ConflictError, ConflictKind, EngineError};
pub use mutations::{BookingChange, BookingRequest};
pub use payment::{reconcile, PaymentChange, Reconciled};
pub use pricing::price;
pub use sync::{plan_hold_change, HoldChange, HoldSyncRequest, SyncPlan};
pub use timeline::project;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::config::Config;
use crate::journal::Journal;
use crate::model::*;
use crate::notify::NotifyHub;

pub type SharedResourceState = Arc<RwLock<ResourceState>>;

// ── Group-commit journal channel ─────────────────────────

pub(super) enum JournalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Background task that owns the journal and batches appends for group commit.
/// Blocks for the first append, drains whatever else is already queued, then
/// fsyncs once and answers every sender.
async fn journal_writer_loop(mut journal: Journal, mut rx: mpsc::Receiver<JournalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            JournalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut journal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(JournalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }
        commit_batch(&mut journal, &mut batch);
        if let Some(cmd) = deferred {
            handle_non_append(&mut journal, cmd);
        }
    }
}

fn commit_batch(journal: &mut Journal, batch: &mut Vec<PendingAppend>) {
    metrics::histogram!(crate::observability::JOURNAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();

    let mut result = Ok(());
    for (event, _) in batch.iter() {
        if let Err(e) = journal.append_buffered(event) {
            result = Err(e);
            break;
        }
    }
    // Flush even after a failed append so stray bytes don't leak into the next batch.
    let flushed = journal.flush_sync();
    if result.is_ok() {
        result = flushed;
    }

    metrics::histogram!(crate::observability::JOURNAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());

    for (_, tx) in batch.drain(..) {
        let reply = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(reply);
    }
}

fn handle_non_append(journal: &mut Journal, cmd: JournalCommand) {
    match cmd {
        JournalCommand::Compact { events, response } => {
            let result = Journal::write_compact_file(journal.path(), &events)
                .and_then(|()| journal.swap_compact_file());
            let _ = response.send(result);
        }
        JournalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(journal.appends_since_compact());
        }
        JournalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// The availability engine. Each resource sits behind its own lock; every
/// mutation reads, checks and commits under that resource's write guard.
pub struct Engine {
    pub state: DashMap<Ulid, SharedResourceState>,
    pub(super) journal_tx: mpsc::Sender<JournalCommand>,
    pub notify: Arc<NotifyHub>,
    /// Reverse lookup: period (maintenance/hold/booking) id → resource id.
    pub(super) entity_to_resource: DashMap<Ulid, Ulid>,
    /// Serializes resource creation against each other and against compaction,
    /// which must not miss a resource created after its snapshot.
    pub(super) catalog: Mutex<()>,
}

/// Apply an event to one resource without locking; the caller holds the write guard.
fn apply_to_resource(rs: &mut ResourceState, event: &Event, entity_map: &DashMap<Ulid, Ulid>) {
    match event {
        Event::ResourceUpdated {
            name,
            rates,
            is_active,
            ..
        } => {
            rs.name = name.clone();
            rs.rates = *rates;
            rs.is_active = *is_active;
        }
        Event::MaintenanceScheduled { window } => {
            rs.insert_maintenance(window.clone());
            entity_map.insert(window.id, window.resource_id);
        }
        Event::MaintenanceUpdated { window } => {
            rs.remove_maintenance(window.id);
            rs.insert_maintenance(window.clone());
        }
        Event::MaintenanceCleared { id, .. } => {
            rs.remove_maintenance(*id);
            entity_map.remove(id);
        }
        Event::HoldsSynced { created, released } => {
            let rid = rs.id;
            for hold in released.iter().filter(|h| h.resource_id == rid) {
                rs.remove_hold(hold.id);
                entity_map.remove(&hold.id);
            }
            for hold in created.iter().filter(|h| h.resource_id == rid) {
                rs.insert_hold(hold.clone());
                entity_map.insert(hold.id, hold.resource_id);
            }
        }
        Event::BookingCreated { booking, released_hold } => {
            if let Some(hold_id) = released_hold {
                rs.remove_hold(*hold_id);
                entity_map.remove(hold_id);
            }
            rs.insert_booking(booking.clone());
            entity_map.insert(booking.id, booking.resource_id);
        }
        Event::BookingUpdated {
            booking,
            released_hold,
            ..
        } => {
            if let Some(hold_id) = released_hold {
                rs.remove_hold(*hold_id);
                entity_map.remove(hold_id);
            }
            rs.remove_booking(booking.id);
            rs.insert_booking(booking.clone());
        }
        Event::BookingCancelled { id, .. } => {
            rs.remove_booking(*id);
            entity_map.remove(id);
        }
        // ResourceCreated/Deleted are handled at the DashMap level, not here
        Event::ResourceCreated { .. } | Event::ResourceDeleted { .. } => {}
    }
}

impl Engine {
    pub fn new(journal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Journal::replay(&journal_path)?;
        let journal = Journal::open(&journal_path)?;
        let (journal_tx, journal_rx) = mpsc::channel(4096);
        tokio::spawn(journal_writer_loop(journal, journal_rx));

        let engine = Self {
            state: DashMap::new(),
            journal_tx,
            notify,
            entity_to_resource: DashMap::new(),
            catalog: Mutex::new(()),
        };

        // We're the sole owner of these Arcs during replay, so try_write never
        // contends. Never block here: this may run inside an async context.
        for event in &events {
            match event {
                Event::ResourceCreated {
                    id,
                    category,
                    name,
                    rates,
                    is_active,
                } => {
                    let rs = ResourceState::new(*id, *category, name.clone(), *rates, *is_active);
                    engine.state.insert(*id, Arc::new(RwLock::new(rs)));
                }
                Event::ResourceDeleted { id } => {
                    if let Some((_, rs)) = engine.state.remove(id)
                        && let Ok(guard) = rs.try_read()
                    {
                        for period_id in guard.period_ids() {
                            engine.entity_to_resource.remove(&period_id);
                        }
                    }
                }
                other => {
                    for resource_id in other.resource_ids() {
                        let Some(rs) = engine.get_resource(&resource_id) else {
                            continue;
                        };
                        if let Ok(mut guard) = rs.try_write() {
                            apply_to_resource(&mut guard, other, &engine.entity_to_resource);
                        }
                    }
                }
            }
        }

        tracing::info!(
            "replayed {} journal events into {} resources",
            events.len(),
            engine.state.len()
        );
        Ok(engine)
    }

    /// Open the engine described by `config`, creating the data directory.
    pub fn open(config: &Config) -> io::Result<Arc<Self>> {
        std::fs::create_dir_all(&config.data_dir)?;
        let notify = Arc::new(NotifyHub::new());
        Ok(Arc::new(Self::new(config.journal_path(), notify)?))
    }

    /// Write event to the journal via the background group-commit writer.
    async fn journal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::JournalError("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::JournalError("journal writer dropped response".into()))?
            .map_err(|e| EngineError::JournalError(e.to_string()))
    }

    pub fn get_resource(&self, id: &Ulid) -> Option<SharedResourceState> {
        self.state.get(id).map(|e| e.value().clone())
    }

    pub fn get_resource_for_entity(&self, entity_id: &Ulid) -> Option<Ulid> {
        self.entity_to_resource.get(entity_id).map(|e| *e.value())
    }

    /// Journal-append + apply + notify for a single-resource event.
    pub(super) async fn persist_and_apply(
        &self,
        resource_id: Ulid,
        rs: &mut ResourceState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.journal_append(event).await?;
        apply_to_resource(rs, event, &self.entity_to_resource);
        self.notify.send(resource_id, event);
        Ok(())
    }

    /// Write guard on a live resource. One deleted while we queued is `NotFound`.
    pub(super) async fn resource_write(&self, id: Ulid) -> Result<OwnedRwLockWriteGuard<ResourceState>, EngineError> {
        let rs = self.get_resource(&id).ok_or(EngineError::NotFound(id))?;
        let guard = rs.write_owned().await;
        if guard.deleted {
            return Err(EngineError::NotFound(id));
        }
        Ok(guard)
    }

    pub(super) async fn resource_read(&self, id: Ulid) -> Result<OwnedRwLockReadGuard<ResourceState>, EngineError> {
        let rs = self.get_resource(&id).ok_or(EngineError::NotFound(id))?;
        let guard = rs.read_owned().await;
        if guard.deleted {
            return Err(EngineError::NotFound(id));
        }
        Ok(guard)
    }

    /// Lookup entity → resource, acquire write lock.
    pub(super) async fn resolve_entity_write(
        &self,
        entity_id: &Ulid,
    ) -> Result<(Ulid, OwnedRwLockWriteGuard<ResourceState>), EngineError> {
        let resource_id = self
            .get_resource_for_entity(entity_id)
            .ok_or(EngineError::NotFound(*entity_id))?;
        let guard = self.resource_write(resource_id).await?;
        Ok((resource_id, guard))
    }
}
