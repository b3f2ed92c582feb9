use super::TriggerKind;
use crate::config::EngineConfig;
use crate::core::{EngineError, Result, Row};
use crate::object::{ObjectId, ObjectInstance};
use crate::storage::StorageEngine;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{Level, event, info_span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Collecting,
    InternalWave,
    CustomWave,
}

#[derive(Debug, Clone)]
struct PendingTrigger {
    object: String,
    id: ObjectId,
    trigger: usize,
    kind: TriggerKind,
    snapshot: ObjectInstance,
    executed: bool,
}

impl PendingTrigger {
    fn label(&self) -> String {
        trigger_label(&self.snapshot, self.trigger)
    }
}

fn trigger_label(instance: &ObjectInstance, trigger: usize) -> String {
    let definition = instance.definition();
    let name = definition
        .triggers()
        .get(trigger)
        .map(|t| t.name())
        .unwrap_or("?");
    format!("{}.{}", definition.name(), name)
}

/// What one propagation did, as `object.trigger` labels in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerReport {
    pub internal_executed: Vec<String>,
    pub custom_executed: Vec<String>,
    /// Objects written by the flush between the waves
    pub flushed: usize,
    /// Internal triggers registered during the custom wave, never run
    pub dropped: Vec<String>,
}

impl TriggerReport {
    pub fn executions(&self) -> usize {
        self.internal_executed.len() + self.custom_executed.len()
    }
}

/// Scope of one logical mutation: the pending trigger queue, the buffer of
/// latest object versions and the storage they are flushed to.
///
/// Nothing outlives the unit of work; [`UnitOfWork::run`] creates a fresh
/// one and drops it when the call returns.
pub struct UnitOfWork<'a> {
    storage: &'a mut dyn StorageEngine,
    config: &'a EngineConfig,
    queue: Vec<PendingTrigger>,
    buffer: IndexMap<ObjectId, ObjectInstance>,
    phase: Phase,
    executions: usize,
    report: TriggerReport,
}

impl<'a> UnitOfWork<'a> {
    pub fn new(storage: &'a mut dyn StorageEngine, config: &'a EngineConfig) -> Self {
        Self {
            storage,
            config,
            queue: Vec::new(),
            buffer: IndexMap::new(),
            phase: Phase::Collecting,
            executions: 0,
            report: TriggerReport::default(),
        }
    }

    /// Runs `work` in a fresh unit of work, then propagates its triggers.
    ///
    /// Any error aborts the unit of work; what storage already received
    /// stays written.
    pub fn run<T>(
        storage: &'a mut dyn StorageEngine,
        config: &'a EngineConfig,
        work: impl FnOnce(&mut UnitOfWork<'a>) -> Result<T>,
    ) -> Result<(T, TriggerReport)> {
        let span = info_span!("unit_of_work");
        let _enter = span.enter();

        let mut uow = UnitOfWork::new(storage, config);
        let value = work(&mut uow)?;
        let report = uow.propagate()?;
        Ok((value, report))
    }

    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    pub fn storage(&self) -> &dyn StorageEngine {
        &*self.storage
    }

    pub fn storage_mut(&mut self) -> &mut dyn StorageEngine {
        &mut *self.storage
    }

    /// Most recent in-memory version of an object seen by this unit of work.
    pub fn current(&self, id: &ObjectId) -> Option<&ObjectInstance> {
        self.buffer.get(id)
    }

    /// Triggers still waiting, as `object.trigger` labels with their snapshot.
    pub fn pending(&self) -> Vec<(String, &ObjectInstance)> {
        self.queue
            .iter()
            .filter(|p| !p.executed)
            .map(|p| (p.label(), &p.snapshot))
            .collect()
    }

    // ========================================
    // Registration
    // ========================================

    /// Queues `trigger` of the instance's definition against this version
    /// of the instance.
    ///
    /// A pending entry for the same object and trigger is replaced in place
    /// with the newer snapshot, keeping its queue position.
    pub(crate) fn register(&mut self, instance: &ObjectInstance, trigger: usize) {
        self.buffer.insert(instance.id(), instance.clone());

        let definition = Arc::clone(instance.definition());
        let Some(kind) = definition.triggers().get(trigger).map(|t| t.kind()) else {
            return;
        };

        if self.phase == Phase::CustomWave && kind == TriggerKind::Internal {
            let label = trigger_label(instance, trigger);
            // The custom wave never re-enters the internal one.
            event!(Level::WARN, trigger = %label, "internal trigger registered during custom wave dropped");
            self.report.dropped.push(label);
            return;
        }

        let pending = self.queue.iter_mut().find(|p| {
            !p.executed && p.id == instance.id() && p.trigger == trigger && p.object == definition.name()
        });
        match pending {
            Some(pending) => pending.snapshot = instance.clone(),
            None => self.queue.push(PendingTrigger {
                object: definition.name().to_string(),
                id: instance.id(),
                trigger,
                kind,
                snapshot: instance.clone(),
                executed: false,
            }),
        }
    }

    fn refresh(&mut self, instance: &ObjectInstance) {
        if let Some(buffered) = self.buffer.get_mut(&instance.id()) {
            *buffered = instance.clone();
        }
    }

    // ========================================
    // Persistence
    // ========================================

    fn prepare_insert(instance: &mut ObjectInstance) -> Result<Row> {
        if instance.is_persisted() {
            return Err(EngineError::Storage(format!(
                "Object {} of '{}' is already persisted",
                instance.id(),
                instance.definition().name()
            )));
        }
        instance.apply_insert_hooks();
        instance.check_mandatory()?;
        instance.check_constraints()?;
        Ok(instance.to_row())
    }

    fn prepare_update(instance: &ObjectInstance) -> Result<Row> {
        if !instance.is_persisted() {
            return Err(EngineError::ObjectNotFound(format!(
                "{} {}",
                instance.definition().name(),
                instance.id()
            )));
        }
        instance.check_mandatory()?;
        instance.check_constraints()?;
        Ok(instance.to_row())
    }

    pub fn insert(&mut self, instance: &mut ObjectInstance) -> Result<()> {
        let row = Self::prepare_insert(instance)?;
        self.storage.insert_row(instance.definition().name(), row)?;
        instance.mark_persisted();
        self.refresh(instance);
        event!(Level::DEBUG, object = %instance.definition().name(), id = %instance.id(), "object inserted");
        Ok(())
    }

    pub fn update(&mut self, instance: &ObjectInstance) -> Result<()> {
        let row = Self::prepare_update(instance)?;
        self.storage
            .update_row(instance.definition().name(), &instance.id().to_string(), row)?;
        self.refresh(instance);
        event!(Level::DEBUG, object = %instance.definition().name(), id = %instance.id(), "object updated");
        Ok(())
    }

    /// Deletes the object and forgets its buffered version and pending triggers.
    pub fn delete(&mut self, instance: &ObjectInstance) -> Result<()> {
        self.storage
            .delete_row(instance.definition().name(), &instance.id().to_string())?;
        self.forget(&instance.id());
        event!(Level::DEBUG, object = %instance.definition().name(), id = %instance.id(), "object deleted");
        Ok(())
    }

    fn forget(&mut self, id: &ObjectId) {
        self.buffer.shift_remove(id);
        // Retired in place: a wave may be draining this queue
        for pending in self.queue.iter_mut().filter(|p| p.id == *id) {
            pending.executed = true;
        }
    }

    /// Inserts several objects, one storage batch per table.
    ///
    /// Every object is validated before anything is written.
    pub fn insert_batch(&mut self, instances: &mut [ObjectInstance]) -> Result<()> {
        let mut batches: IndexMap<String, Vec<Row>> = IndexMap::new();
        for instance in instances.iter_mut() {
            let row = Self::prepare_insert(instance)?;
            batches
                .entry(instance.definition().name().to_string())
                .or_default()
                .push(row);
        }
        for (table, rows) in batches {
            self.storage.insert_rows(&table, rows)?;
        }
        for instance in instances.iter_mut() {
            instance.mark_persisted();
            self.refresh(instance);
        }
        Ok(())
    }

    pub fn update_batch(&mut self, instances: &[ObjectInstance]) -> Result<()> {
        let mut batches: IndexMap<String, Vec<(String, Row)>> = IndexMap::new();
        for instance in instances {
            let row = Self::prepare_update(instance)?;
            batches
                .entry(instance.definition().name().to_string())
                .or_default()
                .push((instance.id().to_string(), row));
        }
        for (table, rows) in batches {
            self.storage.update_rows(&table, rows)?;
        }
        for instance in instances {
            self.refresh(instance);
        }
        Ok(())
    }

    pub fn delete_batch(&mut self, instances: &[ObjectInstance]) -> Result<()> {
        let mut batches: IndexMap<String, Vec<String>> = IndexMap::new();
        for instance in instances {
            batches
                .entry(instance.definition().name().to_string())
                .or_default()
                .push(instance.id().to_string());
        }
        for (table, ids) in batches {
            self.storage.delete_rows(&table, &ids)?;
        }
        for instance in instances {
            self.forget(&instance.id());
        }
        Ok(())
    }

    // ========================================
    // Propagation
    // ========================================

    /// Drains the queue: internal wave, one flush, custom wave.
    pub fn propagate(&mut self) -> Result<TriggerReport> {
        self.phase = Phase::InternalWave;
        {
            let span = info_span!("trigger.wave", wave = 1);
            let _enter = span.enter();
            self.drain(TriggerKind::Internal)?;
        }

        self.flush()?;

        self.phase = Phase::CustomWave;
        {
            let span = info_span!("trigger.wave", wave = 2);
            let _enter = span.enter();
            self.drain(TriggerKind::Custom)?;
        }

        self.phase = Phase::Collecting;
        self.queue.clear();
        self.buffer.clear();
        self.executions = 0;
        let report = std::mem::take(&mut self.report);
        event!(
            Level::DEBUG,
            internal = report.internal_executed.len(),
            custom = report.custom_executed.len(),
            dropped = report.dropped.len(),
            "trigger propagation complete"
        );
        Ok(report)
    }

    fn drain(&mut self, kind: TriggerKind) -> Result<()> {
        let mut cursor = 0;
        while cursor < self.queue.len() {
            let entry = &self.queue[cursor];
            if entry.executed || entry.kind != kind {
                cursor += 1;
                continue;
            }
            let (id, trigger, label) = (entry.id, entry.trigger, entry.label());

            if self.executions >= self.config.trigger_ceiling {
                let limit = self.config.trigger_ceiling;
                event!(Level::ERROR, limit, trigger = %label, "trigger breaker tripped");
                return Err(EngineError::Breaker { limit });
            }
            self.executions += 1;
            self.queue[cursor].executed = true;

            let mut target = match self.buffer.get(&id) {
                Some(latest) => latest.clone(),
                None => self.queue[cursor].snapshot.clone(),
            };
            let definition = Arc::clone(target.definition());
            let action = Arc::clone(definition.triggers()[trigger].action());

            if let Err(err) = action.execute(&mut target, self) {
                event!(Level::ERROR, trigger = %label, error = %err, "trigger failed");
                return Err(err);
            }
            event!(Level::DEBUG, trigger = %label, "trigger executed");

            match kind {
                TriggerKind::Internal => self.report.internal_executed.push(label),
                TriggerKind::Custom => self.report.custom_executed.push(label),
            }
            // An action may delete its own object; nothing is left to flush then
            if let Some(latest) = self.buffer.get_mut(&id) {
                *latest = target;
            }
            cursor += 1;
        }
        Ok(())
    }

    /// Writes every buffered persisted object once.
    fn flush(&mut self) -> Result<()> {
        let mut batches: IndexMap<String, Vec<(String, Row)>> = IndexMap::new();
        for instance in self.buffer.values().filter(|i| i.is_persisted()) {
            batches
                .entry(instance.definition().name().to_string())
                .or_default()
                .push((instance.id().to_string(), instance.to_row()));
        }

        let mut flushed = 0;
        for (table, rows) in batches {
            flushed += rows.len();
            self.storage.update_rows(&table, rows)?;
        }
        self.report.flushed = flushed;
        event!(Level::DEBUG, flushed, "buffered objects flushed");
        Ok(())
    }
}
