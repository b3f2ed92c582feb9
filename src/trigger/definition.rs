use super::UnitOfWork;
use crate::core::Result;
use crate::object::ObjectInstance;
use std::fmt;
use std::sync::Arc;

/// Which propagation wave runs a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    /// Computed values, executed in the first wave
    Internal,
    /// Caller side effects, executed in the second wave after the flush
    Custom,
}

/// Reactive computation run against the most recent version of an object.
pub trait TriggerAction: Send + Sync {
    fn execute(&self, instance: &mut ObjectInstance, uow: &mut UnitOfWork<'_>) -> Result<()>;
}

impl<F> TriggerAction for F
where
    F: Fn(&mut ObjectInstance, &mut UnitOfWork<'_>) -> Result<()> + Send + Sync,
{
    fn execute(&self, instance: &mut ObjectInstance, uow: &mut UnitOfWork<'_>) -> Result<()> {
        self(instance, uow)
    }
}

/// Named trigger attached to an object definition.
#[derive(Clone)]
pub struct TriggerDefinition {
    name: String,
    kind: TriggerKind,
    action: Arc<dyn TriggerAction>,
}

impl TriggerDefinition {
    pub fn internal<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut ObjectInstance, &mut UnitOfWork<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self::from_action(name, TriggerKind::Internal, Arc::new(action))
    }

    pub fn custom<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut ObjectInstance, &mut UnitOfWork<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self::from_action(name, TriggerKind::Custom, Arc::new(action))
    }

    pub fn from_action(name: impl Into<String>, kind: TriggerKind, action: Arc<dyn TriggerAction>) -> Self {
        Self {
            name: name.into(),
            kind,
            action,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TriggerKind {
        self.kind
    }

    pub fn action(&self) -> &Arc<dyn TriggerAction> {
        &self.action
    }
}

impl fmt::Debug for TriggerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
