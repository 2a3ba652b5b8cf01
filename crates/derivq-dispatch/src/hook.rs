//! Mutation hook that turns entity saves into derivative dispatches.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use derivq_config::{DerivativeTaskConfig, TaskDefinition, TriggerFilter};
use derivq_core::events::{HookError, MutationEvent, MutationHook};
use tracing::debug;

use crate::dispatcher::Dispatcher;

/// A task and the mutations that fire it.
#[derive(Debug, Clone)]
pub struct TaskBinding {
    pub config: DerivativeTaskConfig,
    pub trigger: TriggerFilter,
}

impl From<TaskDefinition> for TaskBinding {
    fn from(definition: TaskDefinition) -> Self {
        Self {
            config: definition.config,
            trigger: definition.trigger,
        }
    }
}

/// Counters since the hook was created.
#[derive(Debug, Default)]
pub struct HookStats {
    dispatched: AtomicU64,
    aborted: AtomicU64,
}

impl HookStats {
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn aborted(&self) -> u64 {
        self.aborted.load(Ordering::Relaxed)
    }
}

/// Runs every matching binding through the [`Dispatcher`], in binding order.
///
/// Dispatch failures are logged by the dispatcher and counted here; they are
/// never returned to the trigger source, so a broken broker cannot fail an
/// entity save.
pub struct DerivativeHook {
    dispatcher: Arc<Dispatcher>,
    bindings: Vec<TaskBinding>,
    stats: HookStats,
}

impl DerivativeHook {
    pub fn new(dispatcher: Arc<Dispatcher>, bindings: Vec<TaskBinding>) -> Self {
        Self {
            dispatcher,
            bindings,
            stats: HookStats::default(),
        }
    }

    pub fn bindings(&self) -> &[TaskBinding] {
        &self.bindings
    }

    pub fn stats(&self) -> &HookStats {
        &self.stats
    }
}

#[async_trait]
impl MutationHook for DerivativeHook {
    fn name(&self) -> &str {
        "derivative_dispatch"
    }

    fn matches(&self, event: &MutationEvent) -> bool {
        self.bindings.iter().any(|b| b.trigger.matches(event))
    }

    async fn handle(&self, event: &MutationEvent) -> Result<(), HookError> {
        for binding in self.bindings.iter().filter(|b| b.trigger.matches(event)) {
            debug!(
                task = %binding.config.name,
                entity = %event.entity.to_ref(),
                kind = %event.kind,
                "Binding matched mutation"
            );
            match self.dispatcher.dispatch(&event.entity, &binding.config).await {
                Ok(_) => {
                    self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    self.stats.aborted.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        Ok(())
    }
}
