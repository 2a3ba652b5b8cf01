//! Inline mutation bus.
//!
//! Unlike a broadcast channel, the bus runs every matching hook in the
//! emitter's own call sequence: `emit` returns only after all hooks reached a
//! terminal state. Hook failures and panics are contained and logged.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use super::hooks::MutationHook;
use super::types::MutationEvent;

/// A source of entity mutation events that hooks subscribe to.
#[async_trait]
pub trait TriggerSource: Send + Sync {
    /// Subscribe a hook to all future mutation events.
    async fn subscribe(&self, hook: Arc<dyn MutationHook>);
}

/// Summary of one `emit` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitSummary {
    pub matched: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Trigger source that runs hooks inline, in registration order.
pub struct MutationBus {
    hooks: RwLock<Vec<Arc<dyn MutationHook>>>,
}

impl MutationBus {
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(Vec::new()),
        }
    }

    /// Create a new bus wrapped in an Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub async fn hook_count(&self) -> usize {
        self.hooks.read().await.len()
    }

    async fn matching_hooks(&self, event: &MutationEvent) -> Vec<Arc<dyn MutationHook>> {
        let hooks = self.hooks.read().await;
        hooks.iter().filter(|h| h.matches(event)).cloned().collect()
    }

    /// Run every matching hook against the event.
    ///
    /// Never fails: the entity mutation that produced the event has already
    /// happened and must not be affected by what hooks do with it.
    pub async fn emit(&self, event: &MutationEvent) -> EmitSummary {
        let hooks = self.matching_hooks(event).await;
        let mut summary = EmitSummary {
            matched: hooks.len(),
            ..Default::default()
        };

        if hooks.is_empty() {
            debug!(
                entity = %event.entity.to_ref(),
                kind = %event.kind,
                "No hooks matched mutation"
            );
            return summary;
        }

        for hook in hooks {
            let hook_name = hook.name().to_string();
            let result = AssertUnwindSafe(hook.handle(event)).catch_unwind().await;

            match result {
                Ok(Ok(())) => {
                    summary.succeeded += 1;
                    debug!(hook = %hook_name, "Hook executed successfully");
                }
                Ok(Err(e)) => {
                    summary.failed += 1;
                    warn!(
                        hook = %hook_name,
                        entity = %event.entity.to_ref(),
                        error = %e,
                        "Hook execution failed"
                    );
                }
                Err(panic) => {
                    summary.failed += 1;
                    let panic_msg = if let Some(s) = panic.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    error!(hook = %hook_name, panic = %panic_msg, "Hook panicked");
                }
            }
        }

        summary
    }
}

#[async_trait]
impl TriggerSource for MutationBus {
    async fn subscribe(&self, hook: Arc<dyn MutationHook>) {
        let name = hook.name().to_string();
        self.hooks.write().await.push(hook);
        debug!(hook = %name, "Registered mutation hook");
    }
}

impl Default for MutationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MutationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationBus").finish_non_exhaustive()
    }
}
