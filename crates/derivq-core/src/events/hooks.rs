//! Hook traits for entity mutation events.
//!
//! Hooks run inline, in the emitter's call sequence. A hook's error is
//! logged by the trigger source and never reaches the code that saved the
//! entity.

use async_trait::async_trait;

use super::types::{MutationEvent, MutationKind};

/// A hook failed to handle an event.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Hook execution failed: {0}")]
    Execution(String),
}

impl HookError {
    pub fn execution(msg: impl Into<String>) -> Self {
        HookError::Execution(msg.into())
    }
}

/// Trait for entity mutation hooks.
///
/// # Example
///
/// ```ignore
/// struct AuditHook;
///
/// #[async_trait]
/// impl MutationHook for AuditHook {
///     fn name(&self) -> &str { "audit" }
///     fn entity_types(&self) -> &[&str] { &["node"] }
///
///     async fn handle(&self, event: &MutationEvent) -> Result<(), HookError> {
///         tracing::info!(entity = %event.entity.to_ref(), "saved");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait MutationHook: Send + Sync {
    /// Unique name for this hook (for logging).
    fn name(&self) -> &str;

    /// Entity types this hook is interested in.
    ///
    /// Return an empty slice to match all entity types.
    fn entity_types(&self) -> &[&str] {
        &[]
    }

    /// Mutation kinds this hook handles.
    ///
    /// Return an empty slice to match all kinds.
    fn kinds(&self) -> &[MutationKind] {
        &[]
    }

    /// Handle a mutation event.
    async fn handle(&self, event: &MutationEvent) -> Result<(), HookError>;

    /// Whether `event` passes the type and kind filters.
    fn matches(&self, event: &MutationEvent) -> bool {
        let types = self.entity_types();
        if !types.is_empty() && !types.contains(&event.entity.entity_type.as_str()) {
            return false;
        }

        let kinds = self.kinds();
        if !kinds.is_empty() && !kinds.contains(&event.kind) {
            return false;
        }

        true
    }
}
