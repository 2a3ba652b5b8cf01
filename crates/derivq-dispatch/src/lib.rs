//! Derivative dispatch for derivq.
//!
//! ```text
//! MutationBus ──▶ DerivativeHook ──▶ Dispatcher
//!                                      │
//!                     ┌────────────────┼─────────────────┬──────────────┐
//!                     ▼                ▼                 ▼              ▼
//!              ContentResolver   TemplateEngine    EventBuilder   AuthProvider
//!                                                                       │
//!                                                                       ▼
//!                                                                  Publisher
//! ```

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod hook;
pub mod resolver;
pub mod state;
pub mod template;

pub use dispatcher::{Collaborators, DispatchFailure, DispatchReport, Dispatcher};
pub use error::{BuildError, DispatchError, ResolutionError, TemplateError, TermRole};
pub use event::{CanonicalEvent, EventBuilder, EventContent};
pub use hook::{DerivativeHook, HookStats, TaskBinding};
pub use resolver::{ContentResolver, FieldMappingResolver, Resolution, SemanticTagResolver};
pub use state::DispatchState;
pub use template::{TemplateEngine, TokenContext, TokenResolver, storage_uri};
