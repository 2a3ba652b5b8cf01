//! Entity mutation events and the trigger source hooks subscribe to.
//!
//! # Architecture
//!
//! ```text
//!   repository save ──▶ MutationBus::emit(event)
//!                              │  (inline, registration order)
//!              ┌───────────────┼───────────────┐
//!              ▼               ▼               ▼
//!        ┌──────────┐    ┌──────────┐    ┌──────────┐
//!        │  Hook 1  │    │  Hook 2  │    │  Hook 3  │
//!        └──────────┘    └──────────┘    └──────────┘
//! ```
//!
//! - [`types`]: `MutationEvent` and `MutationKind`
//! - [`hooks`]: the `MutationHook` trait and `HookError`
//! - [`bus`]: the `TriggerSource` trait and the inline `MutationBus`

pub mod bus;
pub mod hooks;
pub mod types;

pub use bus::{EmitSummary, MutationBus, TriggerSource};
pub use hooks::{HookError, MutationHook};
pub use types::{MutationEvent, MutationKind};
