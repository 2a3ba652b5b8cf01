//! Dispatch lifecycle.
//!
//! ```text
//! Idle -> Resolving -> Building -> Authenticating -> Publishing -> Done
//!            |            |              |               |
//!            +------------+--------------+---------------+---> Aborted
//! ```
//!
//! `Done` and `Aborted` are terminal. There is no retry edge.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum DispatchState {
    Idle,
    Resolving,
    Building,
    Authenticating,
    Publishing,
    Done,
    Aborted(String),
}

impl DispatchState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Building => "building",
            Self::Authenticating => "authenticating",
            Self::Publishing => "publishing",
            Self::Done => "done",
            Self::Aborted(_) => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted(_))
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(&self, next: &DispatchState) -> bool {
        use DispatchState::*;
        match (self, next) {
            (Done | Aborted(_), _) => false,
            (_, Aborted(_)) => true,
            (Idle, Resolving)
            | (Resolving, Building)
            | (Building, Authenticating)
            | (Authenticating, Publishing)
            | (Publishing, Done) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DispatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aborted(reason) => write!(f, "aborted ({reason})"),
            other => f.write_str(other.name()),
        }
    }
}
