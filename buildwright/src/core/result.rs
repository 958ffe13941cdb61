//! The uniform stage result wrapper and the explicit "unavailable" marker.

use serde::{Deserialize, Serialize};

/// What every phase hands back to the orchestrator.
///
/// Errors and panics never cross the phase boundary; they are folded into
/// `Failed` with a human-readable reason.
#[derive(Debug, Clone, PartialEq)]
pub enum StageResult<T> {
    /// The phase produced its payload.
    Ok(T),
    /// The phase failed; carries the reason.
    Failed(String),
}

impl<T> StageResult<T> {
    /// Returns true if the phase produced a payload.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Returns true if the phase failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns the failure reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Failed(reason) => Some(reason),
        }
    }

    /// Converts into an option, discarding the reason.
    #[must_use]
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(value) => Some(value),
            Self::Failed(_) => None,
        }
    }

    /// Borrows the payload.
    #[must_use]
    pub fn as_ref(&self) -> StageResult<&T> {
        match self {
            Self::Ok(value) => StageResult::Ok(value),
            Self::Failed(reason) => StageResult::Failed(reason.clone()),
        }
    }

    /// Converts into the marker handed to downstream phases.
    #[must_use]
    pub fn into_availability(self) -> Availability<T> {
        match self {
            Self::Ok(value) => Availability::Available(value),
            Self::Failed(reason) => Availability::Unavailable { reason },
        }
    }
}

/// A downstream input that may be missing because its producer failed.
///
/// Stale or partial data is never substituted; consumers see `Unavailable`
/// together with the upstream reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability<T> {
    /// The upstream phase produced the value.
    Available(T),
    /// The upstream phase failed.
    Unavailable {
        /// Why the value is missing.
        reason: String,
    },
}

impl<T> Availability<T> {
    /// Returns the value if available.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Available(value) => Some(value),
            Self::Unavailable { .. } => None,
        }
    }

    /// Returns true if the value is available.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}
