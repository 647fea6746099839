//! Cross-cutting flags carried by queries and commands.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How query results relate to the unit of work's change tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// Results are attached to the change tracker; rows already tracked
    /// resolve to the tracked instance.
    Tracked,
    /// Detached, read-only results.
    NoTracking,
    /// Detached results deduplicated by identity within one result set.
    NoTrackingWithIdentityResolution,
    /// Whatever the context was configured with.
    #[default]
    Default,
}

impl TrackingMode {
    /// Resolves `Default` against the context's configured mode.
    pub fn resolve(self, context_default: TrackingMode) -> TrackingMode {
        match self {
            TrackingMode::Default => match context_default {
                TrackingMode::Default => TrackingMode::Tracked,
                other => other,
            },
            other => other,
        }
    }
}

impl FromStr for TrackingMode {
    type Err = String;

    /// Accepts hyphen or underscore separators, case-insensitive.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().replace('_', "-").as_str() {
            "tracked" => Ok(Self::Tracked),
            "no-tracking" => Ok(Self::NoTracking),
            "no-tracking-with-identity-resolution" => Ok(Self::NoTrackingWithIdentityResolution),
            "default" => Ok(Self::Default),
            _ => Err(format!("Unknown tracking mode: {value}")),
        }
    }
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tracked => write!(f, "tracked"),
            Self::NoTracking => write!(f, "no-tracking"),
            Self::NoTrackingWithIdentityResolution => {
                write!(f, "no-tracking-with-identity-resolution")
            }
            Self::Default => write!(f, "default"),
        }
    }
}

/// Options for read operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    pub tracking: TrackingMode,
}

impl QueryOptions {
    pub fn tracked() -> Self {
        Self {
            tracking: TrackingMode::Tracked,
        }
    }

    pub fn no_tracking() -> Self {
        Self {
            tracking: TrackingMode::NoTracking,
        }
    }

    pub fn with_tracking(mut self, tracking: TrackingMode) -> Self {
        self.tracking = tracking;
        self
    }
}

/// Options for write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandOptions {
    /// Stage the change without saving; the caller saves the unit of work later.
    pub skip_saving_changes: bool,
}

impl CommandOptions {
    /// Options that defer the save to the caller.
    pub fn deferred() -> Self {
        Self {
            skip_saving_changes: true,
        }
    }
}
