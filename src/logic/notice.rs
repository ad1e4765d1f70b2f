//! Lifecycle Notices
//!
//! Notifications delivered into the logic tree from outside the tick:
//! application run-state changes and resource package (un)loading.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Application run state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AppRunState {
    /// Not started yet
    #[default]
    Undefined,
    /// Initializing
    Initializing,
    /// Running in the foreground
    Running,
    /// Suspended (background)
    Paused,
    /// Shutting down
    Terminating,
}

impl fmt::Display for AppRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppRunState::Undefined => "undefined",
            AppRunState::Initializing => "initializing",
            AppRunState::Running => "running",
            AppRunState::Paused => "paused",
            AppRunState::Terminating => "terminating",
        };
        f.write_str(name)
    }
}

/// A resource package, as reported by the loader.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
    /// Package name
    pub name: String,
}

impl Package {
    /// Create a package descriptor.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Package lifecycle stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageEvent {
    /// Loading is about to start
    WillBeLoaded,
    /// Loading finished
    WasLoaded,
    /// Loading failed
    FailedLoading,
    /// Unloading is about to start
    WillBeUnloaded,
    /// Unloading finished
    WasUnloaded,
    /// Unloading failed
    FailedUnloading,
}

/// A package notification queued for delivery into the tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageNotice {
    /// What happened
    pub event: PackageEvent,
    /// To which package
    pub package: Package,
}

impl PackageNotice {
    /// Create a notice.
    pub fn new(event: PackageEvent, package: Package) -> Self {
        Self { event, package }
    }
}
