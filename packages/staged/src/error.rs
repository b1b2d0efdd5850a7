//! Error types.

use thiserror::Error;

use crate::entity::EntityID;
use crate::system::SystemToken;

/// Errors reported by direct `World` access.
///
/// When one of these comes up while a command buffer is being applied, it is
/// logged and the offending command is discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// The ID was never allocated.
    #[error("{0} does not exist")]
    NoSuchEntity(EntityID),

    /// The ID is reserved but its spawn has not been applied.
    #[error("{0} is reserved but has not been spawned")]
    EntityNotSpawned(EntityID),

    /// A spawn targeted an entity which already has storage.
    #[error("{0} has already been spawned")]
    EntityAlreadySpawned(EntityID),

    /// The entity has been despawned.
    #[error("{0} has been despawned")]
    EntityDespawned(EntityID),

    /// The entity exists but lacks the requested component.
    #[error("{entity} has no `{component}` component")]
    MissingComponent {
        /// The entity which was read.
        entity: EntityID,
        /// The name of the missing component type.
        component: &'static str,
    },

    /// The requested resource is not in the world.
    #[error("resource `{0}` does not exist")]
    MissingResource(&'static str),
}

/// Errors raised while building a `Schedule`.
///
/// These are all caught before any system runs.
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// A registration referred to a system which is not in the schedule.
    #[error("system {0:?} is not part of this schedule")]
    UnknownSystem(SystemToken),

    /// The `before` and `after` constraints of a system cannot both hold.
    #[error("ordering constraints of system `{system}` cannot be satisfied")]
    UnsatisfiableOrdering {
        /// The system being inserted.
        system: String,
    },

    /// An exclusive system would have to run alongside another system.
    #[error("system `{system}` cannot run concurrently with `{other}`: exclusive access serializes them")]
    ExclusiveConflict {
        /// The system being inserted.
        system: String,
        /// The system it asked to run alongside.
        other: String,
    },

    /// Two deferred systems asked to share a stage while deferred systems
    /// are configured to conflict.
    #[error("system `{system}` cannot run concurrently with `{other}`: deferred systems are serialized")]
    DeferredConflict {
        /// The system being inserted.
        system: String,
        /// The system it asked to run alongside.
        other: String,
    },

    /// The schedule's thread pool could not be created.
    #[error("failed to build the schedule thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration is not valid TOML, or has the wrong shape.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but contains an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
