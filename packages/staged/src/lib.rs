//! Deferred world mutation for a parallel entity component system.
//!
//! Systems which run in parallel only get shared access to the `World`. They
//! record their changes into `CommandBuffer`s through a `Commands` handle,
//! and a `Schedule` applies those buffers in a fixed order at the end of each
//! stage. Systems which need the whole world run exclusively, between stages.

pub use command::{Command, CustomCommand};
pub use command_buffer::CommandBuffer;
pub use commands::{Commands, EntityCommands};
pub use component::{
    Component,
    ComponentTypeID,
};
pub use component_data::{Bundle, ComponentDataVec, ComponentValue};
pub use config::{Config, ScheduleConfig, UniverseConfig};
pub use entity::{EntityID, EntityState};
pub use error::{ConfigError, ScheduleError, WorldError};
pub use event::{EventCursor, Events};
pub use resource::{Resource, Resources};
pub use system::{
    ExclusiveSystem,
    Schedule,
    System,
    SystemRegistration,
    SystemToken,
};
pub use universe::Universe;
pub use world::World;

pub mod component;
pub mod component_data;
mod entity;
pub mod resource;

pub mod universe;
pub mod command;
mod command_buffer;
mod commands;

pub mod world;
pub mod system;
pub mod event;
pub mod config;
pub mod error;
