//! Deferred world mutations.
//!
//! A `Command` describes one change to a `World`. Systems record commands
//! into a `CommandBuffer` while they run and the commands are applied later,
//! in order, once the `World` is exclusively available again.
//!
//! The built-in variants cover structural changes. Anything else can be
//! expressed as a `CustomCommand`, which includes every
//! `FnOnce(&mut World)` closure.

use std::any::type_name;
use std::fmt::{self, Debug, Formatter};

use tracing::{debug, warn};

use crate::component::{Component, ComponentTypeID};
use crate::component_data::{Bundle, ComponentDataVec, ComponentValue};
use crate::entity::EntityID;
use crate::resource::{Resource, ResourceTypeID, ResourceValue};
use crate::world::World;

/// A user-defined command.
///
/// `apply` has no way to report failure. A command which can fail should log
/// the problem itself, or panic to abort the run.
pub trait CustomCommand: Send + 'static {
    /// Apply this command to the world.
    fn apply(self, world: &mut World);
}

impl<F> CustomCommand for F
    where F: FnOnce(&mut World) + Send + 'static
{
    fn apply(self, world: &mut World) {
        self(world)
    }
}

trait BoxedCommand: Send {
    fn apply_boxed(self: Box<Self>, world: &mut World);
    fn name(&self) -> &'static str;
}

impl<C: CustomCommand> BoxedCommand for C {
    fn apply_boxed(self: Box<Self>, world: &mut World) {
        (*self).apply(world)
    }

    fn name(&self) -> &'static str {
        type_name::<C>()
    }
}

/// A boxed `CustomCommand`.
pub struct CustomAction(Box<dyn BoxedCommand>);

impl CustomAction {
    pub fn new(command: impl CustomCommand) -> CustomAction {
        CustomAction(Box::new(command))
    }

    /// The type name of the wrapped command.
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    pub fn apply(self, world: &mut World) {
        self.0.apply_boxed(world)
    }
}

impl Debug for CustomAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "CustomAction({})", self.name())
    }
}

/// A single deferred mutation.
#[derive(Debug)]
pub enum Command {
    /// Give a reserved entity its storage and initial components.
    Spawn {
        entity: EntityID,
        components: ComponentDataVec,
    },

    /// Remove an entity and all of its components.
    Despawn {
        entity: EntityID,
    },

    /// Add a component to an entity, replacing any existing value of that type.
    InsertComponent {
        entity: EntityID,
        component: ComponentValue,
    },

    /// Remove a component from an entity.
    RemoveComponent {
        entity: EntityID,
        component_type: ComponentTypeID,
    },

    /// Insert a resource, replacing any existing value of that type.
    InsertResource {
        resource: ResourceValue,
    },

    /// Remove a resource.
    RemoveResource {
        resource_type: ResourceTypeID,
    },

    /// Run arbitrary code against the world.
    Custom(CustomAction),
}

impl Command {
    pub fn spawn(entity: EntityID, bundle: impl Bundle) -> Command {
        let mut components = ComponentDataVec::new();
        bundle.into_component_data(&mut components);
        Command::Spawn { entity, components }
    }

    pub fn insert_component<T: Component>(entity: EntityID, component: T) -> Command {
        Command::InsertComponent {
            entity,
            component: ComponentValue::new(component),
        }
    }

    pub fn remove_component<T: Component>(entity: EntityID) -> Command {
        Command::RemoveComponent {
            entity,
            component_type: T::component_type(),
        }
    }

    pub fn insert_resource<R: Resource>(resource: R) -> Command {
        Command::InsertResource {
            resource: ResourceValue::new(resource),
        }
    }

    pub fn remove_resource<R: Resource>() -> Command {
        Command::RemoveResource {
            resource_type: ResourceTypeID::of::<R>(),
        }
    }

    pub fn custom(command: impl CustomCommand) -> Command {
        Command::Custom(CustomAction::new(command))
    }

    /// Apply this command to the world.
    ///
    /// Commands which target a missing entity are logged and dropped.
    pub fn apply(self, world: &mut World) {
        match self {
            Command::Spawn { entity, components } => {
                if let Err(err) = world.try_spawn_at(entity, components) {
                    warn!(%entity, %err, "discarding spawn command");
                }
            }
            Command::Despawn { entity } => {
                if let Err(err) = world.try_despawn(entity) {
                    warn!(%entity, %err, "discarding despawn command");
                }
            }
            Command::InsertComponent { entity, component } => {
                let component_type = component.type_id();
                if let Err(err) = world.insert_component_value(entity, component) {
                    warn!(%entity, component = component_type.name(), %err,
                        "discarding component insert");
                }
            }
            Command::RemoveComponent { entity, component_type } => {
                if let Err(err) = world.remove_component_by_id(entity, component_type) {
                    warn!(%entity, component = component_type.name(), %err,
                        "discarding component removal");
                }
            }
            Command::InsertResource { resource } => {
                let resource_type = resource.type_id();
                if world.resources_mut().insert_value(resource) {
                    debug!(resource = resource_type.name(), "resource replaced");
                }
            }
            Command::RemoveResource { resource_type } => {
                if !world.resources_mut().remove_by_id(resource_type) {
                    debug!(resource = resource_type.name(), "removed resource was not present");
                }
            }
            Command::Custom(action) => action.apply(world),
        }
    }
}
