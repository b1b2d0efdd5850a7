use std::fmt::{self, Debug, Formatter};
use std::slice;

use crate::command::{Command, CustomCommand};
use crate::component::Component;
use crate::component_data::Bundle;
use crate::entity::EntityID;
use crate::resource::Resource;
use crate::world::World;

/// A command buffer for world changes.
///
/// This is an ordered list of `Command`s which have not been applied yet. It
/// can be kept around and filled while the `World` is shared, then applied
/// once exclusive access is available again. With `CommandBuffer`s multiple
/// systems can determine changes in parallel and apply them at the end.
///
/// Commands are applied strictly in the order they were pushed.
#[derive(Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    /// Create a new, empty, command buffer.
    pub fn new() -> CommandBuffer {
        CommandBuffer {
            commands: Vec::new(),
        }
    }

    /// Create an empty command buffer with space for `capacity` commands.
    pub fn with_capacity(capacity: usize) -> CommandBuffer {
        CommandBuffer {
            commands: Vec::with_capacity(capacity),
        }
    }

    /// Merge multiple command buffers, preserving their order.
    ///
    /// If multiple command buffers reference the same component or resource,
    /// the rightmost wins once applied.
    pub fn merge(buffers: impl IntoIterator<Item=CommandBuffer>) -> CommandBuffer {
        let mut dest = CommandBuffer::new();
        for mut buffer in buffers {
            dest.append(&mut buffer);
        }
        dest
    }

    /// Move every command of `other` onto the end of this buffer.
    pub fn append(&mut self, other: &mut CommandBuffer) {
        self.commands.append(&mut other.commands);
    }

    /// Returns the number of queued commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Returns the number of commands this buffer can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.commands.capacity()
    }

    /// Iterate over the queued commands in application order.
    pub fn iter(&self) -> slice::Iter<'_, Command> {
        self.commands.iter()
    }

    /// Drop every queued command without applying it.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Release spare allocation, keeping room for at least `capacity`
    /// commands.
    pub fn shrink_to(&mut self, capacity: usize) {
        self.commands.shrink_to(capacity);
    }

    /// Queue a command.
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Queue a custom command.
    pub fn add(&mut self, command: impl CustomCommand) {
        self.push(Command::custom(command));
    }

    /// Spawn a previously reserved entity with the given components.
    pub fn spawn(&mut self, entity_id: EntityID, bundle: impl Bundle) {
        self.push(Command::spawn(entity_id, bundle));
    }

    /// Despawn an entity.
    pub fn despawn(&mut self, entity_id: EntityID) {
        self.push(Command::Despawn { entity: entity_id });
    }

    /// Set a single component on an entity.
    pub fn set_component<T: Component>(&mut self, entity_id: EntityID, component: T) {
        self.push(Command::insert_component(entity_id, component));
    }

    /// Remove a single component from an entity.
    pub fn remove_component<T: Component>(&mut self, entity_id: EntityID) {
        self.push(Command::remove_component::<T>(entity_id));
    }

    /// Insert a resource.
    pub fn insert_resource<R: Resource>(&mut self, resource: R) {
        self.push(Command::insert_resource(resource));
    }

    /// Remove a resource.
    pub fn remove_resource<R: Resource>(&mut self) {
        self.push(Command::remove_resource::<R>());
    }

    /// Apply every queued command to `world` in order, leaving the buffer
    /// empty.
    ///
    /// The buffer keeps its allocation so it can be reused.
    pub fn apply(&mut self, world: &mut World) {
        for command in self.commands.drain(..) {
            command.apply(world);
        }
    }
}

impl Debug for CommandBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.commands.iter()).finish()
    }
}

impl Extend<Command> for CommandBuffer {
    fn extend<I: IntoIterator<Item=Command>>(&mut self, iter: I) {
        self.commands.extend(iter);
    }
}

impl IntoIterator for CommandBuffer {
    type Item = Command;
    type IntoIter = std::vec::IntoIter<Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}
