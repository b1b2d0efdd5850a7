//! The handle deferred systems use to change the world.

use crate::command::{Command, CustomCommand};
use crate::command_buffer::CommandBuffer;
use crate::component::Component;
use crate::component_data::Bundle;
use crate::entity::EntityID;
use crate::event::Events;
use crate::resource::Resource;
use crate::universe::Universe;
use crate::world::World;

/// Queues commands for a single system run.
///
/// Nothing recorded here is visible in the `World` until the buffer behind it
/// is flushed. Entity IDs can be reserved immediately and used in later
/// commands of the same run.
pub struct Commands<'w> {
    buffer: &'w mut CommandBuffer,
    universe: &'w Universe,
}

impl<'w> Commands<'w> {
    /// Create a handle which records into `buffer`, reserving IDs from
    /// `universe`.
    pub fn new(buffer: &'w mut CommandBuffer, universe: &'w Universe) -> Commands<'w> {
        Commands { buffer, universe }
    }

    /// Returns the number of commands queued so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Reserve an entity ID without spawning it.
    pub fn reserve_entity(&self) -> EntityID {
        self.universe.allocate_entity()
    }

    /// Reserve an entity and queue its spawn with the given components.
    pub fn spawn(&mut self, bundle: impl Bundle) -> EntityCommands<'_, 'w> {
        let id = self.reserve_entity();
        self.buffer.spawn(id, bundle);
        EntityCommands { id, commands: self }
    }

    /// Reserve an entity and queue its spawn with no components.
    pub fn spawn_empty(&mut self) -> EntityCommands<'_, 'w> {
        self.spawn(())
    }

    /// Queue the spawn of an already reserved entity.
    pub fn spawn_at(&mut self, id: EntityID, bundle: impl Bundle) -> EntityCommands<'_, 'w> {
        self.buffer.spawn(id, bundle);
        EntityCommands { id, commands: self }
    }

    /// Queue changes to an existing entity.
    pub fn entity(&mut self, id: EntityID) -> EntityCommands<'_, 'w> {
        EntityCommands { id, commands: self }
    }

    pub fn despawn(&mut self, id: EntityID) {
        self.buffer.despawn(id);
    }

    pub fn insert_resource<R: Resource>(&mut self, resource: R) {
        self.buffer.insert_resource(resource);
    }

    pub fn remove_resource<R: Resource>(&mut self) {
        self.buffer.remove_resource::<R>();
    }

    /// Queue a custom command.
    pub fn add(&mut self, command: impl CustomCommand) {
        self.buffer.add(command);
    }

    /// Queue a prebuilt command.
    pub fn push(&mut self, command: Command) {
        self.buffer.push(command);
    }

    /// Queue an event to be sent to the `Events<E>` resource, creating it if
    /// needed.
    pub fn send_event<E: Send + Sync + 'static>(&mut self, event: E) {
        self.add(move |world: &mut World| {
            world.get_resource_or_insert_with(Events::<E>::default).send(event);
        });
    }
}

/// Queues commands for a single entity.
pub struct EntityCommands<'a, 'w> {
    id: EntityID,
    commands: &'a mut Commands<'w>,
}

impl<'a, 'w> EntityCommands<'a, 'w> {
    /// Get the ID of the entity.
    pub fn id(&self) -> EntityID {
        self.id
    }

    /// Queue the insertion of a component.
    pub fn insert<T: Component>(&mut self, component: T) -> &mut Self {
        self.commands.buffer.set_component(self.id, component);
        self
    }

    /// Queue the removal of a component.
    pub fn remove<T: Component>(&mut self) -> &mut Self {
        self.commands.buffer.remove_component::<T>(self.id);
        self
    }

    /// Queue a custom command which operates on this entity.
    pub fn add<F>(&mut self, f: F) -> &mut Self
        where F: FnOnce(EntityID, &mut World) + Send + 'static
    {
        let id = self.id;
        self.commands.add(move |world: &mut World| f(id, world));
        self
    }

    /// Queue the despawn of the entity.
    pub fn despawn(&mut self) {
        self.commands.despawn(self.id);
    }

    /// Get the `Commands` this entity's commands are queued into.
    pub fn commands(&mut self) -> &mut Commands<'w> {
        self.commands
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::component;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position(i32, i32);

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Marker;

    component!(Position, Marker);

    #[derive(Debug, Default, PartialEq)]
    struct Spawned(Vec<EntityID>);

    #[test]
    fn test_reserve_then_reference() {
        let universe = Universe::new();
        let mut world = World::with_universe(universe.clone());
        let mut buffer = CommandBuffer::new();

        let mut commands = Commands::new(&mut buffer, &universe);
        let id = commands.reserve_entity();
        commands.spawn_at(id, ());
        commands.entity(id)
            .insert(Position(0, 0))
            .insert(Marker)
            .remove::<Marker>();
        assert_eq!(commands.len(), 4);

        assert!(world.get::<Position>(id).is_none());
        buffer.apply(&mut world);
        assert_eq!(world.get::<Position>(id), Some(&Position(0, 0)));
        assert!(!world.has_component::<Marker>(id));
    }

    #[test]
    fn test_entity_custom_command() {
        let mut world = World::new();

        let id = world.run_deferred(|_, commands| {
            commands.spawn((Marker,))
                .add(|id, world| {
                    world.get_resource_or_insert_with(Spawned::default).0.push(id);
                })
                .id()
        });

        assert_eq!(world.resource::<Spawned>(), &Spawned(vec![id]));

        world.run_deferred(|_, commands| commands.entity(id).despawn());
        assert!(!world.contains(id));
    }

    #[test]
    fn test_send_event() {
        let mut world = World::new();

        world.run_deferred(|_, commands| {
            commands.send_event(1u32);
            commands.send_event(2u32);
        });

        let events: Vec<u32> = world.resource_mut::<Events<u32>>().drain().collect();
        assert_eq!(events, vec![1, 2]);
    }
}
