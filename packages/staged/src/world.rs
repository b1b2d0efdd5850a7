//! A world which can hold entities and resources.
//!
//! The `World` owns all component storage. It is mutated directly by anything
//! holding `&mut World` (exclusive systems, commands being applied) and is
//! otherwise only read.

use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bit_vec::BitVec;
use tracing::{debug, warn};

use crate::command_buffer::CommandBuffer;
use crate::commands::Commands;
use crate::component::{Component, ComponentTypeID};
use crate::component_data::{Bundle, ComponentDataVec, ComponentValue};
use crate::entity::{EntityID, EntityState};
use crate::error::WorldError;
use crate::resource::{Resource, Resources};
use crate::system::System;
use crate::universe::Universe;

fn set_bit(bits: &mut BitVec, index: usize, value: bool) {
    if index >= bits.len() {
        if !value {
            return;
        }

        bits.grow(index + 1 - bits.len(), false);
    }

    bits.set(index, value);
}

fn get_bit(bits: &BitVec, index: usize) -> bool {
    bits.get(index).unwrap_or(false)
}

/// A collection of entities, their components and a set of resources.
pub struct World {
    universe: Arc<Universe>,
    entities: BTreeMap<EntityID, ComponentDataVec>,
    populated: BitVec,
    despawned: BitVec,
    resources: Resources,
}

impl World {
    /// Create an empty world with its own `Universe`.
    pub fn new() -> World {
        World::with_universe(Universe::new())
    }

    /// Create an empty world reserving entity IDs from `universe`.
    pub fn with_universe(universe: Arc<Universe>) -> World {
        World {
            universe,
            entities: BTreeMap::new(),
            populated: BitVec::new(),
            despawned: BitVec::new(),
            resources: Resources::new(),
        }
    }

    /// Get the universe this world belongs to.
    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    /// Returns the number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if there are no live entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Determine where an entity ID is in its lifecycle.
    pub fn entity_state(&self, id: EntityID) -> EntityState {
        if get_bit(&self.populated, id.id()) {
            EntityState::Alive
        } else if get_bit(&self.despawned, id.id()) {
            EntityState::Despawned
        } else if self.universe.is_allocated(id) {
            EntityState::Reserved
        } else {
            EntityState::Unallocated
        }
    }

    /// Returns true if the entity has been spawned and not despawned.
    pub fn contains(&self, id: EntityID) -> bool {
        self.entity_state(id).is_alive()
    }

    fn missing_entity_error(&self, id: EntityID) -> WorldError {
        match self.entity_state(id) {
            EntityState::Reserved => WorldError::EntityNotSpawned(id),
            EntityState::Despawned => WorldError::EntityDespawned(id),
            _ => WorldError::NoSuchEntity(id),
        }
    }

    /// Reserve a new entity ID.
    ///
    /// This only needs shared access: the entity exists once a spawn for it
    /// is applied.
    pub fn reserve_entity(&self) -> EntityID {
        self.universe.allocate_entity()
    }

    /// Reserve and spawn an entity in one step.
    pub fn spawn(&mut self, bundle: impl Bundle) -> EntityID {
        let id = self.reserve_entity();
        self.spawn_at(id, bundle);
        id
    }

    /// Spawn a reserved entity.
    ///
    /// # Panics
    /// Panics if `id` is not a reserved, unspawned, entity.
    pub fn spawn_at(&mut self, id: EntityID, bundle: impl Bundle) {
        if let Err(err) = self.try_spawn_at(id, bundle) {
            panic!("{}", err);
        }
    }

    /// Spawn a reserved entity with the components in `bundle`.
    pub fn try_spawn_at(&mut self, id: EntityID, bundle: impl Bundle) -> Result<(), WorldError> {
        match self.entity_state(id) {
            EntityState::Reserved => {}
            EntityState::Alive => return Err(WorldError::EntityAlreadySpawned(id)),
            EntityState::Despawned => return Err(WorldError::EntityDespawned(id)),
            EntityState::Unallocated => return Err(WorldError::NoSuchEntity(id)),
        }

        let mut components = ComponentDataVec::new();
        bundle.into_component_data(&mut components);
        self.entities.insert(id, components);
        set_bit(&mut self.populated, id.id(), true);
        Ok(())
    }

    /// Despawn an entity, returning its components.
    pub fn try_despawn(&mut self, id: EntityID) -> Result<ComponentDataVec, WorldError> {
        let components = match self.entities.remove(&id) {
            Some(components) => components,
            None => return Err(self.missing_entity_error(id)),
        };

        set_bit(&mut self.populated, id.id(), false);
        set_bit(&mut self.despawned, id.id(), true);
        Ok(components)
    }

    /// Despawn an entity. Returns false, and logs, if it was not alive.
    pub fn despawn(&mut self, id: EntityID) -> bool {
        match self.try_despawn(id) {
            Ok(_) => true,
            Err(err) => {
                warn!(entity = %id, %err, "despawn of a dead entity");
                false
            }
        }
    }

    /// Get all the components of an entity.
    pub fn components(&self, id: EntityID) -> Option<&ComponentDataVec> {
        self.entities.get(&id)
    }

    /// Set a component on an entity, returning the value it replaced.
    pub fn insert_component<T: Component>(&mut self, id: EntityID, component: T) -> Result<Option<T>, WorldError> {
        let old = self.insert_component_value(id, ComponentValue::new(component))?;
        Ok(old.and_then(|old| old.downcast::<T>().ok()))
    }

    /// Set a type-erased component on an entity.
    pub fn insert_component_value(&mut self, id: EntityID, component: ComponentValue) -> Result<Option<ComponentValue>, WorldError> {
        match self.entities.get_mut(&id) {
            Some(components) => Ok(components.set_component(component)),
            None => Err(self.missing_entity_error(id)),
        }
    }

    /// Remove a component from an entity, returning it.
    ///
    /// Removing a component the entity does not have is not an error.
    pub fn remove_component<T: Component>(&mut self, id: EntityID) -> Result<Option<T>, WorldError> {
        let old = self.remove_component_by_id(id, T::component_type())?;
        Ok(old.and_then(|old| old.downcast::<T>().ok()))
    }

    /// Remove a component from an entity by its type ID.
    pub fn remove_component_by_id(&mut self, id: EntityID, component_type: ComponentTypeID) -> Result<Option<ComponentValue>, WorldError> {
        match self.entities.get_mut(&id) {
            Some(components) => Ok(components.remove_component(component_type)),
            None => Err(self.missing_entity_error(id)),
        }
    }

    /// Returns true if the entity is alive and has a `T`.
    pub fn has_component<T: Component>(&self, id: EntityID) -> bool {
        self.entities.get(&id)
            .map_or(false, |components| components.contains(T::component_type()))
    }

    /// Get a component of an entity.
    ///
    /// Returns `None` for entities which are not alive, including reserved
    /// entities which have not been spawned yet.
    pub fn get<T: Component>(&self, id: EntityID) -> Option<&T> {
        self.entities.get(&id)
            .and_then(ComponentDataVec::component::<T>)
    }

    /// Get a component of an entity mutably.
    pub fn get_mut<T: Component>(&mut self, id: EntityID) -> Option<&mut T> {
        self.entities.get_mut(&id)
            .and_then(ComponentDataVec::component_mut::<T>)
    }

    /// Get a component of an entity, reporting why it is unavailable.
    pub fn try_get<T: Component>(&self, id: EntityID) -> Result<&T, WorldError> {
        let components = self.entities.get(&id)
            .ok_or_else(|| self.missing_entity_error(id))?;

        components.component::<T>()
            .ok_or_else(|| WorldError::MissingComponent {
                entity: id,
                component: T::component_type().name(),
            })
    }

    /// Iterate over the IDs of all live entities in ID order.
    pub fn entities(&self) -> impl Iterator<Item = EntityID> + '_ {
        self.entities.keys().copied()
    }

    /// Iterate over every live entity with a `T`, in ID order.
    pub fn query<T: Component>(&self) -> impl Iterator<Item = (EntityID, &T)> + '_ {
        self.entities.iter()
            .filter_map(|(id, components)| components.component::<T>().map(|c| (*id, c)))
    }

    /// Iterate mutably over every live entity with a `T`, in ID order.
    pub fn query_mut<T: Component>(&mut self) -> impl Iterator<Item = (EntityID, &mut T)> + '_ {
        self.entities.iter_mut()
            .filter_map(|(id, components)| components.component_mut::<T>().map(|c| (*id, c)))
    }

    /// Get the resource table.
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// Get the resource table mutably.
    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }

    /// Insert a resource, returning the value it replaced.
    pub fn insert_resource<R: Resource>(&mut self, resource: R) -> Option<R> {
        self.resources.insert(resource)
    }

    /// Remove a resource, returning it.
    pub fn remove_resource<R: Resource>(&mut self) -> Option<R> {
        self.resources.remove::<R>()
    }

    pub fn contains_resource<R: Resource>(&self) -> bool {
        self.resources.contains::<R>()
    }

    /// Get a resource.
    ///
    /// # Panics
    /// Panics if the resource does not exist.
    pub fn resource<R: Resource>(&self) -> &R {
        match self.resources.get::<R>() {
            Some(resource) => resource,
            None => panic!("{}", WorldError::MissingResource(type_name::<R>())),
        }
    }

    /// Get a resource mutably.
    ///
    /// # Panics
    /// Panics if the resource does not exist.
    pub fn resource_mut<R: Resource>(&mut self) -> &mut R {
        match self.resources.get_mut::<R>() {
            Some(resource) => resource,
            None => panic!("{}", WorldError::MissingResource(type_name::<R>())),
        }
    }

    pub fn get_resource<R: Resource>(&self) -> Option<&R> {
        self.resources.get::<R>()
    }

    pub fn get_resource_mut<R: Resource>(&mut self) -> Option<&mut R> {
        self.resources.get_mut::<R>()
    }

    /// Get a resource, inserting the result of `f` first if it is missing.
    pub fn get_resource_or_insert_with<R: Resource>(&mut self, f: impl FnOnce() -> R) -> &mut R {
        self.resources.get_or_insert_with(f)
    }

    /// Temporarily remove a resource, so that it and the rest of the world can
    /// be mutated at the same time.
    ///
    /// The resource is put back when `f` returns, or if it panics.
    ///
    /// # Panics
    /// Panics if the resource does not exist.
    pub fn resource_scope<R: Resource, U>(&mut self, f: impl FnOnce(&mut World, &mut R) -> U) -> U {
        match self.try_resource_scope(f) {
            Ok(result) => result,
            Err(err) => panic!("{}", err),
        }
    }

    /// Like `resource_scope`, but reports a missing resource as an error.
    pub fn try_resource_scope<R: Resource, U>(&mut self, f: impl FnOnce(&mut World, &mut R) -> U) -> Result<U, WorldError> {
        let mut resource = self.resources.remove::<R>()
            .ok_or_else(|| WorldError::MissingResource(type_name::<R>()))?;

        let result = panic::catch_unwind(AssertUnwindSafe(|| f(self, &mut resource)));

        if self.resources.insert(resource).is_some() {
            warn!(resource = type_name::<R>(), "resource inserted during its own resource_scope was overwritten");
        }

        match result {
            Ok(result) => Ok(result),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Run `f` with a fresh `Commands` handle, then apply everything it
    /// queued before returning.
    pub fn run_deferred<U>(&mut self, f: impl FnOnce(&World, &mut Commands<'_>) -> U) -> U {
        let universe = self.universe.clone();
        let mut buffer = universe.acquire_buffer();

        let result = {
            let mut commands = Commands::new(&mut buffer, &universe);
            f(self, &mut commands)
        };

        buffer.apply(self);
        universe.release_buffer(buffer);
        result
    }

    /// Run a single deferred system immediately, flushing its commands.
    pub fn run_system(&mut self, system: &mut dyn System) {
        self.run_deferred(|world, commands| system.run(world, commands));
    }

    /// Apply a set of command buffers in order.
    ///
    /// This is a flush barrier: every command in `buffers` has been applied
    /// when it returns, and the buffers are left empty.
    pub fn flush(&mut self, buffers: &mut [CommandBuffer]) {
        let commands: usize = buffers.iter().map(CommandBuffer::len).sum();

        for buffer in buffers.iter_mut() {
            buffer.apply(self);
        }

        debug!(queues = buffers.len(), commands, "flushed command buffers");
    }
}

impl Default for World {
    fn default() -> Self {
        World::new()
    }
}

impl Debug for World {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "World {{")?;

        writeln!(f, "  Entities:")?;
        for (id, components) in self.entities.iter() {
            write!(f, "    #{} - ", id.id())?;
            for ty in components.component_types() {
                write!(f, "{:?}, ", ty)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "  Resources: {:?}", self.resources)?;
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::component;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position(i32, i32);

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity(i32, i32);

    component!(Position, Velocity);

    #[derive(Debug, PartialEq)]
    struct Counter(u32);

    #[test]
    fn test_entity_lifecycle() {
        let mut world = World::new();
        assert_eq!(world.entity_state(EntityID::new(1)), EntityState::Unallocated);

        let id = world.reserve_entity();
        assert_eq!(world.entity_state(id), EntityState::Reserved);
        assert_eq!(world.try_get::<Position>(id), Err(WorldError::EntityNotSpawned(id)));
        assert_eq!(world.get::<Position>(id), None);

        world.spawn_at(id, (Position(1, 2),));
        assert_eq!(world.entity_state(id), EntityState::Alive);
        assert_eq!(world.try_spawn_at(id, ()), Err(WorldError::EntityAlreadySpawned(id)));
        assert_eq!(world.try_get::<Velocity>(id), Err(WorldError::MissingComponent {
            entity: id,
            component: Velocity::component_type().name(),
        }));

        let components = world.try_despawn(id).unwrap();
        assert_eq!(components.component::<Position>(), Some(&Position(1, 2)));
        assert_eq!(world.entity_state(id), EntityState::Despawned);
        assert_eq!(world.try_despawn(id).err(), Some(WorldError::EntityDespawned(id)));
        assert_eq!(world.try_spawn_at(id, ()), Err(WorldError::EntityDespawned(id)));
        assert!(!world.despawn(id));
    }

    #[test]
    fn test_components() {
        let mut world = World::new();
        let id = world.spawn((Position(0, 0), Velocity(1, 1)));

        assert_eq!(world.insert_component(id, Position(3, 3)), Ok(Some(Position(0, 0))));
        world.get_mut::<Velocity>(id).unwrap().0 = 7;
        assert_eq!(world.get::<Velocity>(id), Some(&Velocity(7, 1)));
        assert!(world.has_component::<Position>(id));

        assert_eq!(world.remove_component::<Position>(id), Ok(Some(Position(3, 3))));
        assert_eq!(world.remove_component::<Position>(id), Ok(None));
        assert!(!world.has_component::<Position>(id));

        let missing = EntityID::new(9999);
        assert_eq!(world.insert_component(missing, Position(0, 0)), Err(WorldError::NoSuchEntity(missing)));
    }

    #[test]
    fn test_query() {
        let mut world = World::new();
        let a = world.spawn((Position(1, 0),));
        let _b = world.spawn((Velocity(0, 0),));
        let c = world.spawn((Position(3, 0), Velocity(0, 0)));

        let found: Vec<_> = world.query::<Position>().map(|(id, p)| (id, *p)).collect();
        assert_eq!(found, vec![(a, Position(1, 0)), (c, Position(3, 0))]);

        for (_, p) in world.query_mut::<Position>() {
            p.1 = 10;
        }
        assert_eq!(world.get::<Position>(c), Some(&Position(3, 10)));
        assert_eq!(world.entities().count(), 3);
    }

    #[test]
    fn test_resources() {
        let mut world = World::new();
        assert!(world.get_resource::<Counter>().is_none());
        assert!(world.get_resource_mut::<Counter>().is_none());

        world.insert_resource(Counter(1));
        world.resource_mut::<Counter>().0 += 1;
        assert_eq!(world.resource::<Counter>(), &Counter(2));
        assert_eq!(world.remove_resource::<Counter>(), Some(Counter(2)));
        assert!(!world.contains_resource::<Counter>());
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn test_missing_resource_panics() {
        let world = World::new();
        world.resource::<Counter>();
    }

    #[test]
    fn test_resource_scope() {
        let mut world = World::new();
        world.insert_resource(Counter(0));

        let spawned = world.resource_scope(|world, counter: &mut Counter| {
            assert!(!world.contains_resource::<Counter>());
            counter.0 += 1;
            world.spawn((Position(counter.0 as i32, 0),))
        });

        assert_eq!(world.resource::<Counter>(), &Counter(1));
        assert_eq!(world.get::<Position>(spawned), Some(&Position(1, 0)));

        // A body which leaves the resource alone puts back the same value.
        world.resource_scope(|world, _: &mut Counter| {
            world.spawn(());
        });
        assert_eq!(world.resource::<Counter>(), &Counter(1));

        assert_eq!(
            world.try_resource_scope(|_, _: &mut Velocity| ()).err(),
            Some(WorldError::MissingResource(type_name::<Velocity>())));
    }

    #[test]
    fn test_resource_scope_restores_on_panic() {
        let mut world = World::new();
        world.insert_resource(Counter(0));

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            world.resource_scope(|_, counter: &mut Counter| {
                counter.0 = 5;
                panic!("scope body failed");
            })
        }));

        assert!(result.is_err());
        assert_eq!(world.resource::<Counter>(), &Counter(5));
    }

    #[test]
    fn test_run_deferred() {
        let mut world = World::new();

        let id = world.run_deferred(|world, commands| {
            let id = commands.spawn((Position(4, 4),)).id();
            assert!(world.get::<Position>(id).is_none());
            commands.insert_resource(Counter(9));
            id
        });

        assert_eq!(world.get::<Position>(id), Some(&Position(4, 4)));
        assert_eq!(world.resource::<Counter>(), &Counter(9));
        assert_eq!(world.universe().pooled_buffers(), 1);
    }
}
