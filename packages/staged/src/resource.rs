//! Singleton values keyed by their type.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};

/// Any value which can live in a `World` as a resource.
///
/// At most one value of each type is stored at a time.
pub trait Resource: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Resource for T {}

/// Identifies a resource type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceTypeID {
    type_id: TypeId,
    name: &'static str,
}

impl ResourceTypeID {
    /// Get the ID for resources of type `R`.
    pub fn of<R: Resource>() -> ResourceTypeID {
        ResourceTypeID {
            type_id: TypeId::of::<R>(),
            name: type_name::<R>(),
        }
    }

    /// Return the name of the resource type.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Debug for ResourceTypeID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

type BoxedResource = Box<dyn Any + Send + Sync>;

/// An owned, type-erased resource value on its way into a `World`.
pub struct ResourceValue {
    type_id: ResourceTypeID,
    value: BoxedResource,
}

impl ResourceValue {
    pub fn new<R: Resource>(value: R) -> ResourceValue {
        ResourceValue {
            type_id: ResourceTypeID::of::<R>(),
            value: Box::new(value),
        }
    }

    pub fn type_id(&self) -> ResourceTypeID {
        self.type_id
    }
}

impl Debug for ResourceValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceValue({})", self.type_id.name)
    }
}

/// The table of resources held by a `World`.
#[derive(Default)]
pub struct Resources {
    values: HashMap<ResourceTypeID, BoxedResource>,
}

impl Resources {
    pub fn new() -> Resources {
        Resources::default()
    }

    /// Returns the number of resources stored.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Insert a resource, returning the value it replaced.
    pub fn insert<R: Resource>(&mut self, value: R) -> Option<R> {
        self.values.insert(ResourceTypeID::of::<R>(), Box::new(value))
            .and_then(|old| old.downcast::<R>().ok())
            .map(|old| *old)
    }

    /// Insert a type-erased resource. Returns true if it replaced one.
    pub fn insert_value(&mut self, value: ResourceValue) -> bool {
        self.values.insert(value.type_id, value.value).is_some()
    }

    /// Remove a resource, returning it.
    pub fn remove<R: Resource>(&mut self) -> Option<R> {
        self.values.remove(&ResourceTypeID::of::<R>())
            .and_then(|old| old.downcast::<R>().ok())
            .map(|old| *old)
    }

    /// Remove a resource by ID. Returns true if one was present.
    pub fn remove_by_id(&mut self, type_id: ResourceTypeID) -> bool {
        self.values.remove(&type_id).is_some()
    }

    pub fn contains<R: Resource>(&self) -> bool {
        self.contains_id(ResourceTypeID::of::<R>())
    }

    pub fn contains_id(&self, type_id: ResourceTypeID) -> bool {
        self.values.contains_key(&type_id)
    }

    pub fn get<R: Resource>(&self) -> Option<&R> {
        self.values.get(&ResourceTypeID::of::<R>())
            .and_then(|value| value.downcast_ref())
    }

    pub fn get_mut<R: Resource>(&mut self) -> Option<&mut R> {
        self.values.get_mut(&ResourceTypeID::of::<R>())
            .and_then(|value| value.downcast_mut())
    }

    /// Get a resource, inserting the result of `f` first if it is missing.
    pub fn get_or_insert_with<R: Resource>(&mut self, f: impl FnOnce() -> R) -> &mut R {
        let type_id = ResourceTypeID::of::<R>();
        let value = self.values.entry(type_id)
            .or_insert_with(|| Box::new(f()));

        match value.downcast_mut() {
            Some(value) => value,
            None => unreachable!("resource slot for `{}` holds another type", type_id.name),
        }
    }

    /// Iterate over the IDs of all stored resources.
    pub fn ids(&self) -> impl Iterator<Item = ResourceTypeID> + '_ {
        self.values.keys().copied()
    }
}

impl Debug for Resources {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.values.keys().map(|id| id.name).collect();
        names.sort_unstable();
        f.debug_set().entries(names).finish()
    }
}
