//! Base definitions for components.
//!
//! Entities in this library carry no data of their own: everything attached
//! to them is a component. This module provides the means of defining and
//! identifying component types.
//!
//! Each component type is allocated a unique ID the first time it is used.
//! The `component` macro implements `Component` and wires up that ID.

use std::any::{type_name, TypeId};
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::{Lazy, OnceCell};

/// A component type ID which is unique for a specific component type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentTypeID(usize);

struct ComponentRegistry {
    component_types: Vec<Arc<ComponentRegistration>>,
}

static COMPONENT_REGISTRY: Lazy<RwLock<ComponentRegistry>> = Lazy::new(|| {
    RwLock::new(ComponentRegistry {
        component_types: Vec::new(),
    })
});

impl ComponentTypeID {
    /// Create a new globally unique `ComponentTypeID` for `T`.
    ///
    /// This is normally called once per type through `AutoComponentTypeID`.
    /// Calling it directly registers another ID for the same Rust type.
    pub fn register<T: Component>() -> ComponentTypeID {
        let mut r = COMPONENT_REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
        let id = ComponentTypeID(r.component_types.len());
        r.component_types.push(Arc::new(ComponentRegistration::new::<T>(id)));
        id
    }

    /// Fetch the registration for this `ComponentTypeID` returning None if it is
    /// missing from the registry.
    fn safe_registration(&self) -> Option<Arc<ComponentRegistration>> {
        let r = COMPONENT_REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
        r.component_types.get(self.0).cloned()
    }

    /// Fetch the registration information for a component type.
    pub fn registration(&self) -> Option<Arc<ComponentRegistration>> {
        self.safe_registration()
    }

    /// Return the inner unique ID.
    pub fn id(&self) -> usize {
        self.0
    }

    /// Return the name of this component type.
    pub fn name(&self) -> &'static str {
        self.safe_registration()
            .map_or("<unregistered component>", |reg| reg.name())
    }
}

impl Debug for ComponentTypeID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.safe_registration() {
            Some(reg) => write!(f, "{}", reg.name()),
            None => write!(f, "ComponentTypeID(#{} missing)", self.0),
        }
    }
}

/// A struct for lazily assigning unique `ComponentTypeID`s.
pub struct AutoComponentTypeID(OnceCell<ComponentTypeID>);

impl AutoComponentTypeID {
    /// Create a new `AutoComponentTypeID`.
    pub const fn new() -> AutoComponentTypeID {
        AutoComponentTypeID(OnceCell::new())
    }

    /// Get the `ComponentTypeID` this struct wraps.
    pub fn get<T: Component>(&self) -> ComponentTypeID {
        *self.0.get_or_init(ComponentTypeID::register::<T>)
    }
}

impl Default for AutoComponentTypeID {
    fn default() -> Self {
        AutoComponentTypeID::new()
    }
}

/// The component trait is implemented on all component types.
///
/// Prefer the `component` macro to implementing this by hand: it guarantees
/// `component_type` is stable and unique for the type.
pub trait Component: Debug + Send + Sync + 'static {
    /// Get the unique type ID of this component.
    fn component_type() -> ComponentTypeID;
}

/// The dynamic description of a type implementing `Component`.
#[derive(Clone, Copy)]
pub struct ComponentRegistration {
    type_id: ComponentTypeID,
    rust_type: TypeId,
    name: &'static str,
}

impl ComponentRegistration {
    /// Create a ComponentRegistration for a static type.
    pub fn new<T: Component>(type_id: ComponentTypeID) -> ComponentRegistration {
        ComponentRegistration {
            type_id,
            rust_type: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Return the unique type ID for this `ComponentRegistration`.
    pub fn type_id(&self) -> ComponentTypeID {
        self.type_id
    }

    /// Return the Rust `TypeId` of the registered type.
    pub fn rust_type(&self) -> TypeId {
        self.rust_type
    }

    /// Get the name of this component type.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ComponentRegistration {
    fn eq(&self, other: &ComponentRegistration) -> bool {
        self.type_id.eq(&other.type_id)
    }
}

impl Eq for ComponentRegistration {}

impl Debug for ComponentRegistration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<ComponentRegistration #{} {}>", self.type_id.id(), self.name)
    }
}

/// Implement the `Component` trait on one or more types.
#[macro_export]
macro_rules! component {
    ($($i:ident),+ $(,)?) => {
        $(
            const _: () = {
                static INIT_TYPE: $crate::component::AutoComponentTypeID =
                    $crate::component::AutoComponentTypeID::new();

                impl $crate::component::Component for $i {
                    fn component_type() -> $crate::component::ComponentTypeID {
                        INIT_TYPE.get::<$i>()
                    }
                }
            };
        )+
    };
}
