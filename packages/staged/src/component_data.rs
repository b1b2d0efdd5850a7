//! Containers for component data.
//!
//! Component values travel through command buffers type-erased, so they are
//! boxed up as `ComponentValue`s and kept per-entity in a `ComponentDataVec`
//! sorted by component type.

use std::any::Any;
use std::fmt::Debug;
use std::slice;

use crate::component::{Component, ComponentTypeID};

trait AnyComponent: Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Component> AnyComponent for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// An owned, type-erased component value.
#[derive(Debug)]
pub struct ComponentValue {
    type_id: ComponentTypeID,
    value: Box<dyn AnyComponent>,
}

impl ComponentValue {
    /// Box up a component value.
    pub fn new<T: Component>(value: T) -> ComponentValue {
        ComponentValue {
            type_id: T::component_type(),
            value: Box::new(value),
        }
    }

    /// Get the type ID of the stored component.
    pub fn type_id(&self) -> ComponentTypeID {
        self.type_id
    }

    /// Returns true if this value holds a `T`.
    pub fn is<T: Component>(&self) -> bool {
        self.type_id == T::component_type() && self.value.as_any().is::<T>()
    }

    /// Attempt to downcast this value back to a reference to the component type.
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        if self.type_id == T::component_type() {
            self.value.as_any().downcast_ref()
        } else {
            None
        }
    }

    /// Attempt to downcast this value back to a mutable reference to the component type.
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        if self.type_id == T::component_type() {
            self.value.as_any_mut().downcast_mut()
        } else {
            None
        }
    }

    /// Unbox the component, returning the value unchanged if it is not a `T`.
    pub fn downcast<T: Component>(self) -> Result<T, ComponentValue> {
        if !self.is::<T>() {
            return Err(self);
        }

        match self.value.into_any().downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(_) => unreachable!("component value changed type after `is` check"),
        }
    }
}

/// A vector of component data, sorted by component type with no duplicates.
///
/// This is the full component set of one entity.
#[derive(Debug, Default)]
pub struct ComponentDataVec(Vec<ComponentValue>);

impl ComponentDataVec {
    /// Create an empty `ComponentDataVec`.
    pub fn new() -> ComponentDataVec {
        ComponentDataVec(Vec::new())
    }

    /// Return the slice contents of this `ComponentDataVec`.
    pub fn as_slice(&self) -> &[ComponentValue] {
        &self.0[..]
    }

    /// Return the number of entries in this mapping.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no components.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Remove all component data from this `ComponentDataVec`.
    pub fn clear(&mut self) {
        self.0.clear()
    }

    fn position(&self, type_id: ComponentTypeID) -> Result<usize, usize> {
        self.0.binary_search_by_key(&type_id, |r| r.type_id())
    }

    /// Set a component's value, returning the value it replaced.
    pub fn set_component(&mut self, component_data: ComponentValue) -> Option<ComponentValue> {
        match self.position(component_data.type_id()) {
            Ok(idx) => Some(std::mem::replace(&mut self.0[idx], component_data)),
            Err(idx) => {
                self.0.insert(idx, component_data);
                None
            }
        }
    }

    /// Remove a component from this `ComponentDataVec`.
    pub fn remove_component(&mut self, type_id: ComponentTypeID) -> Option<ComponentValue> {
        match self.position(type_id) {
            Ok(idx) => Some(self.0.remove(idx)),
            Err(_) => None,
        }
    }

    /// Returns true if a component of the given type is present.
    pub fn contains(&self, type_id: ComponentTypeID) -> bool {
        self.position(type_id).is_ok()
    }

    pub fn get(&self, type_id: ComponentTypeID) -> Option<&ComponentValue> {
        self.position(type_id).ok().map(|idx| &self.0[idx])
    }

    pub fn get_mut(&mut self, type_id: ComponentTypeID) -> Option<&mut ComponentValue> {
        match self.position(type_id) {
            Ok(idx) => Some(&mut self.0[idx]),
            Err(_) => None,
        }
    }

    /// Get a typed reference to a component.
    pub fn component<T: Component>(&self) -> Option<&T> {
        self.get(T::component_type()).and_then(ComponentValue::downcast_ref::<T>)
    }

    /// Get a typed mutable reference to a component.
    pub fn component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.get_mut(T::component_type()).and_then(ComponentValue::downcast_mut::<T>)
    }

    /// Iterate over the (sorted) component types present.
    pub fn component_types(&self) -> impl Iterator<Item = ComponentTypeID> + '_ {
        self.0.iter().map(ComponentValue::type_id)
    }

    pub fn iter(&self) -> slice::Iter<'_, ComponentValue> {
        self.0.iter()
    }
}

impl FromIterator<ComponentValue> for ComponentDataVec {
    fn from_iter<I: IntoIterator<Item = ComponentValue>>(iter: I) -> Self {
        let mut data = ComponentDataVec::new();
        for value in iter {
            data.set_component(value);
        }
        data
    }
}

impl IntoIterator for ComponentDataVec {
    type Item = ComponentValue;
    type IntoIter = std::vec::IntoIter<ComponentValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A group of components which can be attached to an entity together.
///
/// Implemented for tuples of up to eight components. If a tuple names the
/// same component type twice, the rightmost value wins.
pub trait Bundle: Send + 'static {
    /// Move every component of this bundle into `data`.
    fn into_component_data(self, data: &mut ComponentDataVec);
}

impl Bundle for () {
    fn into_component_data(self, _data: &mut ComponentDataVec) {}
}

impl Bundle for ComponentDataVec {
    fn into_component_data(self, data: &mut ComponentDataVec) {
        for value in self {
            data.set_component(value);
        }
    }
}

impl Bundle for ComponentValue {
    fn into_component_data(self, data: &mut ComponentDataVec) {
        data.set_component(self);
    }
}

macro_rules! impl_bundle {
    ($($name:ident),+) => {
        impl<$($name: Component),+> Bundle for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_component_data(self, data: &mut ComponentDataVec) {
                let ($($name,)+) = self;
                $(data.set_component(ComponentValue::new($name));)+
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod test {
    use super::*;
    use crate::component;

    #[derive(Debug, PartialEq)]
    struct A(u8);

    #[derive(Debug, PartialEq)]
    struct B(u8);

    component!(A, B);

    #[test]
    fn test_component_value() {
        let value = ComponentValue::new(A(23));
        assert_eq!(value.type_id(), A::component_type());
        assert!(value.is::<A>());
        assert!(!value.is::<B>());
        assert_eq!(value.downcast_ref::<A>(), Some(&A(23)));
        assert_eq!(value.downcast_ref::<B>(), None);

        let value = value.downcast::<B>().unwrap_err();
        assert_eq!(value.downcast::<A>().unwrap(), A(23));
    }

    #[test]
    fn test_component_data() {
        let mut data: ComponentDataVec = vec![
            ComponentValue::new(B(24)),
            ComponentValue::new(A(51)),
        ].into_iter().collect();

        assert_eq!(data.len(), 2);
        let types: Vec<_> = data.component_types().collect();
        let mut sorted = types.clone();
        sorted.sort();
        assert_eq!(types, sorted);

        let old = data.set_component(ComponentValue::new(A(52))).unwrap();
        assert_eq!(old.downcast::<A>().unwrap(), A(51));
        assert_eq!(data.component::<A>(), Some(&A(52)));

        data.component_mut::<B>().unwrap().0 = 7;
        assert_eq!(data.component::<B>(), Some(&B(7)));

        assert!(data.remove_component(B::component_type()).is_some());
        assert!(data.remove_component(B::component_type()).is_none());
        assert!(!data.contains(B::component_type()));
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_bundle_rightmost_wins() {
        let mut data = ComponentDataVec::new();
        (A(1), B(2), A(3)).into_component_data(&mut data);
        assert_eq!(data.len(), 2);
        assert_eq!(data.component::<A>(), Some(&A(3)));
        assert_eq!(data.component::<B>(), Some(&B(2)));

        ().into_component_data(&mut data);
        assert_eq!(data.len(), 2);
    }
}
