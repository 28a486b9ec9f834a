/*!

The `Context` owns every subsystem of a run as a typed data plugin: the population, the
loaded health tables, the parameters, the random number generators and the current year's
snapshot. Stages reach each other only through the `Context*Ext` traits implemented on
`Context`.

A data plugin is any `'static` type that knows how to construct itself:

```rust
# use transport_health::context::{Context, DataPlugin};
#[derive(Default)]
struct Counter(u32);

impl DataPlugin for Counter {
    const new: &'static dyn Fn() -> Self = &Counter::default;
}

let mut context = Context::new();
context.get_data_container_mut::<Counter>().0 += 1;
assert_eq!(context.get_data_container::<Counter>().unwrap().0, 1);
```

*/

use crate::{type_of, TypeId};
use rustc_hash::FxHashMap;
use std::any::Any;

/// A type that can be stored in a `Context` and lazily constructed on first access.
pub trait DataPlugin: Any + Sized {
    /// A constant reference to a constructor
    #[allow(non_upper_case_globals)]
    const new: &'static dyn Fn() -> Self;
}

/// Implements `DataPlugin` for `$container` using the constructor expression `$ctor`.
#[macro_export]
macro_rules! define_data_plugin {
    ($container:ty, $ctor:expr) => {
        impl $crate::context::DataPlugin for $container {
            #[allow(non_upper_case_globals)]
            const new: &'static dyn Fn() -> Self = &|| $ctor;
        }
    };
}

pub struct Context {
    // This is actually a `HashMap<TypeId, Box<T: DataPlugin>>`
    data_plugins: FxHashMap<TypeId, Box<dyn Any>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context {
            data_plugins: FxHashMap::default(),
        }
    }

    /// Returns a mutable reference for the data container for `T`, creating it if it doesn't
    /// exist yet.
    pub fn get_data_container_mut<T: DataPlugin>(&mut self) -> &mut T {
        let boxed = self
            .data_plugins
            .entry(type_of::<T>())
            .or_insert_with(|| Box::new((T::new)()));
        match boxed.downcast_mut::<T>() {
            Some(container) => container,
            // Only a `Box<T>` is ever stored under `type_of::<T>()`.
            None => unreachable!("data container type mismatch"),
        }
    }

    /// Returns a reference to the data container for `T` if it exists.
    /// If you need a mutable reference or lazy instantiation, use
    /// `Context::get_data_container_mut()`.
    pub fn get_data_container<T: DataPlugin>(&self) -> Option<&T> {
        self.data_plugins
            .get(&type_of::<T>())
            .and_then(|data| data.downcast_ref::<T>())
    }

    /// Replaces the data container for `T`, returning the previous one if there was one.
    pub fn set_data_container<T: DataPlugin>(&mut self, value: T) -> Option<T> {
        self.data_plugins
            .insert(type_of::<T>(), Box::new(value))
            .and_then(|previous| previous.downcast::<T>().ok())
            .map(|previous| *previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, PartialEq)]
    struct Tally(Vec<u8>);
    define_data_plugin!(Tally, Tally::default());

    struct Label(&'static str);
    define_data_plugin!(Label, Label("unset"));

    #[test]
    fn test_context_creation() {
        let mut context = Context::new();
        {
            let tally: &mut Tally = context.get_data_container_mut();
            tally.0.push(1);
            tally.0.push(2);
        }
        assert!(context.get_data_container::<Label>().is_none());
        assert_eq!(context.get_data_container_mut::<Label>().0, "unset");

        let result = context.get_data_container::<Tally>();
        assert_eq!(result, Some(&Tally(vec![1, 2])));
    }

    #[test]
    fn set_replaces_container() {
        let mut context = Context::new();
        context.get_data_container_mut::<Tally>().0.push(9);
        let previous = context.set_data_container(Tally(vec![3]));
        assert_eq!(previous, Some(Tally(vec![9])));
        assert_eq!(context.get_data_container::<Tally>(), Some(&Tally(vec![3])));
    }
}
