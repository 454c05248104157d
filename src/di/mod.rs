//! Dependency injection.
//!
//! [`Container`] holds lazily built singletons keyed by type and optional
//! name. The free functions below operate on a container the same way but
//! panic on wiring errors, which suits start-up code where a missing binding
//! is a programming defect. [`call`] is the exception: it reports errors.

mod builder;
mod constructor;
mod container;
mod graph;
mod injectable;
mod key;

pub use builder::ContainerBuilder;
pub use constructor::{CallOutput, Constructor, FallibleConstructor, Receiver};
pub use container::Container;
pub use injectable::Injectable;
pub use key::{Key, TypeInfo};

use crate::error::Result;

/// Bind a lazily constructed value, panicking if the binding is invalid.
#[track_caller]
pub fn provide<C, Args>(container: &Container, ctor: C)
where
    C: Constructor<Args>,
{
    if let Err(err) = container.provide(ctor) {
        panic!("{err}");
    }
}

#[track_caller]
pub fn provide_named<C, Args>(container: &Container, name: &str, ctor: C)
where
    C: Constructor<Args>,
{
    if let Err(err) = container.provide_named(name, ctor) {
        panic!("{err}");
    }
}

#[track_caller]
pub fn provide_fallible<C, Args>(container: &Container, ctor: C)
where
    C: FallibleConstructor<Args>,
{
    if let Err(err) = container.provide_fallible(ctor) {
        panic!("{err}");
    }
}

#[track_caller]
pub fn provide_named_fallible<C, Args>(container: &Container, name: &str, ctor: C)
where
    C: FallibleConstructor<Args>,
{
    if let Err(err) = container.provide_named_fallible(name, ctor) {
        panic!("{err}");
    }
}

/// Bind an already-built value.
#[track_caller]
pub fn concrete<T>(container: &Container, value: T)
where
    T: Clone + Send + Sync + 'static,
{
    if let Err(err) = container.concrete(value) {
        panic!("{err}");
    }
}

/// Resolve `T`, panicking if it is unbound or fails to build.
#[track_caller]
pub fn resolve<T>(container: &Container) -> T
where
    T: Clone + Send + Sync + 'static,
{
    container.resolve().unwrap_or_else(|err| panic!("{err}"))
}

#[track_caller]
pub fn named_resolve<T>(container: &Container, name: &str) -> T
where
    T: Clone + Send + Sync + 'static,
{
    container
        .named_resolve(name)
        .unwrap_or_else(|err| panic!("{err}"))
}

/// Invoke `f` with resolved arguments and report any failure.
pub fn call<F, Args>(container: &Container, f: F) -> Result<()>
where
    F: Receiver<Args>,
{
    container.call(f)
}

#[track_caller]
pub fn fill<S: Injectable>(container: &Container, target: &mut S) {
    if let Err(err) = container.fill(target) {
        panic!("{err}");
    }
}

#[track_caller]
pub fn inject<S: Injectable>(container: &Container) -> S {
    container.inject().unwrap_or_else(|err| panic!("{err}"))
}

/// Drop every binding of `container`.
pub fn reset(container: &Container) {
    container.reset();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_helpers() {
        let container = Container::new();
        concrete(&container, 3_i64);
        provide(&container, |n: i64| Arc::new(n.to_string()));
        provide_named(&container, "doubled", |n: i64| n * 2);

        assert_eq!(*resolve::<Arc<String>>(&container), "3");
        assert_eq!(named_resolve::<i64>(&container, "doubled"), 6);

        reset(&container);
        assert!(container.is_empty());
    }

    #[test]
    #[should_panic(expected = "no concrete found for")]
    fn test_resolve_panics_when_unbound() {
        let container = Container::new();
        resolve::<Arc<String>>(&container);
    }

    #[test]
    #[should_panic(expected = "depends on abstract it returns")]
    fn test_provide_panics_on_self_dependency() {
        let container = Container::new();
        provide(&container, |n: u8| n + 1);
    }

    #[test]
    #[should_panic(expected = "encountered error while making concrete")]
    fn test_resolve_panics_on_constructor_error() {
        let container = Container::new();
        provide_fallible(&container, || -> std::result::Result<Arc<u8>, std::io::Error> {
            Err(std::io::Error::other("disk on fire"))
        });
        resolve::<Arc<u8>>(&container);
    }

    #[test]
    fn test_call_does_not_panic() {
        let container = Container::new();
        let result = call(&container, |_missing: Arc<String>| {});
        assert!(result.is_err());
    }
}
