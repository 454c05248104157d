use super::constructor::{Constructor, FallibleConstructor, Receiver};
use super::graph;
use super::{Injectable, Key, TypeInfo};
use crate::error::{ContainerError, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

type Instance = Arc<dyn Any + Send + Sync>;

type Factory = Box<dyn Fn(&Container) -> anyhow::Result<Instance> + Send + Sync>;

thread_local! {
    /// Registrations being made on this thread, innermost last.
    static RESOLVING: RefCell<Vec<(usize, Key)>> = const { RefCell::new(Vec::new()) };
}

/// Thread-safe dependency injection container.
///
/// Bindings are lazy singletons: the constructor runs on the first
/// resolution and every later resolution hands out a clone of the same
/// value. Register services as `Arc<T>` or `Arc<dyn Trait>` so that the
/// clones share one instance.
///
/// `Container` is a cheap handle; clones refer to the same bindings.
#[derive(Clone, Default)]
pub struct Container {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    parent: Option<Container>,
    bindings: DashMap<Key, Arc<Registration>>,
}

struct Registration {
    key: Key,
    dependencies: Vec<Key>,
    factory: Factory,
    instance: Mutex<Option<Instance>>,
}

impl Registration {
    /// Return the cached instance, building it first if needed.
    ///
    /// The instance lock is held while the factory runs, so concurrent
    /// resolutions of the same key wait for the first one instead of
    /// building twice.
    fn make(&self, owner: &Container) -> Result<Instance> {
        let _guard = ResolutionGuard::enter(self)?;

        let mut slot = self.instance.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(instance) = slot.as_ref() {
            return Ok(Arc::clone(instance));
        }

        let instance = (self.factory)(owner).map_err(|source| ContainerError::Construction {
            key: self.key.clone(),
            source,
        })?;
        tracing::trace!(abstraction = %self.key, "concrete made");

        *slot = Some(Arc::clone(&instance));
        Ok(instance)
    }
}

/// Marks a registration as being made on the current call stack.
struct ResolutionGuard;

impl ResolutionGuard {
    fn enter(registration: &Registration) -> Result<Self> {
        let marker = registration as *const Registration as usize;

        RESOLVING.with_borrow_mut(|stack| {
            if let Some(start) = stack.iter().position(|(m, _)| *m == marker) {
                let mut chain: Vec<Key> = stack[start..].iter().map(|(_, k)| k.clone()).collect();
                chain.push(registration.key.clone());
                return Err(ContainerError::CircularDependency {
                    key: registration.key.clone(),
                    chain: graph::render_chain(&chain),
                });
            }

            stack.push((marker, registration.key.clone()));
            Ok(ResolutionGuard)
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with_borrow_mut(|stack| {
            stack.pop();
        });
    }
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a container whose lookups fall back to `self`.
    ///
    /// Bindings made on the child may shadow the parent's; the parent never
    /// sees them.
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(Inner {
                parent: Some(self.clone()),
                bindings: DashMap::new(),
            }),
        }
    }

    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    /// Lazily bind the value returned by `ctor`.
    ///
    /// The parameters of `ctor` are resolved from this container the first
    /// time the abstraction is resolved.
    pub fn provide<C, Args>(&self, ctor: C) -> Result<()>
    where
        C: Constructor<Args>,
    {
        self.provide_named("", ctor)
    }

    pub fn provide_named<C, Args>(&self, name: &str, ctor: C) -> Result<()>
    where
        C: Constructor<Args>,
    {
        let key = Key::named::<C::Output>(name);
        let dependencies = ctor.dependencies();
        let factory: Factory = Box::new(move |container| {
            let value = ctor.construct(container)?;
            Ok(Arc::new(value) as Instance)
        });

        self.bind(key, dependencies, factory, None)
    }

    /// Lazily bind a constructor that may fail.
    ///
    /// The error is reported, wrapped, when the abstraction is resolved. A
    /// failed construction is not cached; the next resolution tries again.
    pub fn provide_fallible<C, Args>(&self, ctor: C) -> Result<()>
    where
        C: FallibleConstructor<Args>,
    {
        self.provide_named_fallible("", ctor)
    }

    pub fn provide_named_fallible<C, Args>(&self, name: &str, ctor: C) -> Result<()>
    where
        C: FallibleConstructor<Args>,
    {
        let key = Key::named::<C::Output>(name);
        let dependencies = ctor.dependencies();
        let factory: Factory = Box::new(move |container| {
            let value = ctor.construct(container)?;
            Ok(Arc::new(value) as Instance)
        });

        self.bind(key, dependencies, factory, None)
    }

    /// Bind an already-built value.
    pub fn concrete<T>(&self, value: T) -> Result<()>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.named_concrete("", value)
    }

    pub fn named_concrete<T>(&self, name: &str, value: T) -> Result<()>
    where
        T: Clone + Send + Sync + 'static,
    {
        let instance: Instance = Arc::new(value);
        let cached = Arc::clone(&instance);
        let factory: Factory = Box::new(move |_| Ok(Arc::clone(&cached)));

        self.bind(Key::named::<T>(name), Vec::new(), factory, Some(instance))
    }

    /// Bind `Arc<S>`, built by [`Injectable::inject`].
    pub fn provide_injectable<S>(&self) -> Result<()>
    where
        S: Injectable + Send + Sync + 'static,
    {
        let factory: Factory = Box::new(|container| {
            let service = S::inject(container)?;
            Ok(Arc::new(Arc::new(service)) as Instance)
        });

        self.bind(Key::of::<Arc<S>>(), S::dependencies(), factory, None)
    }

    fn bind(
        &self,
        key: Key,
        dependencies: Vec<Key>,
        factory: Factory,
        instance: Option<Instance>,
    ) -> Result<()> {
        if key.type_info() == TypeInfo::of::<()>() {
            return Err(ContainerError::InvalidResolver { key });
        }

        if self.inner.bindings.contains_key(&key) {
            return Err(ContainerError::AlreadyBound(key));
        }

        let cycle = graph::find_cycle(&key, &dependencies, |dependency| {
            self.lookup(dependency)
                .map(|(_, registration)| registration.dependencies.clone())
        });
        if let Some(chain) = cycle {
            return Err(ContainerError::SelfDependency {
                chain: graph::render_chain(&chain),
                key,
            });
        }

        match self.inner.bindings.entry(key) {
            Entry::Occupied(entry) => Err(ContainerError::AlreadyBound(entry.key().clone())),
            Entry::Vacant(entry) => {
                tracing::debug!(abstraction = %entry.key(), "provider bound");
                let registration = Registration {
                    key: entry.key().clone(),
                    dependencies,
                    factory,
                    instance: Mutex::new(instance),
                };
                entry.insert(Arc::new(registration));
                Ok(())
            }
        }
    }

    /// Resolve the singleton bound to `T`, building it on first use.
    pub fn resolve<T>(&self) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.resolve_key(Key::of::<T>())
    }

    pub fn named_resolve<T>(&self, name: &str) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.resolve_key(Key::named::<T>(name))
    }

    fn resolve_key<T>(&self, key: Key) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let (owner, registration) = self
            .lookup(&key)
            .ok_or_else(|| ContainerError::NotFound(key.clone()))?;
        let instance = registration.make(&owner)?;

        (*instance)
            .downcast_ref::<T>()
            .cloned()
            .ok_or(ContainerError::DowncastFailed(key))
    }

    /// Find the registration for `key` and the container that owns it.
    fn lookup(&self, key: &Key) -> Option<(Container, Arc<Registration>)> {
        let mut current = Some(self);
        while let Some(container) = current {
            if let Some(registration) = container.inner.bindings.get(key) {
                return Some((container.clone(), Arc::clone(registration.value())));
            }
            current = container.inner.parent.as_ref();
        }
        None
    }

    /// Invoke `f` with its parameters resolved from the container.
    ///
    /// Unlike the `di` helpers this never panics: a missing dependency, a
    /// failing constructor and an error returned by `f` all come back as
    /// `Err`.
    pub fn call<F, Args>(&self, f: F) -> Result<()>
    where
        F: Receiver<Args>,
    {
        f.receive(self)
    }

    /// Populate the injectable fields of `target`.
    pub fn fill<S: Injectable>(&self, target: &mut S) -> Result<()> {
        target.fill(self)
    }

    /// Build `S` from its injectable fields.
    pub fn inject<S: Injectable>(&self) -> Result<S> {
        S::inject(self)
    }

    /// Drop every binding of this container. Parents are left untouched.
    pub fn reset(&self) {
        self.inner.bindings.clear();
        tracing::debug!("container reset");
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.lookup(&Key::of::<T>()).is_some()
    }

    pub fn contains_named<T: 'static>(&self, name: &str) -> bool {
        self.lookup(&Key::named::<T>(name)).is_some()
    }

    /// Number of bindings made on this container, excluding its parents.
    pub fn len(&self) -> usize {
        self.inner.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.bindings.is_empty()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("bindings", &self.inner.bindings.len())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

    trait Shape: fmt::Debug + Send + Sync {
        fn set_area(&self, area: i32);
        fn area(&self) -> i32;
    }

    #[derive(Debug)]
    struct Circle {
        a: AtomicI32,
    }

    impl Circle {
        fn new(a: i32) -> Self {
            Self { a: AtomicI32::new(a) }
        }
    }

    impl Shape for Circle {
        fn set_area(&self, area: i32) {
            self.a.store(area, Ordering::SeqCst);
        }

        fn area(&self) -> i32 {
            self.a.load(Ordering::SeqCst)
        }
    }

    trait Database: fmt::Debug + Send + Sync {
        fn connect(&self) -> bool;
    }

    #[derive(Debug)]
    struct MySql;

    impl Database for MySql {
        fn connect(&self) -> bool {
            true
        }
    }

    fn circle(a: i32) -> Arc<dyn Shape> {
        Arc::new(Circle::new(a))
    }

    #[test]
    fn test_provide_and_resolve_singleton() {
        let container = Container::new();
        container.provide(|| circle(13)).unwrap();

        let first = container.resolve::<Arc<dyn Shape>>().unwrap();
        first.set_area(666);

        let second = container.resolve::<Arc<dyn Shape>>().unwrap();
        assert_eq!(second.area(), 666);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_constructor_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let container = Container::new();
        container
            .provide(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                circle(1)
            })
            .unwrap();

        for _ in 0..5 {
            container.resolve::<Arc<dyn Shape>>().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_resolution_builds_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let container = Container::new();
        container
            .provide(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(20));
                circle(7)
            })
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let container = container.clone();
                std::thread::spawn(move || container.resolve::<Arc<dyn Shape>>().unwrap().area())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resolvable_arguments() {
        let container = Container::new();
        container.provide(|| circle(666)).unwrap();
        container
            .provide(|shape: Arc<dyn Shape>| {
                assert_eq!(shape.area(), 666);
                Arc::new(MySql) as Arc<dyn Database>
            })
            .unwrap();

        let database = container.resolve::<Arc<dyn Database>>().unwrap();
        assert!(database.connect());
    }

    #[test]
    fn test_missing_dependency() {
        let container = Container::new();
        let err = container.resolve::<Arc<dyn Shape>>().unwrap_err();

        assert!(matches!(err, ContainerError::NotFound(_)));
        assert!(err.to_string().starts_with("container: no concrete found for: "));
        assert!(err.to_string().contains("Shape"));
    }

    #[test]
    fn test_missing_dependency_in_chain_is_wrapped() {
        let container = Container::new();
        container
            .provide(|_shape: Arc<dyn Shape>| Arc::new(MySql) as Arc<dyn Database>)
            .unwrap();

        let err = container.resolve::<Arc<dyn Database>>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("encountered error while making concrete for"));
        assert!(message.contains("Database"));
        assert!(message.contains("no concrete found for"));
        assert!(message.contains("Shape"));
    }

    #[test]
    fn test_unit_output_is_rejected() {
        let container = Container::new();
        let err = container.provide(|| {}).unwrap_err();

        assert!(matches!(err, ContainerError::InvalidResolver { .. }));
        assert!(err.to_string().contains("resolver function signature is invalid"));
        assert!(container.is_empty());
    }

    #[test]
    fn test_self_dependency_is_rejected() {
        let container = Container::new();
        let err = container
            .provide(|shape: Arc<dyn Shape>| circle(shape.area()))
            .unwrap_err();

        assert!(matches!(err, ContainerError::SelfDependency { .. }));
        assert!(err.to_string().contains("depends on abstract it returns"));
    }

    #[test]
    fn test_transitive_self_dependency_is_rejected() {
        let container = Container::new();
        container
            .provide(|_shape: Arc<dyn Shape>| Arc::new(MySql) as Arc<dyn Database>)
            .unwrap();

        let err = container
            .provide(|_database: Arc<dyn Database>| circle(1))
            .unwrap_err();

        assert!(err.to_string().contains("depends on abstract it returns"));
        assert!(err.to_string().contains("Database"));
        assert!(!container.contains::<Arc<dyn Shape>>());
    }

    #[test]
    fn test_hidden_cycle_is_reported_not_deadlocked() {
        let container = Container::new();
        let inner = container.clone();
        container
            .provide_fallible(move || -> anyhow::Result<Arc<Circle>> {
                Ok(inner.resolve::<Arc<Circle>>()?)
            })
            .unwrap();

        let err = container.resolve::<Arc<Circle>>().unwrap_err();
        assert!(err.to_string().contains("circular dependency detected"));

        container.reset();
    }

    #[test]
    fn test_fallible_constructor_error() {
        let container = Container::new();
        container
            .provide_fallible(|| -> anyhow::Result<Arc<dyn Shape>> {
                Err(anyhow::anyhow!("app: error"))
            })
            .unwrap();

        let err = container.resolve::<Arc<dyn Shape>>().unwrap_err();
        assert!(matches!(err, ContainerError::Construction { .. }));
        assert!(err.to_string().ends_with("Error encountered: app: error"));
    }

    #[test]
    fn test_failed_construction_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        let container = Container::new();
        container
            .provide_fallible(move || -> anyhow::Result<Arc<dyn Shape>> {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("not yet");
                }
                Ok(circle(3))
            })
            .unwrap();

        assert!(container.resolve::<Arc<dyn Shape>>().is_err());
        assert_eq!(container.resolve::<Arc<dyn Shape>>().unwrap().area(), 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_named_bindings() {
        let container = Container::new();
        container.provide_named("theCircle", || circle(13)).unwrap();
        container.provide(|| circle(1)).unwrap();

        let named = container.named_resolve::<Arc<dyn Shape>>("theCircle").unwrap();
        let unnamed = container.resolve::<Arc<dyn Shape>>().unwrap();

        assert_eq!(named.area(), 13);
        assert_eq!(unnamed.area(), 1);
        assert!(container.contains_named::<Arc<dyn Shape>>("theCircle"));
        assert!(!container.contains_named::<Arc<dyn Shape>>("square"));
    }

    #[test]
    fn test_named_binding_may_wrap_unnamed_one() {
        let container = Container::new();
        container.provide(|| circle(2)).unwrap();
        container
            .provide_named("doubled", |base: Arc<dyn Shape>| circle(base.area() * 2))
            .unwrap();

        let doubled = container.named_resolve::<Arc<dyn Shape>>("doubled").unwrap();
        assert_eq!(doubled.area(), 4);
    }

    #[test]
    fn test_duplicate_binding_is_rejected() {
        let container = Container::new();
        container.provide(|| circle(1)).unwrap();

        let err = container.provide(|| circle(2)).unwrap_err();
        assert!(matches!(err, ContainerError::AlreadyBound(_)));

        container.reset();
        container.provide(|| circle(2)).unwrap();
        assert_eq!(container.resolve::<Arc<dyn Shape>>().unwrap().area(), 2);
    }

    #[test]
    fn test_concrete() {
        let container = Container::new();
        container.concrete(String::from("nossas")).unwrap();
        container.named_concrete("port", 8080_u16).unwrap();

        assert_eq!(container.resolve::<String>().unwrap(), "nossas");
        assert_eq!(container.named_resolve::<u16>("port").unwrap(), 8080);
    }

    #[test]
    fn test_child_falls_back_to_parent() {
        let parent = Container::new();
        parent.provide(|| circle(10)).unwrap();

        let child = parent.child();
        child.concrete(5_i32).unwrap();

        let from_child = child.resolve::<Arc<dyn Shape>>().unwrap();
        let from_parent = parent.resolve::<Arc<dyn Shape>>().unwrap();
        assert!(Arc::ptr_eq(&from_child, &from_parent));

        assert!(child.contains::<i32>());
        assert!(!parent.contains::<i32>());
        assert_eq!(child.len(), 1);
    }

    #[test]
    fn test_child_may_shadow_parent() {
        let parent = Container::new();
        parent.provide(|| circle(10)).unwrap();

        let child = parent.child();
        child.provide(|| circle(20)).unwrap();

        assert_eq!(child.resolve::<Arc<dyn Shape>>().unwrap().area(), 20);
        assert_eq!(parent.resolve::<Arc<dyn Shape>>().unwrap().area(), 10);
    }

    #[test]
    fn test_call() {
        let container = Container::new();
        container.provide(|| circle(5)).unwrap();
        container.provide(|| Arc::new(MySql) as Arc<dyn Database>).unwrap();

        container
            .call(|shape: Arc<dyn Shape>| shape.set_area(666))
            .unwrap();
        container
            .call(|shape: Arc<dyn Shape>, database: Arc<dyn Database>| {
                assert_eq!(shape.area(), 666);
                assert!(database.connect());
            })
            .unwrap();
    }

    #[test]
    fn test_call_with_unbound_argument() {
        let container = Container::new();
        container.provide(|| circle(0)).unwrap();

        let err = container
            .call(|_shape: Arc<dyn Shape>, _database: Arc<dyn Database>| {})
            .unwrap_err();
        assert!(matches!(err, ContainerError::NotFound(_)));
        assert!(err.to_string().contains("no concrete found for"));
    }

    #[test]
    fn test_call_returning_error() {
        let container = Container::new();
        container.provide(|| circle(0)).unwrap();

        let err = container
            .call(|_shape: Arc<dyn Shape>| -> anyhow::Result<()> {
                Err(anyhow::anyhow!("app: some context error"))
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "app: some context error");

        let ok = container.call(|_shape: Arc<dyn Shape>| -> anyhow::Result<()> { Ok(()) });
        assert!(ok.is_ok());
    }
}
