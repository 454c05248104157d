use crate::di::Container;
use crate::di::constructor::{Constructor, FallibleConstructor};
use crate::error::Result;

type Binding = Box<dyn FnOnce(&Container) -> Result<()>>;

/// Builder for wiring a container in one expression.
///
/// Bindings are applied in the order they were added when [`build`] is
/// called; the first failing binding aborts the build.
///
/// # Example
/// ```
/// use kiln::ContainerBuilder;
/// use std::sync::Arc;
///
/// let container = ContainerBuilder::new()
///     .concrete(String::from("postgres://localhost/splits"))
///     .provide(|url: String| Arc::new(url.len()))
///     .build()
///     .unwrap();
///
/// assert_eq!(*container.resolve::<Arc<usize>>().unwrap(), 27);
/// ```
///
/// [`build`]: ContainerBuilder::build
#[derive(Default)]
pub struct ContainerBuilder {
    parent: Option<Container>,
    bindings: Vec<Binding>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a child of `parent` instead of a root container.
    pub fn parent(mut self, parent: &Container) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Bind an already-built value
    pub fn concrete<T>(self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.with(move |container| container.concrete(value))
    }

    /// Bind a lazily constructed value
    pub fn provide<C, Args>(self, ctor: C) -> Self
    where
        C: Constructor<Args>,
    {
        self.with(move |container| container.provide(ctor))
    }

    pub fn provide_named<C, Args>(self, name: &str, ctor: C) -> Self
    where
        C: Constructor<Args>,
    {
        let name = name.to_owned();
        self.with(move |container| container.provide_named(&name, ctor))
    }

    pub fn provide_fallible<C, Args>(self, ctor: C) -> Self
    where
        C: FallibleConstructor<Args>,
    {
        self.with(move |container| container.provide_fallible(ctor))
    }

    fn with<F>(mut self, binding: F) -> Self
    where
        F: FnOnce(&Container) -> Result<()> + 'static,
    {
        self.bindings.push(Box::new(binding));
        self
    }

    /// Build the container
    pub fn build(self) -> Result<Container> {
        let container = match &self.parent {
            Some(parent) => parent.child(),
            None => Container::new(),
        };

        for binding in self.bindings {
            binding(&container)?;
        }

        Ok(container)
    }
}
