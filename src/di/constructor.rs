//! Constructor and receiver traits.
//!
//! Plain functions and closures become providers through these traits: every
//! parameter is resolved from the container by its type, and the parameter
//! types are reported up front so the container can check the dependency
//! graph before anything is built. Implementations exist for up to eight
//! parameters.

use super::{Container, Key};
use crate::error::{ContainerError, Result};

/// A function `Fn(A1, .., An) -> T` that builds an abstraction from other
/// abstractions.
pub trait Constructor<Args>: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    /// Keys of the parameters, in declaration order.
    fn dependencies(&self) -> Vec<Key>;

    /// Resolve every parameter and call the function.
    fn construct(&self, container: &Container) -> anyhow::Result<Self::Output>;
}

/// A function `Fn(A1, .., An) -> Result<T, E>`.
///
/// Kept apart from [`Constructor`] so that a provider returning `Result` is
/// never mistaken for one binding the `Result` type itself.
pub trait FallibleConstructor<Args>: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    fn dependencies(&self) -> Vec<Key>;

    fn construct(&self, container: &Container) -> anyhow::Result<Self::Output>;
}

/// A function invoked once through [`Container::call`].
pub trait Receiver<Args> {
    fn receive(self, container: &Container) -> Result<()>;
}

/// What a receiver may return: nothing, or `Result<(), E>`.
pub trait CallOutput {
    fn into_result(self) -> anyhow::Result<()>;
}

impl CallOutput for () {
    fn into_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<E> CallOutput for std::result::Result<(), E>
where
    E: Into<anyhow::Error>,
{
    fn into_result(self) -> anyhow::Result<()> {
        self.map_err(Into::into)
    }
}

macro_rules! impl_constructors {
    ($($ty:ident),*) => {
        impl<F, T, $($ty,)*> Constructor<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> T + Send + Sync + 'static,
            T: Clone + Send + Sync + 'static,
            $($ty: Clone + Send + Sync + 'static,)*
        {
            type Output = T;

            fn dependencies(&self) -> Vec<Key> {
                vec![$(Key::of::<$ty>()),*]
            }

            #[allow(non_snake_case, unused_variables)]
            fn construct(&self, container: &Container) -> anyhow::Result<T> {
                $(let $ty = container.resolve::<$ty>()?;)*
                Ok((self)($($ty),*))
            }
        }

        impl<F, T, E, $($ty,)*> FallibleConstructor<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> std::result::Result<T, E> + Send + Sync + 'static,
            T: Clone + Send + Sync + 'static,
            E: Into<anyhow::Error>,
            $($ty: Clone + Send + Sync + 'static,)*
        {
            type Output = T;

            fn dependencies(&self) -> Vec<Key> {
                vec![$(Key::of::<$ty>()),*]
            }

            #[allow(non_snake_case, unused_variables)]
            fn construct(&self, container: &Container) -> anyhow::Result<T> {
                $(let $ty = container.resolve::<$ty>()?;)*
                (self)($($ty),*).map_err(Into::into)
            }
        }

        impl<F, R, $($ty,)*> Receiver<($($ty,)*)> for F
        where
            F: FnOnce($($ty),*) -> R,
            R: CallOutput,
            $($ty: Clone + Send + Sync + 'static,)*
        {
            #[allow(non_snake_case, unused_variables)]
            fn receive(self, container: &Container) -> Result<()> {
                $(let $ty = container.resolve::<$ty>()?;)*
                (self)($($ty),*)
                    .into_result()
                    .map_err(ContainerError::Receiver)
            }
        }
    };
}

impl_constructors!();
impl_constructors!(A1);
impl_constructors!(A1, A2);
impl_constructors!(A1, A2, A3);
impl_constructors!(A1, A2, A3, A4);
impl_constructors!(A1, A2, A3, A4, A5);
impl_constructors!(A1, A2, A3, A4, A5, A6);
impl_constructors!(A1, A2, A3, A4, A5, A6, A7);
impl_constructors!(A1, A2, A3, A4, A5, A6, A7, A8);
