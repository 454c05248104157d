use crate::di::{Container, Key};
use crate::error::Result;

/// Types whose fields can be populated from the container.
///
/// This trait is typically implemented via `#[derive(Injectable)]`. Fields
/// are resolved by their type; `#[inject(name)]` resolves by the field name
/// and `#[inject(name = "...")]` by an explicit name. Fields marked
/// `#[inject(skip)]` are left alone.
///
/// # Example
/// ```
/// use kiln::{Container, Injectable};
/// use std::sync::Arc;
///
/// trait Ledger: Send + Sync {}
/// struct MemoryLedger;
/// impl Ledger for MemoryLedger {}
///
/// #[derive(Injectable)]
/// struct SplitService {
///     ledger: Arc<dyn Ledger>,
///     #[inject(name = "currency")]
///     currency: String,
/// }
///
/// let container = Container::new();
/// container.provide(|| Arc::new(MemoryLedger) as Arc<dyn Ledger>).unwrap();
/// container.named_concrete("currency", String::from("EUR")).unwrap();
///
/// let service: SplitService = container.inject().unwrap();
/// assert_eq!(service.currency, "EUR");
/// ```
pub trait Injectable: Sized {
    /// Keys of the injected fields.
    fn dependencies() -> Vec<Key> {
        Vec::new()
    }

    /// Create an instance by resolving every injected field.
    ///
    /// # Errors
    /// Returns an error naming the first field that could not be resolved.
    fn inject(container: &Container) -> Result<Self>;

    /// Overwrite the injected fields of an existing value.
    ///
    /// On error `self` is left unchanged.
    fn fill(&mut self, container: &Container) -> Result<()> {
        *self = Self::inject(container)?;
        Ok(())
    }
}
