use proc_macro::TokenStream;

mod injectable;

/// Derive macro for populating a struct from the DI container
///
/// Every named field is resolved by its type. Field attributes:
///
/// - `#[inject(name)]` resolves the binding named after the field
/// - `#[inject(name = "primary")]` resolves the binding with that name
/// - `#[inject(skip)]` uses `Default` in `inject` and is left alone by `fill`
///
/// # Example
/// ```ignore
/// use kiln::Injectable;
///
/// #[derive(Injectable)]
/// pub struct SettlementService {
///     repository: Arc<dyn ExpenseRepository>,
///     #[inject(name = "currency")]
///     currency: String,
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable(input)
}
