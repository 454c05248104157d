use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Field, Fields, LitStr, Token, parse_macro_input};

pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    generate_injectable_impl(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Where a field's value comes from.
enum Source {
    Type,
    Named(String),
    Skip,
}

struct InjectField<'a> {
    field: &'a Field,
    source: Source,
}

fn generate_injectable_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    struct_name,
                    "#[derive(Injectable)] only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "#[derive(Injectable)] can only be applied to structs",
            ));
        }
    };

    let fields = fields
        .iter()
        .map(|field| {
            Ok(InjectField {
                field,
                source: parse_source(field)?,
            })
        })
        .collect::<syn::Result<Vec<_>>>()?;

    let dependencies = fields.iter().filter_map(|f| {
        let ty = &f.field.ty;
        let name = binding_name(&f.source)?;
        Some(quote! { ::kiln::Key::named::<#ty>(#name) })
    });

    let injections = fields.iter().map(|f| {
        let ident = &f.field.ident;
        match binding_name(&f.source) {
            Some(name) => {
                let resolve = resolve_field(f.field, &name);
                quote! { #ident: #resolve }
            }
            None => quote! { #ident: ::core::default::Default::default() },
        }
    });

    // Every field is resolved before any is assigned, so a failed fill
    // leaves the struct untouched.
    let filled: Vec<_> = fields
        .iter()
        .filter_map(|f| {
            let ident = f.field.ident.as_ref()?;
            let name = binding_name(&f.source)?;
            Some((ident, resolve_field(f.field, &name)))
        })
        .collect();

    let resolves = filled.iter().map(|(ident, resolve)| {
        let local = format_ident!("__kiln_{}", ident);
        quote! { let #local = #resolve; }
    });

    let assigns = filled.iter().map(|(ident, _)| {
        let local = format_ident!("__kiln_{}", ident);
        quote! { self.#ident = #local; }
    });

    Ok(quote! {
        impl #impl_generics ::kiln::Injectable for #struct_name #ty_generics #where_clause {
            fn dependencies() -> ::std::vec::Vec<::kiln::Key> {
                ::std::vec![#(#dependencies),*]
            }

            #[allow(unused_variables)]
            fn inject(
                container: &::kiln::Container
            ) -> ::kiln::Result<Self> {
                ::core::result::Result::Ok(Self {
                    #(#injections),*
                })
            }

            #[allow(unused_variables)]
            fn fill(
                &mut self,
                container: &::kiln::Container
            ) -> ::kiln::Result<()> {
                #(#resolves)*
                #(#assigns)*
                ::core::result::Result::Ok(())
            }
        }
    })
}

/// The binding name to resolve, or `None` for skipped fields.
fn binding_name(source: &Source) -> Option<LitStr> {
    let span = proc_macro2::Span::call_site();
    match source {
        Source::Type => Some(LitStr::new("", span)),
        Source::Named(name) => Some(LitStr::new(name, span)),
        Source::Skip => None,
    }
}

fn resolve_field(field: &Field, name: &LitStr) -> TokenStream2 {
    let ty = &field.ty;
    let field_name = field
        .ident
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();

    quote! {
        container
            .named_resolve::<#ty>(#name)
            .map_err(|err| ::kiln::ContainerError::field(#field_name, err))?
    }
}

fn parse_source(field: &Field) -> syn::Result<Source> {
    let mut source = Source::Type;

    for attr in &field.attrs {
        if !attr.path().is_ident("inject") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                source = Source::Skip;
                Ok(())
            } else if meta.path.is_ident("name") {
                source = if meta.input.peek(Token![=]) {
                    let name: LitStr = meta.value()?.parse()?;
                    Source::Named(name.value())
                } else {
                    let ident = field
                        .ident
                        .as_ref()
                        .ok_or_else(|| meta.error("`name` needs a named field"))?;
                    Source::Named(ident.to_string())
                };
                Ok(())
            } else {
                Err(meta.error("expected `name`, `name = \"...\"` or `skip`"))
            }
        })?;
    }

    Ok(source)
}
