#[warn(clippy::pedantic)]
#[allow(clippy::too_many_lines)]
mod derive_entity;
mod func_construct_filter;
mod prelude;
mod utils;

fn expand<F: FnOnce(proc_macro2::TokenStream) -> syn::Result<proc_macro2::TokenStream>>(
    fun: F,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    fun(input.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Implements `atomist::Entity` and generates the entity's helper module
/// (`TypedFilter`, `filter!`, `Fields`).
///
/// Accepts `#[entity(collection = "name")]` to override the collection name.
#[proc_macro_derive(Entity, attributes(entity))]
pub fn entity(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    expand(derive_entity::derive_entity, input)
}

#[proc_macro]
pub fn construct_filter(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    expand(func_construct_filter::func_construct_filter, input)
}
