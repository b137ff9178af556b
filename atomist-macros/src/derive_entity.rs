use crate::{
    prelude::*,
    utils::{build_fields_enum, extract_named_fields, extract_serde_rename, field_lit, mongodb},
};

#[derive(FromAttributes)]
#[darling(attributes(entity))]
struct Attributes {
    #[darling(default)]
    collection: Option<String>,
}

pub fn derive_entity(item: TokenStream) -> Result<TokenStream> {
    let input = parse2::<DeriveInput>(item)?;

    let attributes = Attributes::from_attributes(&input.attrs)?;

    let (id_ty, fields) = {
        let fields_named = extract_named_fields(input.span(), input.data)?;

        let fields_span = fields_named.span();

        let mut id_ty = None;
        let mut fields = vec![];

        for field in fields_named.named {
            let rename = extract_serde_rename(&field);

            let Some(ident) = field.ident.clone() else {
                return Err(Error::new_spanned(&field, "expected named field"));
            };

            if ident == "id" {
                if rename.as_deref() != Some("_id") {
                    return Err(Error::new_spanned(
                        &field,
                        "id field must have `#[serde(rename = \"_id\")]`",
                    ));
                }

                id_ty = Some(field.ty.clone());
            }

            fields.push(FieldConfig {
                lit: field_lit(&ident, rename.as_deref()),
                ident,
                ty: field.ty,
            });
        }

        let Some(id_ty) = id_ty else {
            return Err(Error::new(fields_span, "an entity must have an `id` field"));
        };

        (id_ty, fields)
    };

    let output = build(
        &input.vis,
        &input.ident,
        &id_ty,
        &fields,
        attributes.collection.as_deref(),
    );

    Ok(output)
}

struct FieldConfig {
    ident: Ident,
    ty: Type,
    lit: LitStr,
}

fn build(
    vis: &Visibility,
    ident: &Ident,
    id_ty: &Type,
    fields: &[FieldConfig],
    collection: Option<&str>,
) -> TokenStream {
    let krate = krate();
    let mongodb = mongodb();

    let lowercase_entity = ident.to_string().to_snake_case();

    let mod_ident = Ident::new(&lowercase_entity, Span::call_site());

    let collection_name = LitStr::new(
        collection.unwrap_or_else(|| {
            lowercase_entity
                .strip_suffix("_entity")
                .unwrap_or(&lowercase_entity)
        }),
        Span::call_site(),
    );

    let field_idents = fields.iter().map(|field| &field.ident).collect_vec();

    let field_types = fields.iter().map(|field| &field.ty).collect_vec();

    let field_lits = fields.iter().map(|field| &field.lit).collect_vec();

    let filter_field_types = field_types.iter().map(|ty| {
        if let Type::Path(type_path) = ty {
            if type_path.qself.is_none() {
                if let Some(ident) = type_path.path.get_ident() {
                    if ident == "String" {
                        return parse_quote! { str };
                    }
                }
            }
        }

        (*ty).to_owned()
    });

    let fields_enum = build_fields_enum(field_idents.iter().copied(), field_lits.iter().copied());

    quote! {
        #vis mod #mod_ident {
            use super::*;

            impl #krate::Entity for #ident {
                type Id = #id_ty;

                const COLLECTION_NAME: &'static str = #collection_name;

                fn id(&self) -> <Self as #krate::Entity>::Id {
                    self.id
                }

                fn has_field(field: &str) -> bool {
                    ::std::matches!(field, #( #field_lits )|*)
                }

                fn coerce(
                    field: &str,
                    value: #mongodb::bson::Bson,
                ) -> #mongodb::error::Result<#mongodb::bson::Bson> {
                    match field {
                        #(
                            #field_lits => {
                                let typed: #field_types = #mongodb::bson::from_bson(value)?;
                                ::std::result::Result::Ok(#mongodb::bson::to_bson(&typed)?)
                            }
                        )*
                        _ => ::std::result::Result::Ok(value),
                    }
                }
            }

            #[derive(::std::fmt::Debug, ::std::default::Default)]
            pub struct TypedFilter<'a> {
                #(
                    pub #field_idents:
                        #krate::Field<#krate::FilterOperator<'a, #filter_field_types>>
                ),*
            }

            impl #krate::Filter<#ident> for TypedFilter<'_> {
                fn to_document(&self) -> #mongodb::bson::Document {
                    let mut document = #mongodb::bson::doc! {};

                    #(
                        if let #krate::Field::Set(val) = &self.#field_idents {
                            #mongodb::bson::Document::insert(
                                &mut document,
                                #field_lits,
                                #krate::FilterOperator::to_document(val)
                            );
                        }
                    )*

                    document
                }
            }

            impl ::std::convert::From<TypedFilter<'_>> for #krate::Criteria {
                fn from(value: TypedFilter<'_>) -> Self {
                    #krate::Criteria::Document(
                        <TypedFilter<'_> as #krate::Filter<#ident>>::to_document(&value)
                    )
                }
            }

            #fields_enum

            #[allow(unused_macros)]
            macro_rules! filter {
                ($( $input: tt )*) => {
                   #krate::construct_filter!(#mod_ident, $( $input )*)
                };
            }

            #[allow(unused_imports)]
            pub(crate) use filter;
        }
    }
}
