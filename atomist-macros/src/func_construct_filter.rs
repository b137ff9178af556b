use crate::prelude::*;

const OPERATORS: &[&str] = &["Eq", "Ne", "Gt", "Gte", "Lt", "Lte", "In", "Nin", "Exists"];

struct Input {
    module: Ident,
    fields: Punctuated<FilterField, Token![,]>,
}

impl Parse for Input {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let module = input.parse()?;
        input.parse::<Token![,]>()?;
        let fields = Punctuated::parse_terminated(input)?;
        Ok(Self { module, fields })
    }
}

/// `field: value` or `field: Operator(operand)`.
struct FilterField {
    ident: Ident,
    operator: Ident,
    operand: Expr,
}

impl Parse for FilterField {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let ident = input.parse()?;
        input.parse::<Token![:]>()?;

        let value = input.parse::<Expr>()?;

        if let Some((operator, operand)) = split_operator(&value) {
            return Ok(Self {
                ident,
                operator,
                operand,
            });
        }

        Ok(Self {
            ident,
            operator: parse_quote! { Eq },
            operand: value,
        })
    }
}

fn split_operator(value: &Expr) -> Option<(Ident, Expr)> {
    let Expr::Call(call) = value else {
        return None;
    };

    let Expr::Path(path) = call.func.as_ref() else {
        return None;
    };

    let operator = path.path.get_ident()?;

    if call.args.len() != 1 || !OPERATORS.iter().any(|known| operator == known) {
        return None;
    }

    Some((operator.clone(), call.args[0].clone()))
}

pub fn func_construct_filter(input: TokenStream) -> Result<TokenStream> {
    let input = parse2::<Input>(input)?;

    let output = build(&input);

    Ok(output)
}

fn build(input: &Input) -> TokenStream {
    let krate = krate();
    let module = &input.module;

    let fields = input.fields.iter().map(|field| {
        let FilterField {
            ident,
            operator,
            operand,
        } = field;

        quote! {
            #ident: #krate::Field::Set(#krate::FilterOperator::#operator(#operand))
        }
    });

    quote! {
        #module::TypedFilter {
            #( #fields, )*
            ..::std::default::Default::default()
        }
    }
}
