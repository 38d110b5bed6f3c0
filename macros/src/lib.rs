use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr};

/// 为结构体实现 `livecfg::ConfigObject`
///
/// 每个命名字段对应一个 `prefix.<field>` 配置 key，字段类型必须实现 `PropertyType`。
///
/// 支持的属性：
/// - `#[config(name = "...")]`: 覆盖字段对应的 key 名
/// - `#[config(skip)]`: 不参与绑定，保持 `Default` 值
///
/// # 示例
/// ```ignore
/// use livecfg::ConfigObject;
///
/// #[derive(Debug, Default, Clone, ConfigObject)]
/// struct Pool {
///     size: i32,
///     #[config(name = "idle-timeout")]
///     idle_timeout: std::time::Duration,
/// }
/// ```
#[proc_macro_derive(ConfigObject, attributes(config))]
pub fn config_object_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(e) => TokenStream::from(e.to_compile_error()),
    }
}

struct FieldAttrs {
    name: Option<String>,
    skip: bool,
}

fn parse_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs {
        name: None,
        skip: false,
    };
    for attr in &field.attrs {
        if !attr.path().is_ident("config") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                attrs.skip = true;
                Ok(())
            } else if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                attrs.name = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"` or `skip`"))
            }
        })?;
    }
    Ok(attrs)
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    struct_name,
                    "ConfigObject can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "ConfigObject can only be derived for structs",
            ))
        }
    };

    let mut specs = Vec::new();
    let mut arms = Vec::new();
    for field in fields {
        let attrs = parse_attrs(field)?;
        if attrs.skip {
            continue;
        }
        let ident = field.ident.as_ref().ok_or_else(|| {
            syn::Error::new_spanned(field, "ConfigObject requires named fields")
        })?;
        let ty = &field.ty;
        let key = attrs.name.unwrap_or_else(|| ident.to_string());

        specs.push(quote! {
            ::livecfg::binder::FieldSpec::new(
                #key,
                <#ty as ::livecfg::PropertyType>::descriptor(),
            )
        });
        arms.push(quote! {
            #key => {
                let raw = value.to_string();
                self.#ident = <#ty as ::livecfg::PropertyType>::from_value(value).ok_or_else(|| {
                    ::livecfg::BindingError::new(
                        &raw,
                        <#ty as ::livecfg::PropertyType>::descriptor(),
                        "value does not match field type",
                    )
                })?;
            }
        });
    }

    Ok(quote! {
        impl #impl_generics ::livecfg::ConfigObject for #struct_name #ty_generics #where_clause {
            fn fields() -> ::std::vec::Vec<::livecfg::binder::FieldSpec> {
                ::std::vec![#(#specs),*]
            }

            fn apply_field(
                &mut self,
                field: &str,
                value: ::livecfg::binder::Value,
            ) -> ::std::result::Result<(), ::livecfg::BindingError> {
                match field {
                    #(#arms)*
                    _ => {}
                }
                ::std::result::Result::Ok(())
            }
        }
    })
}
