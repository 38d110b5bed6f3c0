//! 字段绑定
//!
//! 把原始字符串转换为强类型值。绑定目标在构造时声明（字段名、类型描述、声明方式），
//! 不合法的声明在构造 `FieldBinder` 时立即返回 `DeclarationError`。
//!
//! # 示例
//! ```
//! use livecfg::binder::{FieldBinder, FieldSpec, TypeDescriptor, Value};
//!
//! let binder = FieldBinder::new(
//!     FieldSpec::new("ports", TypeDescriptor::list_of(TypeDescriptor::Int)),
//!     "server.ports",
//! ).unwrap();
//!
//! let value = binder.bind("8080,8081").unwrap();
//! assert_eq!(value, Value::List(vec![Value::Int(8080), Value::Int(8081)]));
//! ```

pub mod descriptor;
pub mod duration;
pub mod parse;
pub mod value;

pub use descriptor::{Declaration, FieldSpec, TypeDescriptor};
pub use duration::{format_duration, parse_duration, HumanDur};
pub use parse::parse_value;
pub use value::Value;

use crate::error::{BindingError, DeclarationError};

/// 单个字段的绑定器
#[derive(Debug, Clone)]
pub struct FieldBinder {
    field: FieldSpec,
    property: String,
}

impl FieldBinder {
    /// 创建绑定器
    ///
    /// # 参数
    /// - `field`: 目标字段声明
    /// - `property`: 字段对应的配置 key
    ///
    /// # 错误
    /// - `static`/`final` 声明的字段
    /// - 未声明元素类型的容器，或元素本身是容器
    pub fn new(field: FieldSpec, property: impl Into<String>) -> Result<Self, DeclarationError> {
        if !field.declaration.is_bindable() {
            return Err(DeclarationError::StaticOrFinal { field: field.name });
        }
        if !field.kind.is_supported() {
            return Err(DeclarationError::UnsupportedType {
                kind: field.kind.to_string(),
                field: field.name,
            });
        }
        Ok(Self {
            field,
            property: property.into(),
        })
    }

    /// 为单个配置 key 创建绑定器，字段名即 key
    pub fn for_property(
        property: impl Into<String>,
        kind: TypeDescriptor,
    ) -> Result<Self, DeclarationError> {
        let property = property.into();
        Self::new(FieldSpec::new(property.clone(), kind), property)
    }

    /// 内置类型的描述总是合法，跳过声明检查
    pub(crate) fn for_builtin(property: impl Into<String>, kind: TypeDescriptor) -> Self {
        let property = property.into();
        Self {
            field: FieldSpec::new(property.clone(), kind),
            property,
        }
    }

    pub fn field(&self) -> &FieldSpec {
        &self.field
    }

    pub fn kind(&self) -> &TypeDescriptor {
        &self.field.kind
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    /// 绑定原始值
    pub fn bind(&self, raw: &str) -> Result<Value, BindingError> {
        parse_value(raw, &self.field.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn binder(name: &str, kind: TypeDescriptor) -> FieldBinder {
        FieldBinder::new(FieldSpec::new(name, kind), "dummy").unwrap()
    }

    #[test]
    fn test_primitive_fields() {
        assert_eq!(binder("iii", TypeDescriptor::Int).bind("1").unwrap(), Value::Int(1));
        assert_eq!(
            binder("ddd", TypeDescriptor::Double).bind("1E+7").unwrap(),
            Value::Double(1e7)
        );
        assert_eq!(
            binder("bbb", TypeDescriptor::Bool).bind("false").unwrap(),
            Value::Bool(false)
        );
        assert_eq!(binder("lll", TypeDescriptor::Long).bind("1").unwrap(), Value::Long(1));
    }

    #[test]
    fn test_non_primitive_fields() {
        assert_eq!(
            binder("str", TypeDescriptor::String).bind("just str").unwrap(),
            Value::String("just str".to_string())
        );
        assert_eq!(
            binder("duration", TypeDescriptor::Duration).bind("100ms").unwrap(),
            Value::Duration(Duration::from_millis(100))
        );
    }

    #[test]
    fn test_untyped_list_not_supported() {
        let err = FieldBinder::new(FieldSpec::new("list", TypeDescriptor::untyped_list()), "dummy")
            .unwrap_err();
        assert!(matches!(err, DeclarationError::UnsupportedType { ref field, .. } if field == "list"));
        assert!(err.to_string().starts_with("unsupported type on field"));
    }

    #[test]
    fn test_static_or_final_fields_not_supported() {
        for declaration in [
            Declaration::Static,
            Declaration::Final,
            Declaration::StaticFinal,
        ] {
            let field = FieldSpec::new("default_instance", TypeDescriptor::Int)
                .with_declaration(declaration);
            let err = FieldBinder::new(field, "dummy").unwrap_err();
            assert!(err
                .to_string()
                .starts_with("'static' or 'final' declaration is not supported"));
        }
    }

    #[test]
    fn test_roundtrip_through_display() {
        let cases = [
            (TypeDescriptor::Int, "-42"),
            (TypeDescriptor::Double, "2.5E-3"),
            (TypeDescriptor::Bool, "true"),
            (TypeDescriptor::Duration, "1h30m15s"),
            (TypeDescriptor::Duration, "250ms"),
            (TypeDescriptor::list_of(TypeDescriptor::Long), "1, 2, 3"),
            (TypeDescriptor::multimap_of(TypeDescriptor::Int), "k1=1,k2=2,3,4,k3=5"),
        ];

        for (kind, raw) in cases {
            let binder = FieldBinder::for_property("dummy", kind).unwrap();
            let value = binder.bind(raw).unwrap();
            assert_eq!(binder.bind(&value.to_string()).unwrap(), value, "{}", raw);
        }
    }
}
