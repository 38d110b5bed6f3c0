//! 类型描述符
//!
//! 绑定目标的种类是一个封闭集合：基础类型、时长、列表、多值映射。
//! 描述符在属性构造时显式给出，不做运行时反射。

use std::fmt;

/// 绑定目标的类型标签
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Bool,
    Char,
    Int,
    Long,
    Float,
    Double,
    String,
    Duration,
    /// 逗号分隔的有序列表，`None` 表示未声明元素类型
    List(Option<Box<TypeDescriptor>>),
    /// `k1=v1,v2,k2=v3` 形式的多值映射，`None` 表示未声明元素类型
    Multimap(Option<Box<TypeDescriptor>>),
}

impl TypeDescriptor {
    pub fn list_of(element: TypeDescriptor) -> Self {
        Self::List(Some(Box::new(element)))
    }

    pub fn multimap_of(element: TypeDescriptor) -> Self {
        Self::Multimap(Some(Box::new(element)))
    }

    pub fn untyped_list() -> Self {
        Self::List(None)
    }

    pub fn untyped_multimap() -> Self {
        Self::Multimap(None)
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Multimap(_))
    }

    /// 是否可以作为绑定目标
    ///
    /// 容器必须声明元素类型，且元素只能是标量
    pub fn is_supported(&self) -> bool {
        match self {
            Self::List(Some(element)) | Self::Multimap(Some(element)) => element.is_scalar(),
            Self::List(None) | Self::Multimap(None) => false,
            _ => true,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Char => write!(f, "char"),
            Self::Int => write!(f, "int"),
            Self::Long => write!(f, "long"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::String => write!(f, "string"),
            Self::Duration => write!(f, "duration"),
            Self::List(Some(element)) => write!(f, "list<{}>", element),
            Self::List(None) => write!(f, "list<?>"),
            Self::Multimap(Some(element)) => write!(f, "multimap<{}>", element),
            Self::Multimap(None) => write!(f, "multimap<?>"),
        }
    }
}

/// 字段的声明方式
///
/// 只有实例级可变字段可以作为绑定目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Declaration {
    #[default]
    Instance,
    /// 类型级单例
    Static,
    /// 声明后不可变
    Final,
    StaticFinal,
}

impl Declaration {
    pub fn is_bindable(&self) -> bool {
        matches!(self, Self::Instance)
    }
}

/// 绑定目标字段的声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: TypeDescriptor,
    pub declaration: Declaration,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            kind,
            declaration: Declaration::Instance,
        }
    }

    pub fn with_declaration(mut self, declaration: Declaration) -> Self {
        self.declaration = declaration;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(TypeDescriptor::Int.to_string(), "int");
        assert_eq!(
            TypeDescriptor::list_of(TypeDescriptor::Duration).to_string(),
            "list<duration>"
        );
        assert_eq!(TypeDescriptor::untyped_list().to_string(), "list<?>");
        assert_eq!(
            TypeDescriptor::multimap_of(TypeDescriptor::Int).to_string(),
            "multimap<int>"
        );
    }

    #[test]
    fn test_supported_kinds() {
        assert!(TypeDescriptor::String.is_supported());
        assert!(TypeDescriptor::list_of(TypeDescriptor::Long).is_supported());
        assert!(!TypeDescriptor::untyped_list().is_supported());
        assert!(!TypeDescriptor::untyped_multimap().is_supported());
        assert!(!TypeDescriptor::list_of(TypeDescriptor::list_of(TypeDescriptor::Int)).is_supported());
    }

    #[test]
    fn test_declaration_default_is_instance() {
        let field = FieldSpec::new("port", TypeDescriptor::Int);
        assert!(field.declaration.is_bindable());
        assert!(!field.with_declaration(Declaration::Final).declaration.is_bindable());
    }
}
