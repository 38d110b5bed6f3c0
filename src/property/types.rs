//! Rust 类型与 `TypeDescriptor` 的对应关系

use std::time::Duration;

use crate::binder::{TypeDescriptor, Value};

/// 可以作为属性值的类型
///
/// `descriptor()` 决定绑定规则，`from_value`/`to_value` 在 `Value` 与具体类型之间转换
pub trait PropertyType: Clone + Send + Sync + 'static {
    fn descriptor() -> TypeDescriptor;

    fn from_value(value: Value) -> Option<Self>;

    fn to_value(&self) -> Value;
}

/// 可以作为容器元素的标量类型
pub trait ScalarType: PropertyType {}

macro_rules! impl_scalar_type {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl PropertyType for $ty {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::$variant
                }

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }
            }

            impl ScalarType for $ty {}
        )*
    };
}

impl_scalar_type!(
    bool => Bool,
    char => Char,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
    Duration => Duration,
);

impl<T: ScalarType> PropertyType for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::list_of(T::descriptor())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(T::to_value).collect())
    }
}

/// 保持 key 顺序的多值映射
#[derive(Debug, Clone, PartialEq)]
pub struct Multimap<T> {
    entries: Vec<(String, Vec<T>)>,
}

impl<T> Default for Multimap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Multimap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加值，key 不存在时按出现顺序新增
    pub fn push(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    pub fn get(&self, key: &str) -> Option<&[T]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.entries
            .iter()
            .map(|(k, values)| (k.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<(String, Vec<T>)> {
        self.entries
    }
}

impl<T, K: Into<String>> FromIterator<(K, Vec<T>)> for Multimap<T> {
    fn from_iter<I: IntoIterator<Item = (K, Vec<T>)>>(iter: I) -> Self {
        let mut multimap = Multimap::new();
        for (key, values) in iter {
            let key = key.into();
            match multimap.entries.iter_mut().find(|(k, _)| *k == key) {
                Some((_, existing)) => existing.extend(values),
                None => multimap.entries.push((key, values)),
            }
        }
        multimap
    }
}

impl<T: ScalarType> PropertyType for Multimap<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::multimap_of(T::descriptor())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Multimap(entries) => {
                let mut converted = Vec::with_capacity(entries.len());
                for (key, values) in entries {
                    let values = values
                        .into_iter()
                        .map(T::from_value)
                        .collect::<Option<Vec<_>>>()?;
                    converted.push((key, values));
                }
                Some(Multimap { entries: converted })
            }
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::Multimap(
            self.entries
                .iter()
                .map(|(k, values)| (k.clone(), values.iter().map(T::to_value).collect()))
                .collect(),
        )
    }
}
