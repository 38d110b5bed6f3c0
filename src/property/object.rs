//! 对象属性：`prefix.field` 形式的一组 key 绑定成一个结构体

use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use arc_swap::ArcSwapOption;

use crate::binder::{FieldBinder, FieldSpec, Value};
use crate::error::{BindingError, ConfigError, DeclarationError};
use crate::merge::Snapshot;

use super::{invoke_isolated, read_lock, write_lock, Callback, ManagedProperty, Refresh, Validator};

/// 可以从一组配置 key 绑定的结构体
///
/// 通常通过 `#[derive(ConfigObject)]` 实现：
///
/// ```
/// use std::time::Duration;
/// use livecfg::ConfigObject;
///
/// #[derive(Debug, Default, Clone, ConfigObject)]
/// struct ServerConfig {
///     host: String,
///     port: i32,
///     #[config(name = "read-timeout")]
///     read_timeout: Duration,
///     #[config(skip)]
///     runtime_only: u8,
/// }
///
/// let fields = ServerConfig::fields();
/// assert_eq!(fields.len(), 3);
/// assert_eq!(fields[2].name, "read-timeout");
/// ```
pub trait ConfigObject: Default + Clone + Send + Sync + 'static {
    /// 可绑定字段的声明
    fn fields() -> Vec<FieldSpec>;

    /// 把绑定好的值写入字段
    fn apply_field(&mut self, field: &str, value: Value) -> Result<(), BindingError>;
}

/// 一组 key 的当前原始值，与 binders 一一对应
type RawFields = Vec<Option<String>>;

pub struct ObjectProperty<T: ConfigObject> {
    prefix: String,
    binders: Vec<FieldBinder>,
    value: ArcSwapOption<T>,
    raw: ArcSwapOption<RawFields>,
    validators: RwLock<Vec<Validator<T>>>,
    callbacks: RwLock<Vec<Callback<T>>>,
    write_lock: Mutex<()>,
}

impl<T: ConfigObject> ObjectProperty<T> {
    /// 创建对象属性，字段声明不合法时返回 `DeclarationError`
    pub(crate) fn new(prefix: impl Into<String>) -> Result<Self, DeclarationError> {
        let prefix = prefix.into();
        let binders = T::fields()
            .into_iter()
            .map(|field| {
                let key = if prefix.is_empty() {
                    field.name.clone()
                } else {
                    format!("{}.{}", prefix, field.name)
                };
                FieldBinder::new(field, key)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            prefix,
            binders,
            value: ArcSwapOption::empty(),
            raw: ArcSwapOption::empty(),
            validators: RwLock::new(Vec::new()),
            callbacks: RwLock::new(Vec::new()),
            write_lock: Mutex::new(()),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 对象依赖的全部配置 key
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.binders.iter().map(FieldBinder::property)
    }

    /// 当前对象，所有字段 key 都缺失时为 `None`
    pub fn value(&self) -> Option<T> {
        self.value.load_full().map(|v| v.as_ref().clone())
    }

    pub fn load(&self) -> Option<Arc<T>> {
        self.value.load_full()
    }

    pub fn value_or_default(&self) -> T {
        self.value().unwrap_or_default()
    }

    pub fn value_or_err(&self) -> Result<T, ConfigError> {
        self.value()
            .ok_or_else(|| ConfigError::MissingValue(self.prefix.clone()))
    }

    pub fn add_validator<F>(&self, validator: F)
    where
        F: Fn(Option<&T>) -> bool + Send + Sync + 'static,
    {
        write_lock(&self.validators).push(Arc::new(validator));
    }

    pub fn add_callback<F>(&self, callback: F)
    where
        F: Fn(Option<&T>, Option<&T>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        write_lock(&self.callbacks).push(Arc::new(callback));
    }

    fn bind(&self, raws: &RawFields) -> Result<Option<T>, String> {
        if raws.iter().all(Option::is_none) {
            return Ok(None);
        }

        let mut object = T::default();
        for (binder, raw) in self.binders.iter().zip(raws) {
            if let Some(raw) = raw {
                let value = binder.bind(raw).map_err(|e| e.to_string())?;
                object
                    .apply_field(&binder.field().name, value)
                    .map_err(|e| e.to_string())?;
            }
        }
        Ok(Some(object))
    }

    fn update(&self, raws: RawFields) -> Refresh {
        let (old, new) = {
            let _guard = self
                .write_lock
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            let unchanged = match self.raw.load_full() {
                Some(current) => *current == raws,
                None => raws.iter().all(Option::is_none),
            };
            if unchanged {
                return Refresh::Unchanged;
            }

            let candidate = match self.bind(&raws) {
                Ok(candidate) => candidate,
                Err(reason) => return Refresh::Rejected(reason),
            };

            let validators = read_lock(&self.validators).clone();
            if !validators.iter().all(|validator| validator(candidate.as_ref())) {
                return Refresh::Rejected(format!("validation failed for '{}'", self.prefix));
            }

            let new = candidate.map(Arc::new);
            let old = self.value.swap(new.clone());
            self.raw.store(Some(Arc::new(raws)));
            (old, new)
        };

        let callbacks = read_lock(&self.callbacks).clone();
        let mut callback_failures = 0;
        for (index, callback) in callbacks.iter().enumerate() {
            let label = format!("callback #{} of '{}'", index, self.prefix);
            if invoke_isolated(&label, || callback(old.as_deref(), new.as_deref())).is_err() {
                callback_failures += 1;
            }
        }
        Refresh::Applied { callback_failures }
    }
}

impl<T: ConfigObject> ManagedProperty for ObjectProperty<T> {
    fn name(&self) -> &str {
        &self.prefix
    }

    fn depends_on(&self, key: &str) -> bool {
        self.binders.iter().any(|binder| binder.property() == key)
    }

    fn refresh(&self, snapshot: &Snapshot) -> Refresh {
        let raws = self
            .binders
            .iter()
            .map(|binder| snapshot.get(binder.property()).map(str::to_string))
            .collect();
        self.update(raws)
    }
}

impl<T: ConfigObject + fmt::Debug> fmt::Debug for ObjectProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectProperty")
            .field("prefix", &self.prefix)
            .field("value", &self.value())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{Declaration, TypeDescriptor};
    use crate::property::PropertyType;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Endpoint {
        host: String,
        port: i32,
        tags: Vec<String>,
    }

    impl ConfigObject for Endpoint {
        fn fields() -> Vec<FieldSpec> {
            vec![
                FieldSpec::new("host", TypeDescriptor::String),
                FieldSpec::new("port", TypeDescriptor::Int),
                FieldSpec::new("tags", TypeDescriptor::list_of(TypeDescriptor::String)),
            ]
        }

        fn apply_field(&mut self, field: &str, value: Value) -> Result<(), BindingError> {
            let raw = value.to_string();
            let mismatch = |kind: TypeDescriptor| BindingError::new(&raw, kind, "type mismatch");
            match field {
                "host" => {
                    self.host = String::from_value(value).ok_or_else(|| mismatch(String::descriptor()))?
                }
                "port" => {
                    self.port = i32::from_value(value).ok_or_else(|| mismatch(i32::descriptor()))?
                }
                "tags" => {
                    self.tags = Vec::<String>::from_value(value)
                        .ok_or_else(|| mismatch(Vec::<String>::descriptor()))?
                }
                _ => {}
            }
            Ok(())
        }
    }

    #[derive(Debug, Default, Clone)]
    struct WithConstant;

    impl ConfigObject for WithConstant {
        fn fields() -> Vec<FieldSpec> {
            vec![FieldSpec::new("DEFAULT", TypeDescriptor::Int)
                .with_declaration(Declaration::StaticFinal)]
        }

        fn apply_field(&mut self, _field: &str, _value: Value) -> Result<(), BindingError> {
            Ok(())
        }
    }

    fn raws(values: &[Option<&str>]) -> RawFields {
        values.iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn test_keys_use_prefix() {
        let property = ObjectProperty::<Endpoint>::new("db").unwrap();
        assert_eq!(
            property.keys().collect::<Vec<_>>(),
            vec!["db.host", "db.port", "db.tags"]
        );
        assert!(property.depends_on("db.port"));
        assert!(!property.depends_on("db"));
    }

    #[test]
    fn test_declaration_error_on_create() {
        let err = ObjectProperty::<WithConstant>::new("x").unwrap_err();
        assert!(matches!(err, DeclarationError::StaticOrFinal { ref field } if field == "DEFAULT"));
    }

    #[test]
    fn test_update_as_unit() {
        let property = ObjectProperty::<Endpoint>::new("db").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        property.add_callback(move |old, new| {
            s.lock().unwrap().push((old.cloned(), new.cloned()));
            Ok(())
        });

        assert_eq!(property.update(raws(&[None, None, None])), Refresh::Unchanged);
        assert_eq!(property.value(), None);

        property.update(raws(&[Some("localhost"), Some("5432"), None]));
        assert_eq!(
            property.value(),
            Some(Endpoint {
                host: "localhost".to_string(),
                port: 5432,
                tags: vec![],
            })
        );

        property.update(raws(&[Some("localhost"), Some("5433"), Some("a,b")]));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].0.as_ref().map(|e| e.port), Some(5432));
        assert_eq!(seen[1].1.as_ref().map(|e| e.tags.clone()), Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_bad_field_rejects_whole_object() {
        let property = ObjectProperty::<Endpoint>::new("db").unwrap();
        property.update(raws(&[Some("localhost"), Some("5432"), None]));

        let result = property.update(raws(&[Some("remote"), Some("port?"), None]));
        assert!(matches!(result, Refresh::Rejected(_)));
        assert_eq!(property.value().map(|e| e.host), Some("localhost".to_string()));
    }

    #[test]
    fn test_validator_sees_whole_object() {
        let property = ObjectProperty::<Endpoint>::new("db").unwrap();
        property.add_validator(|endpoint| endpoint.map_or(true, |e| !e.host.is_empty() && e.port > 0));

        assert!(matches!(
            property.update(raws(&[None, Some("5432"), None])),
            Refresh::Rejected(_)
        ));
        assert_eq!(property.value(), None);
        assert_eq!(
            property.update(raws(&[Some("h"), Some("5432"), None])),
            Refresh::Applied { callback_failures: 0 }
        );
    }
}
