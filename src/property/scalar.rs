use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, RwLock};

use arc_swap::ArcSwapOption;

use crate::binder::FieldBinder;
use crate::error::ConfigError;
use crate::merge::Snapshot;

use super::types::PropertyType;
use super::{invoke_isolated, read_lock, Callback, ManagedProperty, RawValidator, Refresh, Validator};

/// 单个配置 key 的强类型属性
///
/// 由 `ConfigRegistry` 创建并持有，同一 key + 类型的所有使用方共享同一个实例。
/// 读取无锁，写入只来自 reload 周期。
///
/// # 示例
/// ```no_run
/// use livecfg::{ConfigRegistry, ConfigRegistrySettings, InMemorySource};
///
/// let source = InMemorySource::from([("host", "localhost")]);
/// let registry = ConfigRegistry::create(
///     ConfigRegistrySettings::builder()
///         .add_last_source("memory", source)
///         .build()
///         .unwrap(),
/// ).unwrap();
///
/// let host = registry.string_property("host");
/// host.add_callback(|old, new| {
///     println!("host changed: {:?} -> {:?}", old, new);
///     Ok(())
/// });
/// assert_eq!(host.value().as_deref(), Some("localhost"));
/// ```
pub struct ConfigProperty<T: PropertyType> {
    binder: FieldBinder,
    value: ArcSwapOption<T>,
    raw: ArcSwapOption<String>,
    raw_validators: RwLock<Vec<RawValidator>>,
    validators: RwLock<Vec<Validator<T>>>,
    callbacks: RwLock<Vec<Callback<T>>>,
    /// 串行化写入
    write_lock: Mutex<()>,
    _marker: PhantomData<T>,
}

impl<T: PropertyType> ConfigProperty<T> {
    pub(crate) fn new(binder: FieldBinder) -> Self {
        Self {
            binder,
            value: ArcSwapOption::empty(),
            raw: ArcSwapOption::empty(),
            raw_validators: RwLock::new(Vec::new()),
            validators: RwLock::new(Vec::new()),
            callbacks: RwLock::new(Vec::new()),
            write_lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    /// 配置 key
    pub fn name(&self) -> &str {
        self.binder.property()
    }

    pub fn binder(&self) -> &FieldBinder {
        &self.binder
    }

    /// 当前值，没有任何配置源提供该 key 时为 `None`
    pub fn value(&self) -> Option<T> {
        self.value.load_full().map(|v| v.as_ref().clone())
    }

    /// 当前值的共享引用，避免克隆
    pub fn load(&self) -> Option<Arc<T>> {
        self.value.load_full()
    }

    pub fn value_or(&self, default: T) -> T {
        self.value().unwrap_or(default)
    }

    /// 当前值，缺失时返回 `ConfigError::MissingValue`
    pub fn value_or_err(&self) -> Result<T, ConfigError> {
        self.value()
            .ok_or_else(|| ConfigError::MissingValue(self.name().to_string()))
    }

    /// 当前值的文本形式
    pub fn value_as_string(&self, default: &str) -> String {
        self.raw
            .load_full()
            .map(|raw| raw.as_ref().clone())
            .unwrap_or_else(|| default.to_string())
    }

    /// 添加原始值校验器，在绑定之前执行
    pub fn add_raw_validator<F>(&self, validator: F)
    where
        F: Fn(Option<&str>) -> bool + Send + Sync + 'static,
    {
        super::write_lock(&self.raw_validators).push(Arc::new(validator));
    }

    /// 添加校验器，对绑定后的候选值执行，只影响之后的更新
    pub fn add_validator<F>(&self, validator: F)
    where
        F: Fn(Option<&T>) -> bool + Send + Sync + 'static,
    {
        super::write_lock(&self.validators).push(Arc::new(validator));
    }

    /// 添加变更回调，按注册顺序以 `(old, new)` 调用
    pub fn add_callback<F>(&self, callback: F)
    where
        F: Fn(Option<&T>, Option<&T>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        super::write_lock(&self.callbacks).push(Arc::new(callback));
    }

    fn bind(&self, raw: Option<&str>) -> Result<Option<T>, String> {
        let raw = match raw {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let value = self.binder.bind(raw).map_err(|e| e.to_string())?;
        T::from_value(value).map(Some).ok_or_else(|| {
            format!(
                "bound value does not match {} for '{}'",
                self.binder.kind(),
                self.name()
            )
        })
    }

    /// 用新的原始值更新属性：原始值校验 -> 绑定 -> 类型校验 -> 替换 -> 回调
    fn update(&self, raw: Option<&str>) -> Refresh {
        let (old, new) = {
            let _guard = self
                .write_lock
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            let current_raw = self.raw.load_full();
            if current_raw.as_deref().map(String::as_str) == raw {
                return Refresh::Unchanged;
            }

            let raw_validators = read_lock(&self.raw_validators).clone();
            if !raw_validators.iter().all(|validator| validator(raw)) {
                return Refresh::Rejected(format!("validation failed for '{}'", self.name()));
            }

            let candidate = match self.bind(raw) {
                Ok(candidate) => candidate,
                Err(reason) => return Refresh::Rejected(reason),
            };

            let validators = read_lock(&self.validators).clone();
            if !validators.iter().all(|validator| validator(candidate.as_ref())) {
                return Refresh::Rejected(format!("validation failed for '{}'", self.name()));
            }

            let new = candidate.map(Arc::new);
            let old = self.value.swap(new.clone());
            self.raw.store(raw.map(|r| Arc::new(r.to_string())));
            (old, new)
        };

        let callbacks = read_lock(&self.callbacks).clone();
        let mut callback_failures = 0;
        for (index, callback) in callbacks.iter().enumerate() {
            let label = format!("callback #{} of '{}'", index, self.name());
            if invoke_isolated(&label, || callback(old.as_deref(), new.as_deref())).is_err() {
                callback_failures += 1;
            }
        }
        Refresh::Applied { callback_failures }
    }
}

impl<T: PropertyType> ManagedProperty for ConfigProperty<T> {
    fn name(&self) -> &str {
        self.binder.property()
    }

    fn depends_on(&self, key: &str) -> bool {
        self.binder.property() == key
    }

    fn refresh(&self, snapshot: &Snapshot) -> Refresh {
        self.update(snapshot.get(self.binder.property()))
    }
}

impl<T: PropertyType + fmt::Debug> fmt::Debug for ConfigProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigProperty")
            .field("name", &self.name())
            .field("kind", self.binder.kind())
            .field("value", &self.value())
            .finish()
    }
}
