//! 配置注册中心
//!
//! `ConfigRegistry` 是进程启动时构造一次、显式传递给使用方的句柄：
//! - 创建时做一次合并，失败则构造失败
//! - 后台线程按间隔重新合并，与上一份快照比较，只刷新受影响的属性
//! - 同一 key + 类型的属性只创建一次，所有调用方共享
//! - 每个周期的变更写入审计记录并按顺序通知监听器

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, warn};
use serde::Serialize;

use crate::audit::{AuditTrail, ConfigEvent};
use crate::binder::FieldBinder;
use crate::error::{BindingError, ConfigError, Result};
use crate::merge::{merge, Snapshot};
use crate::property::{
    invoke_isolated, read_lock, write_lock, ConfigObject, ConfigProperty, ManagedProperty,
    Multimap, ObjectProperty, PropertyType, Refresh, ScalarType,
};
use crate::reloader::ReloadHandle;
use crate::settings::ConfigRegistrySettings;

/// 一次 reload 的统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadReport {
    /// 值发生变化的 key 数量
    pub changes: usize,
    /// 产生的事件数量（含 `Rejected`）
    pub events: usize,
    pub rejections: usize,
    pub callback_failures: usize,
    pub listener_failures: usize,
}

/// reload 运行状态
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadStatus {
    /// 已执行的周期数，包括初始加载
    pub cycles: u64,
    pub failures: u64,
    /// 连续失败次数，成功后清零
    pub consecutive_failures: u64,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
}

type IndexKey = (String, TypeId);

struct RegistryInner {
    settings: ConfigRegistrySettings,
    snapshot: ArcSwap<Snapshot>,
    properties: RwLock<Vec<Arc<dyn ManagedProperty>>>,
    index: DashMap<IndexKey, Arc<dyn Any + Send + Sync>>,
    audit: AuditTrail,
    /// 串行化 reload 周期
    reload_lock: Mutex<()>,
    status: Mutex<ReloadStatus>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RegistryInner {
    fn record_success(&self) {
        let mut status = lock(&self.status);
        status.cycles += 1;
        status.consecutive_failures = 0;
        status.last_success = Some(Utc::now());
    }

    fn record_failure(&self, err: &ConfigError) {
        let mut status = lock(&self.status);
        status.cycles += 1;
        status.failures += 1;
        status.consecutive_failures += 1;
        status.last_error = Some(err.to_string());
    }

    /// 执行一个 reload 周期
    ///
    /// 合并失败时保留旧快照，不做任何分发
    fn reload(&self) -> Result<ReloadReport> {
        let _cycle = lock(&self.reload_lock);

        let snapshot = match merge(self.settings.sources()) {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                warn!("reload skipped, keeping previous snapshot: {}", e);
                self.record_failure(&e);
                return Err(e);
            }
        };

        let previous = self.snapshot.swap(snapshot.clone());
        let changes = previous.diff(&snapshot);
        let mut report = ReloadReport {
            changes: changes.len(),
            ..Default::default()
        };

        if changes.is_empty() {
            self.record_success();
            debug!("reload finished, no changes");
            return Ok(report);
        }

        let properties = read_lock(&self.properties).clone();
        // 每个属性每个周期最多刷新一次，结果供它依赖的其它 key 复用
        let mut outcomes: Vec<Option<Refresh>> = vec![None; properties.len()];
        let host = self.settings.host();
        let now = Utc::now();
        let mut events = Vec::new();

        for change in &changes {
            debug!(
                "key '{}' {:?}: {:?} -> {:?}",
                change.key,
                change.change_type(),
                change.old.as_ref().map(|e| &e.value),
                change.new.as_ref().map(|e| &e.value)
            );

            let mut dependents = 0;
            let mut rejected = Vec::new();
            for (i, property) in properties.iter().enumerate() {
                if !property.depends_on(&change.key) {
                    continue;
                }
                dependents += 1;
                let outcome = outcomes[i].get_or_insert_with(|| {
                    let outcome = property.refresh(&snapshot);
                    if let Refresh::Applied { callback_failures } = &outcome {
                        report.callback_failures += *callback_failures;
                    }
                    outcome
                });
                if let Refresh::Rejected(reason) = outcome {
                    warn!("property '{}' rejected new value: {}", property.name(), reason);
                    rejected.push(reason.clone());
                }
            }

            if dependents == 0 || rejected.len() < dependents {
                events.push(ConfigEvent::from_change(change, host, now));
            }
            report.rejections += rejected.len();
            for reason in rejected {
                events.push(ConfigEvent::rejected(change, host, reason, now));
            }
        }

        report.events = events.len();
        for event in &events {
            self.audit.push(event.clone());
        }
        for event in &events {
            for (name, listener) in self.settings.listeners() {
                let label = format!("listener '{}'", name);
                if invoke_isolated(&label, || listener(event)).is_err() {
                    report.listener_failures += 1;
                }
            }
        }

        self.record_success();
        debug!("reload finished: {:?}", report);
        Ok(report)
    }
}

/// 配置注册中心
///
/// # 示例
/// ```
/// use livecfg::{ConfigRegistry, ConfigRegistrySettings, InMemorySource};
///
/// let defaults = InMemorySource::from([("server.port", "8080"), ("server.host", "localhost")]);
/// let overrides = InMemorySource::from([("server.port", "9090")]);
///
/// let registry = ConfigRegistry::create(
///     ConfigRegistrySettings::builder()
///         .add_last_source("overrides", overrides.clone())
///         .add_last_source("defaults", defaults)
///         .no_reload()
///         .build()
///         .unwrap(),
/// ).unwrap();
///
/// let port = registry.int_property("server.port");
/// assert_eq!(port.value(), Some(9090));
///
/// overrides.remove("server.port");
/// registry.reload().unwrap();
/// assert_eq!(port.value(), Some(8080));
/// ```
pub struct ConfigRegistry {
    inner: Arc<RegistryInner>,
    reloader: Mutex<Option<ReloadHandle>>,
}

impl ConfigRegistry {
    /// 创建注册中心并完成初始加载
    ///
    /// # 错误
    /// - 任一配置源初始加载失败
    /// - 后台线程启动失败
    pub fn create(settings: ConfigRegistrySettings) -> Result<Self> {
        let snapshot = merge(settings.sources())?;
        debug!(
            "initial load: {} keys from sources {:?}",
            snapshot.len(),
            settings.source_names()
        );

        let inner = Arc::new(RegistryInner {
            audit: AuditTrail::new(settings.recent_config_events_num()),
            snapshot: ArcSwap::from_pointee(snapshot),
            properties: RwLock::new(Vec::new()),
            index: DashMap::new(),
            reload_lock: Mutex::new(()),
            status: Mutex::new(ReloadStatus::default()),
            settings,
        });
        inner.record_success();

        let reloader = match inner.settings.reload_interval() {
            Some(interval) => Some(Self::spawn_reloader(&inner, interval)?),
            None => None,
        };

        Ok(Self {
            inner,
            reloader: Mutex::new(reloader),
        })
    }

    fn spawn_reloader(inner: &Arc<RegistryInner>, interval: Duration) -> Result<ReloadHandle> {
        let weak: Weak<RegistryInner> = Arc::downgrade(inner);
        let handle = ReloadHandle::spawn(interval, move || {
            if let Some(inner) = weak.upgrade() {
                // 失败已在 reload 内记录
                let _ = inner.reload();
            }
        })?;
        Ok(handle)
    }

    /// 获取或创建属性，新建的属性立即从当前快照取值
    fn materialize<P>(&self, key: &str, create: impl FnOnce() -> P) -> Arc<P>
    where
        P: ManagedProperty + Any + Send + Sync + 'static,
    {
        let index_key = (key.to_string(), TypeId::of::<P>());
        match self.inner.index.entry(index_key) {
            Entry::Occupied(mut entry) => match entry.get().clone().downcast::<P>() {
                Ok(existing) => existing,
                Err(_) => {
                    let property = self.register(create());
                    entry.insert(property.clone());
                    property
                }
            },
            Entry::Vacant(entry) => {
                let property = self.register(create());
                entry.insert(property.clone());
                property
            }
        }
    }

    fn register<P>(&self, property: P) -> Arc<P>
    where
        P: ManagedProperty + 'static,
    {
        let property = Arc::new(property);
        write_lock(&self.inner.properties).push(property.clone());
        // 与并发的 reload 竞争时，以最后看到的快照为准
        loop {
            let snapshot = self.inner.snapshot.load_full();
            property.refresh(&snapshot);
            if Arc::ptr_eq(&snapshot, &self.inner.snapshot.load()) {
                break;
            }
        }
        property
    }

    fn builtin<T: PropertyType>(&self, key: &str) -> Arc<ConfigProperty<T>> {
        self.materialize(key, || {
            ConfigProperty::new(FieldBinder::for_builtin(key, T::descriptor()))
        })
    }

    /// 任意 `PropertyType` 的属性
    ///
    /// 自定义类型的描述不合法时返回 `DeclarationError`
    pub fn property<T: PropertyType>(&self, key: &str) -> Result<Arc<ConfigProperty<T>>> {
        let binder = FieldBinder::for_property(key, T::descriptor())?;
        Ok(self.materialize(key, || ConfigProperty::new(binder)))
    }

    pub fn string_property(&self, key: &str) -> Arc<ConfigProperty<String>> {
        self.builtin(key)
    }

    pub fn int_property(&self, key: &str) -> Arc<ConfigProperty<i32>> {
        self.builtin(key)
    }

    pub fn long_property(&self, key: &str) -> Arc<ConfigProperty<i64>> {
        self.builtin(key)
    }

    pub fn double_property(&self, key: &str) -> Arc<ConfigProperty<f64>> {
        self.builtin(key)
    }

    pub fn bool_property(&self, key: &str) -> Arc<ConfigProperty<bool>> {
        self.builtin(key)
    }

    /// 时长属性，值形如 `100ms`、`1m30s`
    pub fn duration_property(&self, key: &str) -> Arc<ConfigProperty<Duration>> {
        self.builtin(key)
    }

    /// 逗号分隔的列表属性
    pub fn list_property<T: ScalarType>(&self, key: &str) -> Arc<ConfigProperty<Vec<T>>> {
        self.builtin(key)
    }

    /// `k1=v1,k1=v2,k2=v3` 形式的多值映射属性
    pub fn multimap_property<T: ScalarType>(&self, key: &str) -> Arc<ConfigProperty<Multimap<T>>> {
        self.builtin(key)
    }

    /// 以 `prefix.field` 绑定的对象属性，`prefix` 为空时直接使用字段名
    pub fn object_property<T: ConfigObject>(&self, prefix: &str) -> Result<Arc<ObjectProperty<T>>> {
        let property = ObjectProperty::<T>::new(prefix)?;
        Ok(self.materialize(prefix, || property))
    }

    /// 当前快照中的原始值
    pub fn raw_value(&self, key: &str) -> Option<String> {
        self.inner.snapshot.load().get(key).map(str::to_string)
    }

    pub fn string_value(&self, key: &str, default: &str) -> String {
        self.raw_value(key).unwrap_or_else(|| default.to_string())
    }

    /// 一次性读取并绑定，不创建属性
    pub fn value<T: PropertyType>(&self, key: &str) -> Result<Option<T>> {
        let binder = FieldBinder::for_property(key, T::descriptor())?;
        let raw = match self.raw_value(key) {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let value = binder.bind(&raw)?;
        T::from_value(value).map(Some).ok_or_else(|| {
            ConfigError::Binding(BindingError::new(
                &raw,
                T::descriptor(),
                "bound value has a different type",
            ))
        })
    }

    /// 当前所有 key 的值
    pub fn all_properties(&self) -> BTreeMap<String, String> {
        self.inner.snapshot.load().to_map()
    }

    /// 当前所有 key，按字典序排列
    pub fn property_names(&self) -> Vec<String> {
        self.inner.snapshot.load().keys().map(str::to_string).collect()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.snapshot.load_full()
    }

    /// 配置源名称，按优先级排列
    pub fn sources(&self) -> Vec<&str> {
        self.inner.settings.source_names()
    }

    /// 最近的变更事件，按时间顺序
    pub fn recent_events(&self) -> Vec<ConfigEvent> {
        self.inner.audit.recent()
    }

    pub fn settings(&self) -> &ConfigRegistrySettings {
        &self.inner.settings
    }

    /// 已创建的属性数量
    pub fn materialized_count(&self) -> usize {
        read_lock(&self.inner.properties).len()
    }

    /// 立即执行一个 reload 周期，与后台周期串行
    pub fn reload(&self) -> Result<ReloadReport> {
        self.inner.reload()
    }

    pub fn reload_status(&self) -> ReloadStatus {
        lock(&self.inner.status).clone()
    }

    /// 后台 reload 是否在运行
    pub fn is_reloading(&self) -> bool {
        lock(&self.reloader).is_some()
    }

    /// 停止后台 reload，正在执行的周期会完整结束
    pub fn close(&self) {
        if let Some(mut handle) = lock(&self.reloader).take() {
            handle.stop();
            debug!("reloader stopped");
        }
    }
}

impl Drop for ConfigRegistry {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ConfigRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigRegistry")
            .field("settings", &self.inner.settings)
            .field("keys", &self.inner.snapshot.load().len())
            .field("properties", &self.materialized_count())
            .finish()
    }
}
