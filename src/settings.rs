//! Registry 配置
//!
//! - `ConfigRegistrySettings`: 代码方式构造，配置源顺序通过 first/last/before 决定
//! - `ConfigRegistryOptions`: 可从 JSON5 / YAML / TOML 加载的同一组配置

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use garde::Validate;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::audit::{logging_listener, Listener};
use crate::error::ConfigError;
use crate::factory::SourceFactory;
use crate::merge::SourceRegistration;
use crate::source::ConfigSource;
use crate::type_options::TypeOptions;

pub const DEFAULT_RELOAD_INTERVAL_SEC: u64 = 15;
pub const DEFAULT_RECENT_EVENTS_NUM: usize = 30;
pub const DEFAULT_MANAGEMENT_ENABLED: bool = true;
pub const DEFAULT_MANAGEMENT_NAME: &str = "livecfg:name=ConfigRegistry";
/// 关闭周期 reload，只做初始加载
pub const NO_RELOAD: u64 = u64::MAX;
pub const UNRESOLVED_HOST: &str = "unresolved";

/// Registry 配置
#[derive(Clone)]
pub struct ConfigRegistrySettings {
    sources: Vec<SourceRegistration>,
    reload_interval_sec: u64,
    recent_config_events_num: usize,
    listeners: Vec<(String, Listener)>,
    management_enabled: bool,
    management_name: String,
    host: String,
}

impl ConfigRegistrySettings {
    pub fn builder() -> ConfigRegistrySettingsBuilder {
        ConfigRegistrySettingsBuilder::default()
    }

    /// 按优先级排列的配置源，第一个最优先
    pub fn sources(&self) -> &[SourceRegistration] {
        &self.sources
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn reload_interval_sec(&self) -> u64 {
        self.reload_interval_sec
    }

    /// 周期 reload 间隔，关闭时为 `None`
    pub fn reload_interval(&self) -> Option<Duration> {
        if self.reload_interval_sec == NO_RELOAD {
            None
        } else {
            Some(Duration::from_secs(self.reload_interval_sec))
        }
    }

    pub fn is_reload_enabled(&self) -> bool {
        self.reload_interval_sec != NO_RELOAD
    }

    pub fn recent_config_events_num(&self) -> usize {
        self.recent_config_events_num
    }

    pub fn listeners(&self) -> &[(String, Listener)] {
        &self.listeners
    }

    pub fn is_management_enabled(&self) -> bool {
        self.management_enabled
    }

    pub fn management_name(&self) -> &str {
        &self.management_name
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Debug for ConfigRegistrySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigRegistrySettings")
            .field("sources", &self.source_names())
            .field("reload_interval_sec", &self.reload_interval_sec)
            .field("recent_config_events_num", &self.recent_config_events_num)
            .field(
                "listeners",
                &self.listeners.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            )
            .field("management_enabled", &self.management_enabled)
            .field("management_name", &self.management_name)
            .field("host", &self.host)
            .finish()
    }
}

/// `ConfigRegistrySettings` 构造器
///
/// 添加配置源时的错误（重名、`before` 目标不存在）延迟到 `build()` 返回
///
/// # 示例
/// ```
/// use livecfg::{ConfigRegistrySettings, InMemorySource};
///
/// let settings = ConfigRegistrySettings::builder()
///     .add_last_source("file", InMemorySource::default())
///     .add_first_source("env", InMemorySource::default())
///     .add_before_source("file", "overrides", InMemorySource::default())
///     .reload_interval_sec(5)
///     .build()
///     .unwrap();
///
/// assert_eq!(settings.source_names(), vec!["env", "overrides", "file"]);
/// ```
pub struct ConfigRegistrySettingsBuilder {
    sources: Vec<SourceRegistration>,
    reload_interval_sec: u64,
    recent_config_events_num: usize,
    listeners: Vec<(String, Listener)>,
    management_enabled: bool,
    management_name: String,
    host: Option<String>,
    errors: Vec<ConfigError>,
}

impl Default for ConfigRegistrySettingsBuilder {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            reload_interval_sec: DEFAULT_RELOAD_INTERVAL_SEC,
            recent_config_events_num: DEFAULT_RECENT_EVENTS_NUM,
            listeners: Vec::new(),
            management_enabled: DEFAULT_MANAGEMENT_ENABLED,
            management_name: DEFAULT_MANAGEMENT_NAME.to_string(),
            host: None,
            errors: Vec::new(),
        }
    }
}

impl ConfigRegistrySettingsBuilder {
    fn registration(&mut self, name: String, source: Arc<dyn ConfigSource>) -> Option<SourceRegistration> {
        if self.sources.iter().any(|s| s.name == name) {
            self.errors.push(ConfigError::DuplicateSource(name));
            return None;
        }
        Some(SourceRegistration::new(name, source))
    }

    /// 添加到末尾（优先级最低）
    pub fn add_last_source<S>(self, name: impl Into<String>, source: S) -> Self
    where
        S: ConfigSource + 'static,
    {
        self.add_last_shared_source(name, Arc::new(source))
    }

    pub fn add_last_shared_source(
        mut self,
        name: impl Into<String>,
        source: Arc<dyn ConfigSource>,
    ) -> Self {
        if let Some(registration) = self.registration(name.into(), source) {
            self.sources.push(registration);
        }
        self
    }

    /// 添加到开头（优先级最高）
    pub fn add_first_source<S>(mut self, name: impl Into<String>, source: S) -> Self
    where
        S: ConfigSource + 'static,
    {
        if let Some(registration) = self.registration(name.into(), Arc::new(source)) {
            self.sources.insert(0, registration);
        }
        self
    }

    /// 添加到名为 `before` 的配置源之前
    pub fn add_before_source<S>(
        mut self,
        before: &str,
        name: impl Into<String>,
        source: S,
    ) -> Self
    where
        S: ConfigSource + 'static,
    {
        let position = match self.sources.iter().position(|s| s.name == before) {
            Some(position) => position,
            None => {
                self.errors.push(ConfigError::UnknownSource(before.to_string()));
                return self;
            }
        };
        if let Some(registration) = self.registration(name.into(), Arc::new(source)) {
            self.sources.insert(position, registration);
        }
        self
    }

    pub fn reload_interval_sec(mut self, sec: u64) -> Self {
        self.reload_interval_sec = sec;
        self
    }

    /// 只做初始加载
    pub fn no_reload(self) -> Self {
        self.reload_interval_sec(NO_RELOAD)
    }

    pub fn keep_recent_config_events(mut self, num: usize) -> Self {
        self.recent_config_events_num = num;
        self
    }

    /// 添加监听器，同名监听器原位替换
    pub fn add_listener(mut self, name: impl Into<String>, listener: Listener) -> Self {
        let name = name.into();
        match self.listeners.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = listener,
            None => self.listeners.push((name, listener)),
        }
        self
    }

    pub fn management_enabled(mut self, enabled: bool) -> Self {
        self.management_enabled = enabled;
        self
    }

    pub fn management_name(mut self, name: impl Into<String>) -> Self {
        self.management_name = name.into();
        self
    }

    /// 覆盖事件中的主机名，默认取本机 IP
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn build(mut self) -> Result<ConfigRegistrySettings, ConfigError> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }
        if self.reload_interval_sec == 0 {
            return Err(ConfigError::Settings(
                "reload interval must be positive".to_string(),
            ));
        }

        let host = self.host.unwrap_or_else(|| {
            local_ip_address::local_ip()
                .map(|ip| ip.to_string())
                .unwrap_or_else(|_| UNRESOLVED_HOST.to_string())
        });

        Ok(ConfigRegistrySettings {
            sources: self.sources,
            reload_interval_sec: self.reload_interval_sec,
            recent_config_events_num: self.recent_config_events_num,
            listeners: self.listeners,
            management_enabled: self.management_enabled,
            management_name: self.management_name,
            host,
        })
    }
}

/// 单个配置源的声明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SourceOptions {
    #[garde(length(min = 1))]
    pub name: String,

    #[serde(flatten)]
    #[garde(skip)]
    pub type_options: TypeOptions,
}

/// 可从文件加载的 Registry 配置
///
/// # 示例
/// ```
/// use livecfg::{ConfigRegistryOptions, SourceFactory};
///
/// let options = ConfigRegistryOptions::from_yaml(r#"
/// sources:
///   - name: defaults
///     type: InMemorySource
///     options:
///       values:
///         server.port: "8080"
/// reload_interval_sec: 30
/// recent_events: 100
/// "#).unwrap();
///
/// let settings = options.into_builder(&SourceFactory::with_builtin()).unwrap().build().unwrap();
/// assert_eq!(settings.reload_interval_sec(), 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, SmartDefault, Validate)]
#[serde(default)]
pub struct ConfigRegistryOptions {
    /// 按优先级排列，第一个最优先
    #[garde(dive)]
    pub sources: Vec<SourceOptions>,

    /// `None` 关闭周期 reload
    #[default(Some(DEFAULT_RELOAD_INTERVAL_SEC))]
    #[garde(range(min = 1))]
    pub reload_interval_sec: Option<u64>,

    #[default(DEFAULT_RECENT_EVENTS_NUM)]
    #[garde(skip)]
    pub recent_events: usize,

    #[default(DEFAULT_MANAGEMENT_ENABLED)]
    #[garde(skip)]
    pub management_enabled: bool,

    #[default(DEFAULT_MANAGEMENT_NAME.to_string())]
    #[garde(length(min = 1))]
    pub management_name: String,

    #[garde(skip)]
    pub host: Option<String>,

    /// 注册 `logging_listener`
    #[default = true]
    #[garde(skip)]
    pub log_events: bool,
}

impl ConfigRegistryOptions {
    /// 从 JSON 字符串创建（支持 JSON5 格式）
    pub fn from_json(json_str: &str) -> Result<Self> {
        Ok(json5::from_str(json_str)?)
    }

    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml_str)?)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// 校验并通过工厂创建所有配置源
    pub fn into_builder(self, factory: &SourceFactory) -> Result<ConfigRegistrySettingsBuilder> {
        self.validate()
            .map_err(|e| ConfigError::Settings(e.to_string()))?;

        let mut builder = ConfigRegistrySettings::builder()
            .reload_interval_sec(self.reload_interval_sec.unwrap_or(NO_RELOAD))
            .keep_recent_config_events(self.recent_events)
            .management_enabled(self.management_enabled)
            .management_name(self.management_name);

        for source in self.sources {
            let created = factory.create(&source.type_options)?;
            builder = builder.add_last_shared_source(source.name, created);
        }
        if let Some(host) = self.host {
            builder = builder.host(host);
        }
        if self.log_events {
            builder = builder.add_listener("logging", logging_listener());
        }
        Ok(builder)
    }
}
