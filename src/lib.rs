//! livecfg - 运行时可刷新的配置注册中心
//!
//! 从多个有序的配置源（目录、环境变量、文档存储、secret manager 等）聚合 key/value 配置，
//! 以强类型、可单独订阅的属性对外提供，并周期性地重新加载以感知变化，无需重启进程。
//!
//! ## 模块
//!
//! - **source**: 配置源抽象与内置实现
//! - **merge**: 按优先级合并配置源，生成快照并比较差异
//! - **binder**: 原始字符串到强类型值的绑定
//! - **property**: 强类型属性与对象属性
//! - **registry**: 注册中心，驱动 reload 周期
//! - **audit**: 变更事件、审计记录与监听器
//! - **settings**: 注册中心配置
//! - **factory**: 通过 `{type, options}` 创建配置源
//! - **admin**: 只读的 HTTP 管理接口
//!
//! ## 示例
//!
//! ```
//! use livecfg::{ConfigRegistry, ConfigRegistrySettings, InMemorySource};
//!
//! let source = InMemorySource::from([("timeout", "500ms"), ("hosts", "a,b")]);
//! let registry = ConfigRegistry::create(
//!     ConfigRegistrySettings::builder()
//!         .add_last_source("memory", source)
//!         .no_reload()
//!         .build()
//!         .unwrap(),
//! )
//! .unwrap();
//!
//! let timeout = registry.duration_property("timeout");
//! let hosts = registry.list_property::<String>("hosts");
//! assert_eq!(timeout.value(), Some(std::time::Duration::from_millis(500)));
//! assert_eq!(hosts.value(), Some(vec!["a".to_string(), "b".to_string()]));
//! ```

extern crate self as livecfg;

mod macros;
mod reloader;

pub mod admin;
pub mod audit;
pub mod binder;
pub mod error;
pub mod factory;
pub mod merge;
pub mod property;
pub mod registry;
pub mod settings;
pub mod source;
pub mod type_options;

// 重新导出主要的公共 API
pub use audit::{logging_listener, AuditTrail, ConfigEvent, EventKind, Listener};
pub use error::{BindingError, ConfigError, DeclarationError, SourceNotAvailable, Unavailability};
pub use factory::SourceFactory;
pub use merge::{ChangeType, KeyChange, Snapshot, SnapshotEntry, SourceRegistration};
pub use property::{ConfigObject, ConfigProperty, Multimap, ObjectProperty, PropertyType, ScalarType};
pub use registry::{ConfigRegistry, ReloadReport, ReloadStatus};
pub use settings::{
    ConfigRegistryOptions, ConfigRegistrySettings, ConfigRegistrySettingsBuilder, SourceOptions,
};
pub use source::{
    CachedSource, ConfigSource, DirectorySource, DirectorySourceConfig, EnvSource,
    EnvSourceConfig, InMemorySource, KeyValueConfigEntity, KeyValueConfigName,
    KeyValueRepository, KeyValueSource, VaultSource, VaultSourceConfig,
};
pub use type_options::TypeOptions;

// 派生宏与 trait 同名，分别位于宏和类型命名空间
pub use livecfg_macros::ConfigObject;
