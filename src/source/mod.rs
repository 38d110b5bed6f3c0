//! 配置源
//!
//! 每个配置源在被调用时返回一份完整的 `key -> 原始字符串` 映射，或者返回
//! `SourceNotAvailable`。配置源本身不做缓存和合并，合并由 `merge` 模块完成。

pub mod cached;
pub mod directory;
pub mod env;
pub mod filtered_path;
pub mod keyvalue;
pub mod memory;
pub mod properties;
pub mod vault;

pub use cached::CachedSource;
pub use directory::{DirectorySource, DirectorySourceBuilder, DirectorySourceConfig, GroupConfig};
pub use env::{EnvSource, EnvSourceConfig};
pub use filtered_path::{
    load_path_configs, merge_filtered, NamedPredicate, PathConfig, PathPredicate,
};
pub use keyvalue::{
    KeyValueConfigEntity, KeyValueConfigName, KeyValueRepository, KeyValueSource,
};
pub use memory::{InMemorySource, InMemorySourceConfig};
pub use properties::parse_properties;
pub use vault::{VaultSource, VaultSourceConfig};

use std::collections::HashMap;

use crate::error::SourceNotAvailable;

/// 配置源抽象
///
/// 所有配置源（目录、环境变量、文档存储、secret manager 等）都实现此 trait
///
/// # 示例
/// ```
/// use std::collections::HashMap;
/// use livecfg::{ConfigSource, SourceNotAvailable};
///
/// struct Static;
///
/// impl ConfigSource for Static {
///     fn load_config(&self) -> Result<HashMap<String, String>, SourceNotAvailable> {
///         Ok(HashMap::from([("app.name".to_string(), "demo".to_string())]))
///     }
/// }
///
/// assert_eq!(Static.load_config().unwrap()["app.name"], "demo");
/// ```
pub trait ConfigSource: Send + Sync {
    /// 加载全部配置
    ///
    /// # 返回
    /// - 成功返回 key 到原始字符串的映射
    /// - 后端不可达、鉴权失败、内容无法解析时返回 `SourceNotAvailable`
    fn load_config(&self) -> Result<HashMap<String, String>, SourceNotAvailable>;
}

impl<F> ConfigSource for F
where
    F: Fn() -> Result<HashMap<String, String>, SourceNotAvailable> + Send + Sync,
{
    fn load_config(&self) -> Result<HashMap<String, String>, SourceNotAvailable> {
        self()
    }
}
