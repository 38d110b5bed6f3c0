//! 配置源工厂
//!
//! 按类型名注册构造函数，通过 `TypeOptions` 创建配置源。工厂由调用方持有，
//! 不存在进程级的全局注册表。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::source::{
    ConfigSource, DirectorySource, DirectorySourceConfig, EnvSource, EnvSourceConfig,
    InMemorySource, InMemorySourceConfig, VaultSource, VaultSourceConfig,
};
use crate::type_options::TypeOptions;

type Constructor = Box<dyn Fn(JsonValue) -> Result<Arc<dyn ConfigSource>> + Send + Sync>;

/// 配置源工厂
///
/// # 示例
/// ```no_run
/// use livecfg::{SourceFactory, TypeOptions};
///
/// let factory = SourceFactory::with_builtin();
/// let opts = TypeOptions::from_json(r#"{
///     "type": "DirectorySource",
///     "options": {
///         "directory": "/etc/app",
///         "groups": [{"name": "prod", "pattern": "prod/*"}]
///     }
/// }"#).unwrap();
///
/// let source = factory.create(&opts).unwrap();
/// ```
#[derive(Default)]
pub struct SourceFactory {
    constructors: HashMap<String, Constructor>,
}

/// `null` 视为空对象，使所有字段走默认值
fn options_or_empty(options: JsonValue) -> JsonValue {
    match options {
        JsonValue::Null => JsonValue::Object(Default::default()),
        other => other,
    }
}

impl SourceFactory {
    /// 空工厂
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册了内置配置源的工厂
    ///
    /// # 注册的类型
    /// - `EnvSource`
    /// - `DirectorySource`
    /// - `VaultSource`
    /// - `InMemorySource`
    pub fn with_builtin() -> Self {
        let mut factory = Self::new();
        factory.register::<EnvSource, EnvSourceConfig>("EnvSource");
        factory.register::<InMemorySource, InMemorySourceConfig>("InMemorySource");
        factory.register_with("DirectorySource", |config: DirectorySourceConfig| {
            DirectorySource::new(config)
        });
        factory.register_with("VaultSource", |config: VaultSourceConfig| VaultSource::new(config));
        factory
    }

    /// 注册通过 `From<Config>` 构造的配置源，同名类型会被覆盖
    pub fn register<T, Config>(&mut self, type_name: &str) -> &mut Self
    where
        T: ConfigSource + From<Config> + 'static,
        Config: DeserializeOwned + 'static,
    {
        self.register_with(type_name, |config: Config| Ok(T::from(config)))
    }

    /// 注册构造可能失败的配置源
    pub fn register_with<T, Config, F>(&mut self, type_name: &str, constructor: F) -> &mut Self
    where
        T: ConfigSource + 'static,
        Config: DeserializeOwned + 'static,
        F: Fn(Config) -> Result<T> + Send + Sync + 'static,
    {
        let constructor: Constructor = Box::new(move |value| {
            let config: Config = serde_json::from_value(options_or_empty(value))?;
            let source: Arc<dyn ConfigSource> = Arc::new(constructor(config)?);
            Ok(source)
        });
        self.constructors.insert(type_name.to_string(), constructor);
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    /// 已注册的类型名，按字典序排列
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// 根据 TypeOptions 创建配置源
    pub fn create(&self, type_options: &TypeOptions) -> Result<Arc<dyn ConfigSource>> {
        let constructor = self
            .constructors
            .get(&type_options.type_name)
            .ok_or_else(|| anyhow!("Type '{}' not registered", type_options.type_name))?;

        constructor(type_options.options.clone())
            .map_err(|e| anyhow!("create '{}' failed: {}", type_options.type_name, e))
    }
}

impl fmt::Debug for SourceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFactory")
            .field("types", &self.type_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceNotAvailable;
    use serde::Deserialize;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Deserialize)]
    struct ConstantConfig {
        key: String,
        value: String,
    }

    struct ConstantSource {
        key: String,
        value: String,
    }

    impl From<ConstantConfig> for ConstantSource {
        fn from(config: ConstantConfig) -> Self {
            Self {
                key: config.key,
                value: config.value,
            }
        }
    }

    impl ConfigSource for ConstantSource {
        fn load_config(&self) -> Result<HashMap<String, String>, SourceNotAvailable> {
            Ok(HashMap::from([(self.key.clone(), self.value.clone())]))
        }
    }

    #[test]
    fn test_builtin_types() {
        let factory = SourceFactory::with_builtin();
        assert_eq!(
            factory.type_names(),
            vec!["DirectorySource", "EnvSource", "InMemorySource", "VaultSource"]
        );
    }

    #[test]
    fn test_create_directory_source() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("app.properties"), "host=localhost\n")?;

        let opts = TypeOptions::new(
            "DirectorySource",
            json!({ "directory": dir.path().to_string_lossy() }),
        );
        let source = SourceFactory::with_builtin().create(&opts)?;
        assert_eq!(source.load_config()?["host"], "localhost");
        Ok(())
    }

    #[test]
    fn test_create_with_null_options() -> Result<()> {
        let source = SourceFactory::with_builtin()
            .create(&TypeOptions::new("InMemorySource", JsonValue::Null))?;
        assert!(source.load_config()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_register_custom_type() -> Result<()> {
        let mut factory = SourceFactory::new();
        factory.register::<ConstantSource, ConstantConfig>("ConstantSource");

        let source = factory.create(&TypeOptions::new(
            "ConstantSource",
            json!({"key": "a", "value": "1"}),
        ))?;
        assert_eq!(source.load_config()?["a"], "1");
        Ok(())
    }

    #[test]
    fn test_unregistered_type() {
        let factory = SourceFactory::with_builtin();
        let err = factory
            .create(&TypeOptions::new("UnknownSource", json!({})))
            .err()
            .map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("Type 'UnknownSource' not registered"));
    }

    #[test]
    fn test_constructor_error() {
        let factory = SourceFactory::with_builtin();
        let result = factory.create(&TypeOptions::new(
            "DirectorySource",
            json!({"directory": "/tmp", "file_pattern": "["}),
        ));
        assert!(result.is_err());
    }
}
