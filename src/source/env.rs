//! 环境变量配置源

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use super::ConfigSource;
use crate::error::SourceNotAvailable;
use crate::impl_from;

#[derive(Debug, Clone, Deserialize, Serialize, SmartDefault)]
#[serde(default)]
pub struct EnvSourceConfig {
    /// 只读取以该前缀开头的变量，并去掉前缀（以及紧随其后的 `_`）
    pub prefix: Option<String>,

    /// `FOO_BAR` -> `foo.bar`
    #[default = true]
    pub normalize: bool,
}

/// 环境变量配置源
///
/// # 示例
/// ```no_run
/// use livecfg::{ConfigSource, EnvSource, EnvSourceConfig};
///
/// // APP_SERVER_PORT=8080 -> server.port=8080
/// let source = EnvSource::new(EnvSourceConfig {
///     prefix: Some("APP".to_string()),
///     normalize: true,
/// });
/// let config = source.load_config().unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    config: EnvSourceConfig,
}

impl EnvSource {
    pub fn new(config: EnvSourceConfig) -> Self {
        Self { config }
    }

    fn map_key(&self, name: &str) -> Option<String> {
        let name = match &self.config.prefix {
            Some(prefix) if !prefix.is_empty() => {
                // 前缀之后必须紧跟 `_`，`APPLE_X` 不属于 `APP`
                let rest = name.strip_prefix(prefix.as_str())?;
                if rest.is_empty() {
                    return None;
                }
                rest.strip_prefix('_')?
            }
            _ => name,
        };
        if name.is_empty() {
            return None;
        }
        if self.config.normalize {
            Some(name.to_lowercase().replace('_', "."))
        } else {
            Some(name.to_string())
        }
    }
}

impl_from!(EnvSourceConfig => EnvSource);

impl ConfigSource for EnvSource {
    fn load_config(&self) -> Result<HashMap<String, String>, SourceNotAvailable> {
        // 非 UTF-8 的变量直接跳过
        Ok(std::env::vars_os()
            .filter_map(|(name, value)| {
                let name = name.into_string().ok()?;
                let value = value.into_string().ok()?;
                Some((self.map_key(&name)?, value))
            })
            .collect())
    }
}
