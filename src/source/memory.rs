//! 内存配置源
//!
//! 内容可以在运行时修改，下一个 reload 周期生效。常用于测试和程序内覆盖。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use super::ConfigSource;
use crate::error::SourceNotAvailable;
use crate::impl_from;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InMemorySourceConfig {
    /// 初始内容
    #[serde(default)]
    pub values: HashMap<String, String>,
}

/// 内存配置源
///
/// 克隆得到的实例共享同一份数据，注册到 registry 后仍然可以通过克隆修改内容
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemorySource {
    pub fn new(config: InMemorySourceConfig) -> Self {
        Self {
            values: Arc::new(RwLock::new(config.values)),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.write().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.write().remove(key)
    }

    /// 整体替换内容
    pub fn replace(&self, values: HashMap<String, String>) {
        *self.write() = values;
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, String>> {
        self.values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl_from!(InMemorySourceConfig => InMemorySource);

impl<K, V, const N: usize> From<[(K, V); N]> for InMemorySource
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(entries: [(K, V); N]) -> Self {
        Self::new(InMemorySourceConfig {
            values: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        })
    }
}

impl ConfigSource for InMemorySource {
    fn load_config(&self) -> Result<HashMap<String, String>, SourceNotAvailable> {
        Ok(self
            .values
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }
}
