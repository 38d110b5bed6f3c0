//! 保留最近一次成功结果的配置源包装

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use super::ConfigSource;
use crate::error::SourceNotAvailable;

/// 内部配置源失败时返回最近一次成功加载的内容
///
/// 把必需的配置源变成可选的：只要曾经成功过一次，之后的失败都不会让 reload 周期失败。
/// 从未成功过时仍然返回错误。
pub struct CachedSource<S> {
    inner: S,
    last_good: ArcSwapOption<HashMap<String, String>>,
}

impl<S: ConfigSource> CachedSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            last_good: ArcSwapOption::empty(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// 最近一次成功加载的内容
    pub fn last_good(&self) -> Option<Arc<HashMap<String, String>>> {
        self.last_good.load_full()
    }
}

impl<S: ConfigSource> ConfigSource for CachedSource<S> {
    fn load_config(&self) -> Result<HashMap<String, String>, SourceNotAvailable> {
        match self.inner.load_config() {
            Ok(config) => {
                self.last_good.store(Some(Arc::new(config.clone())));
                Ok(config)
            }
            Err(e) => match self.last_good.load_full() {
                Some(cached) => {
                    log::warn!("source failed, serving last known good config: {}", e);
                    Ok(cached.as_ref().clone())
                }
                None => Err(e),
            },
        }
    }
}
