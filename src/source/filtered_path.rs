//! 按谓词分组的路径配置合并
//!
//! 一组 `(path, key -> value)` 加上一个有序谓词列表：每个谓词选出一部分路径，
//! 按谓词顺序合并，先出现的值优先。环境相关的覆盖目录放在前面，公共的 root 组放在最后。

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::properties::parse_properties;
use crate::error::SourceNotAvailable;

/// 路径谓词
pub type PathPredicate = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// 带名字的分组谓词
#[derive(Clone)]
pub struct NamedPredicate {
    pub name: String,
    pub predicate: PathPredicate,
}

impl NamedPredicate {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        (self.predicate)(path)
    }
}

impl fmt::Debug for NamedPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedPredicate")
            .field("name", &self.name)
            .finish()
    }
}

/// 单个文件解析出的配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConfig {
    pub path: PathBuf,
    pub values: HashMap<String, String>,
}

/// 读取被任一谓词选中的文件
pub fn load_path_configs(
    paths: &[PathBuf],
    predicates: &[NamedPredicate],
) -> Result<Vec<PathConfig>, SourceNotAvailable> {
    paths
        .iter()
        .filter(|path| predicates.iter().any(|p| p.matches(path)))
        .map(|path| {
            let content = std::fs::read_to_string(path).map_err(|e| {
                log::error!("load properties from '{}' failed: {}", path.display(), e);
                SourceNotAvailable::from(e)
            })?;
            Ok(PathConfig {
                path: path.clone(),
                values: parse_properties(&content),
            })
        })
        .collect()
}

/// 按谓词顺序合并，先出现的 key 优先
///
/// 同一个谓词选中多个文件时，按路径字典序处理，保证结果确定
pub fn merge_filtered(
    configs: &[PathConfig],
    predicates: &[NamedPredicate],
) -> HashMap<String, String> {
    let mut sorted: Vec<&PathConfig> = configs.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut result = HashMap::new();
    for predicate in predicates {
        for config in sorted.iter().filter(|c| predicate.matches(&c.path)) {
            for (key, value) in &config.values {
                result
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }
    }
    result
}
