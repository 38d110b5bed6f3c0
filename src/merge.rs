//! 配置源合并
//!
//! 按注册顺序依次加载所有配置源，先注册的配置源在 key 冲突时优先。
//! 合并结果是不可变的 `Snapshot`，每个 reload 周期重新生成。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::ConfigError;
use crate::source::ConfigSource;

/// 已注册的配置源
#[derive(Clone)]
pub struct SourceRegistration {
    pub name: String,
    pub source: Arc<dyn ConfigSource>,
}

impl SourceRegistration {
    pub fn new(name: impl Into<String>, source: Arc<dyn ConfigSource>) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

impl fmt::Debug for SourceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistration")
            .field("name", &self.name)
            .finish()
    }
}

/// 快照中的一个值及其来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotEntry {
    pub value: String,
    pub source: String,
}

/// 一次合并的结果，key 按字典序排列
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    entries: BTreeMap<String, SnapshotEntry>,
}

/// key 的变化类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeType {
    Added,
    Updated,
    Removed,
}

/// 两个快照之间单个 key 的变化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChange {
    pub key: String,
    pub old: Option<SnapshotEntry>,
    pub new: Option<SnapshotEntry>,
}

impl KeyChange {
    pub fn change_type(&self) -> ChangeType {
        match (&self.old, &self.new) {
            (None, _) => ChangeType::Added,
            (Some(_), None) => ChangeType::Removed,
            (Some(_), Some(_)) => ChangeType::Updated,
        }
    }
}

impl Snapshot {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.value.as_str())
    }

    pub fn entry(&self, key: &str) -> Option<&SnapshotEntry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SnapshotEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    /// 只保留值的映射
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    /// 与更新的快照比较，只比较值，来源变化但值相同不算变化
    ///
    /// 结果按 key 字典序排列
    pub fn diff(&self, newer: &Snapshot) -> Vec<KeyChange> {
        let mut changes = Vec::new();
        for (key, old) in &self.entries {
            match newer.entries.get(key) {
                Some(new) if new.value == old.value => {}
                new => changes.push(KeyChange {
                    key: key.clone(),
                    old: Some(old.clone()),
                    new: new.cloned(),
                }),
            }
        }
        for (key, new) in &newer.entries {
            if !self.entries.contains_key(key) {
                changes.push(KeyChange {
                    key: key.clone(),
                    old: None,
                    new: Some(new.clone()),
                });
            }
        }
        changes.sort_by(|a, b| a.key.cmp(&b.key));
        changes
    }
}

impl FromIterator<(String, SnapshotEntry)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, SnapshotEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// 合并所有配置源
///
/// 任一配置源失败时整个合并失败，返回 `ConfigError::Source`
pub fn merge(sources: &[SourceRegistration]) -> Result<Snapshot, ConfigError> {
    let mut entries = BTreeMap::new();
    for registration in sources {
        let config = registration
            .source
            .load_config()
            .map_err(|e| ConfigError::Source {
                name: registration.name.clone(),
                source: e,
            })?;

        for (key, value) in config {
            entries.entry(key).or_insert_with(|| SnapshotEntry {
                value,
                source: registration.name.clone(),
            });
        }
    }
    Ok(Snapshot { entries })
}
