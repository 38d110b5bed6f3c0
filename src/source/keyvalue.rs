//! 键值文档存储配置源
//!
//! 配置按集合存放，集合可以带分组前缀（如 `prod.app`）。查询时先按声明顺序查询
//! 各分组集合，最后查询不带分组的 root 集合，先出现的 key 优先。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ConfigSource;
use crate::error::SourceNotAvailable;

/// 集合名，由可选的分组名和集合名组成
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyValueConfigName {
    pub group: Option<String>,
    pub collection: String,
}

impl KeyValueConfigName {
    pub fn new(group: Option<String>, collection: impl Into<String>) -> Self {
        Self {
            group,
            collection: collection.into(),
        }
    }

    /// `group.collection`，没有分组时就是集合名
    pub fn qualified_name(&self) -> String {
        match &self.group {
            Some(group) => format!("{}.{}", group, self.collection),
            None => self.collection.clone(),
        }
    }
}

impl fmt::Display for KeyValueConfigName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}

/// 存储中的一条配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueConfigEntity {
    #[serde(rename = "propName")]
    pub property_name: String,
    #[serde(rename = "propValue")]
    pub property_value: String,
    #[serde(default)]
    pub disabled: bool,
}

impl KeyValueConfigEntity {
    pub fn new(property_name: impl Into<String>, property_value: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
            property_value: property_value.into(),
            disabled: false,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// 文档存储访问接口
pub trait KeyValueRepository: Send + Sync {
    /// 读取集合中的全部配置，集合不存在时返回空列表
    fn find_all(
        &self,
        name: &KeyValueConfigName,
    ) -> Result<Vec<KeyValueConfigEntity>, SourceNotAvailable>;
}

/// 键值文档存储配置源
pub struct KeyValueSource {
    repository: Arc<dyn KeyValueRepository>,
    names: Vec<KeyValueConfigName>,
}

impl KeyValueSource {
    /// # 参数
    /// - `repository`: 存储访问
    /// - `collection`: 集合名
    /// - `groups`: 分组，先声明的优先
    pub fn new<I, S>(
        repository: Arc<dyn KeyValueRepository>,
        collection: impl Into<String>,
        groups: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let collection = collection.into();
        let mut names: Vec<KeyValueConfigName> = groups
            .into_iter()
            .map(|group| KeyValueConfigName::new(Some(group.into()), collection.clone()))
            .collect();
        names.push(KeyValueConfigName::new(None, collection));
        Self { repository, names }
    }

    /// 按查询顺序排列的集合名
    pub fn names(&self) -> &[KeyValueConfigName] {
        &self.names
    }
}

impl ConfigSource for KeyValueSource {
    fn load_config(&self) -> Result<HashMap<String, String>, SourceNotAvailable> {
        let mut result = HashMap::new();
        for name in &self.names {
            let entities = self.repository.find_all(name).map_err(|e| {
                log::warn!("load key-value collection '{}' failed: {}", name, e);
                e
            })?;
            for entity in entities.into_iter().filter(|e| !e.disabled) {
                result
                    .entry(entity.property_name)
                    .or_insert(entity.property_value);
            }
        }
        Ok(result)
    }
}
