//! 目录配置源
//!
//! 扫描基础目录下的文件，按分组谓词合并 `.properties` 内容

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use super::filtered_path::{load_path_configs, merge_filtered, NamedPredicate, PathPredicate};
use super::ConfigSource;
use crate::error::{SourceNotAvailable, Unavailability};

/// 分组配置
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GroupConfig {
    pub name: String,
    /// 相对基础目录的 glob 模式，如 `prod/**`
    pub pattern: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, SmartDefault)]
#[serde(default)]
pub struct DirectorySourceConfig {
    /// 基础目录，支持 `~` 和环境变量
    #[default = "config"]
    pub directory: String,

    /// 文件选择模式，同时作为 root 组
    #[default = "**/*.properties"]
    pub file_pattern: String,

    /// 分组，按声明顺序优先，全部排在 root 组之前
    pub groups: Vec<GroupConfig>,
}

/// 目录配置源
///
/// 分组谓词都会与文件谓词组合，root 组（只有文件谓词）放在最后。
///
/// # 示例
/// ```no_run
/// use livecfg::{ConfigSource, DirectorySource};
///
/// // conf/prod/*.properties 覆盖 conf/*.properties
/// let source = DirectorySource::builder("conf")
///     .file_filter(|p| p.extension().map_or(false, |e| e == "properties"))
///     .group("prod", |p| p.to_string_lossy().contains("/prod/"))
///     .build();
/// let config = source.load_config().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct DirectorySource {
    directory: PathBuf,
    predicates: Vec<NamedPredicate>,
}

pub struct DirectorySourceBuilder {
    directory: PathBuf,
    file_filter: PathPredicate,
    groups: Vec<NamedPredicate>,
}

impl DirectorySourceBuilder {
    pub fn file_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        self.file_filter = Arc::new(filter);
        self
    }

    /// 添加分组，先添加的优先
    pub fn group<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        self.groups.push(NamedPredicate::new(name, predicate));
        self
    }

    pub fn build(self) -> DirectorySource {
        let mut predicates = Vec::with_capacity(self.groups.len() + 1);
        for group in self.groups {
            let file_filter = self.file_filter.clone();
            let predicate = group.predicate;
            predicates.push(NamedPredicate {
                name: group.name,
                predicate: Arc::new(move |p: &Path| file_filter(p) && predicate(p)),
            });
        }
        predicates.push(NamedPredicate {
            name: "root".to_string(),
            predicate: self.file_filter,
        });

        DirectorySource {
            directory: self.directory,
            predicates,
        }
    }
}

impl DirectorySource {
    pub fn builder(directory: impl Into<PathBuf>) -> DirectorySourceBuilder {
        DirectorySourceBuilder {
            directory: directory.into(),
            file_filter: Arc::new(|_: &Path| true),
            groups: Vec::new(),
        }
    }

    /// 从配置创建，glob 模式不合法时返回错误
    pub fn new(config: DirectorySourceConfig) -> anyhow::Result<Self> {
        let directory = PathBuf::from(shellexpand::full(&config.directory)?.to_string());

        let file_pattern = relative_pattern(&directory, &config.file_pattern)?;
        let mut builder = Self::builder(directory).file_filter(file_pattern);
        for group in config.groups {
            let pattern = relative_pattern(&builder.directory, &group.pattern)?;
            builder = builder.group(group.name, pattern);
        }
        Ok(builder.build())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// 分组名，按优先级排列
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.predicates.iter().map(|p| p.name.as_str())
    }

    fn scan(&self) -> Result<Vec<PathBuf>, SourceNotAvailable> {
        let root = dunce::canonicalize(&self.directory).map_err(|e| {
            SourceNotAvailable::with_cause(
                Unavailability::NotFound,
                format!("directory '{}' not accessible", self.directory.display()),
                e,
            )
        })?;

        let mut files = Vec::new();
        let mut pending = vec![root];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                // 不跟随符号链接目录，避免链接成环时无限递归
                if entry.file_type()?.is_dir() {
                    pending.push(entry.path());
                } else {
                    files.push(entry.path());
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

/// 把 glob 模式转换为相对基础目录匹配的谓词
fn relative_pattern(
    directory: &Path,
    pattern: &str,
) -> anyhow::Result<impl Fn(&Path) -> bool + Send + Sync + 'static> {
    let pattern = glob::Pattern::new(pattern)?;
    let directory = directory.to_path_buf();
    // 目录可能在创建数据源之后才出现，每次匹配时重新解析
    Ok(move |path: &Path| {
        let base = dunce::canonicalize(&directory).unwrap_or_else(|_| directory.clone());
        let relative = path.strip_prefix(&base).unwrap_or(path);
        pattern.matches_path(relative)
    })
}

impl ConfigSource for DirectorySource {
    fn load_config(&self) -> Result<HashMap<String, String>, SourceNotAvailable> {
        let files = self.scan()?;
        let configs = load_path_configs(&files, &self.predicates)?;
        Ok(merge_filtered(&configs, &self.predicates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn layout() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("prod")).unwrap();
        fs::create_dir_all(dir.path().join("staging")).unwrap();
        fs::write(dir.path().join("app.properties"), "host=localhost\nport=8080\nname=app\n").unwrap();
        fs::write(dir.path().join("prod/app.properties"), "host=prod.local\n").unwrap();
        fs::write(dir.path().join("staging/app.properties"), "host=staging.local\nport=9090\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "host=ignored\n").unwrap();
        dir
    }

    #[test]
    fn test_groups_override_root() {
        let dir = layout();
        let source = DirectorySource::new(DirectorySourceConfig {
            directory: dir.path().to_string_lossy().to_string(),
            file_pattern: "**/*.properties".to_string(),
            groups: vec![
                GroupConfig {
                    name: "prod".to_string(),
                    pattern: "prod/*".to_string(),
                },
                GroupConfig {
                    name: "staging".to_string(),
                    pattern: "staging/*".to_string(),
                },
            ],
        })
        .unwrap();

        assert_eq!(source.groups().collect::<Vec<_>>(), vec!["prod", "staging", "root"]);

        let config = source.load_config().unwrap();
        assert_eq!(config["host"], "prod.local");
        assert_eq!(config["port"], "9090");
        assert_eq!(config["name"], "app");
    }

    #[test]
    fn test_file_filter_only() {
        let dir = layout();
        let source = DirectorySource::builder(dir.path())
            .file_filter(|p| p.extension().map_or(false, |e| e == "txt"))
            .build();

        let config = source.load_config().unwrap();
        assert_eq!(config.len(), 1);
        assert_eq!(config["host"], "ignored");
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let source = DirectorySource::builder(dir.path().join("nope")).build();
        let err = source.load_config().unwrap_err();
        assert_eq!(err.reason, Unavailability::NotFound);
    }

    #[test]
    fn test_directory_created_after_source() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("conf");
        let source = DirectorySource::new(DirectorySourceConfig {
            directory: base.to_string_lossy().to_string(),
            file_pattern: "**/*.properties".to_string(),
            groups: vec![GroupConfig {
                name: "prod".to_string(),
                pattern: "prod/*".to_string(),
            }],
        })
        .unwrap();
        assert!(source.load_config().is_err());

        fs::create_dir_all(base.join("prod")).unwrap();
        fs::write(base.join("app.properties"), "host=localhost\n").unwrap();
        fs::write(base.join("prod/app.properties"), "host=prod.local\n").unwrap();

        let config = source.load_config().unwrap();
        assert_eq!(config["host"], "prod.local");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_is_not_followed() {
        let dir = layout();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("prod/loop")).unwrap();
        let source = DirectorySource::builder(dir.path())
            .file_filter(|p| p.extension().map_or(false, |e| e == "properties"))
            .build();

        let config = source.load_config().unwrap();
        assert_eq!(config["name"], "app");
    }

    #[test]
    fn test_invalid_pattern() {
        let config = DirectorySourceConfig {
            file_pattern: "[".to_string(),
            ..Default::default()
        };
        assert!(DirectorySource::new(config).is_err());
    }
}
