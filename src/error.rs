//! 错误类型
//!
//! 按照失败语义划分：
//! - `SourceNotAvailable`: 配置源不可用（网络、鉴权、解析等），初始加载时致命，之后只跳过当前周期
//! - `BindingError`: 原始字符串无法转换为属性类型，旧值保留
//! - `DeclarationError`: 绑定目标声明不合法，属于编程错误，构造时立即返回
//! - `ConfigError`: 对外统一的错误类型

use std::fmt;

use thiserror::Error;

/// 任意底层错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 配置源不可用的原因分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailability {
    /// 无法连接
    Unreachable,
    /// 鉴权失败
    Unauthorized,
    /// 后端已密封（secret manager）
    Sealed,
    /// 后端尚未初始化
    Uninitialized,
    /// 请求的路径或集合不存在
    NotFound,
    /// 返回内容无法解析
    Malformed,
    /// 本地 IO 错误
    Io,
}

impl fmt::Display for Unavailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => write!(f, "unreachable"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Sealed => write!(f, "sealed"),
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::NotFound => write!(f, "not found"),
            Self::Malformed => write!(f, "malformed"),
            Self::Io => write!(f, "io"),
        }
    }
}

/// 配置源不可用
#[derive(Error, Debug)]
#[error("config source not available ({reason}): {message}")]
pub struct SourceNotAvailable {
    pub reason: Unavailability,
    pub message: String,
    #[source]
    pub cause: Option<BoxError>,
}

impl SourceNotAvailable {
    pub fn new(reason: Unavailability, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
            cause: None,
        }
    }

    /// 附带底层错误
    pub fn with_cause(
        reason: Unavailability,
        message: impl Into<String>,
        cause: impl Into<BoxError>,
    ) -> Self {
        Self {
            reason,
            message: message.into(),
            cause: Some(cause.into()),
        }
    }
}

impl From<std::io::Error> for SourceNotAvailable {
    fn from(e: std::io::Error) -> Self {
        Self::with_cause(Unavailability::Io, e.to_string(), e)
    }
}

/// 原始值绑定失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot bind value '{raw}' to {kind}: {message}")]
pub struct BindingError {
    /// 原始字符串
    pub raw: String,
    /// 目标类型描述
    pub kind: String,
    pub message: String,
}

impl BindingError {
    pub fn new(raw: &str, kind: impl fmt::Display, message: impl Into<String>) -> Self {
        Self {
            raw: raw.to_string(),
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}

/// 绑定目标声明错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeclarationError {
    #[error("'static' or 'final' declaration is not supported on field '{field}'")]
    StaticOrFinal { field: String },

    #[error("unsupported type on field '{field}': {kind}")]
    UnsupportedType { field: String, kind: String },
}

/// 配置注册表错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("source '{name}' failed: {source}")]
    Source {
        name: String,
        source: SourceNotAvailable,
    },

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    #[error("missing value for property '{0}'")]
    MissingValue(String),

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("duplicate source name '{0}'")]
    DuplicateSource(String),

    #[error("unknown source '{0}'")]
    UnknownSource(String),

    #[error("failed to start reloader: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_source_not_available_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = SourceNotAvailable::with_cause(Unavailability::Unreachable, "vault down", io);

        assert_eq!(err.reason, Unavailability::Unreachable);
        assert!(err.to_string().contains("unreachable"));
        assert!(err.to_string().contains("vault down"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_declaration_error_messages() {
        let err = DeclarationError::StaticOrFinal {
            field: "default_instance".to_string(),
        };
        assert!(err.to_string().contains("'static' or 'final'"));
        assert!(err.to_string().contains("not supported"));

        let err = DeclarationError::UnsupportedType {
            field: "list".to_string(),
            kind: "list<?>".to_string(),
        };
        assert!(err.to_string().starts_with("unsupported type on field"));
    }

    #[test]
    fn test_config_error_source_chain() {
        let err = ConfigError::Source {
            name: "vault".to_string(),
            source: SourceNotAvailable::new(Unavailability::Sealed, "vault is sealed"),
        };
        assert!(err.to_string().contains("source 'vault' failed"));
        assert!(err.source().is_some());
    }
}
