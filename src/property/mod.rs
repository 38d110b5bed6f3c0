//! 强类型属性
//!
//! - `ConfigProperty<T>`: 单个 key 的属性
//! - `ObjectProperty<T>`: 以 `prefix.field` 组织的一组 key 绑定成一个对象

pub mod object;
pub mod scalar;
pub mod types;

pub use object::{ConfigObject, ObjectProperty};
pub use scalar::ConfigProperty;
pub use types::{Multimap, PropertyType, ScalarType};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::merge::Snapshot;

pub(crate) type RawValidator = Arc<dyn Fn(Option<&str>) -> bool + Send + Sync>;
pub(crate) type Validator<T> = Arc<dyn Fn(Option<&T>) -> bool + Send + Sync>;
pub(crate) type Callback<T> = Arc<dyn Fn(Option<&T>, Option<&T>) -> anyhow::Result<()> + Send + Sync>;

/// 一次刷新的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Refresh {
    /// 值未变化
    Unchanged,
    /// 新值已生效
    Applied { callback_failures: usize },
    /// 绑定或校验失败，旧值保留
    Rejected(String),
}

/// 由注册中心统一驱动刷新的属性
pub(crate) trait ManagedProperty: Send + Sync {
    fn name(&self) -> &str;

    /// 属性是否依赖该配置 key
    fn depends_on(&self, key: &str) -> bool;

    /// 从快照重新读取依赖的 key
    fn refresh(&self, snapshot: &Snapshot) -> Refresh;
}

/// 执行用户代码，错误和 panic 都只记录日志
pub(crate) fn invoke_isolated<F>(label: &str, f: F) -> Result<(), ()>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            log::error!("{} failed: {:?}", label, e);
            Err(())
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("{} panicked: {}", label, message);
            Err(())
        }
    }
}

// 用户回调 panic 时不应让后续读写全部失败
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_isolated() {
        assert!(invoke_isolated("ok", || Ok(())).is_ok());
        assert!(invoke_isolated("err", || Err(anyhow::anyhow!("boom"))).is_err());
        assert!(invoke_isolated("panic", || panic!("boom")).is_err());
    }
}
