//! 配置变更事件与审计记录

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::merge::{ChangeType, KeyChange};

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Added,
    Updated,
    Removed,
    /// 新值被绑定或校验拒绝，属性保留旧值
    Rejected,
}

impl From<ChangeType> for EventKind {
    fn from(change: ChangeType) -> Self {
        match change {
            ChangeType::Added => Self::Added,
            ChangeType::Updated => Self::Updated,
            ChangeType::Removed => Self::Removed,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Updated => write!(f, "updated"),
            Self::Removed => write!(f, "removed"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// 配置变更事件，创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigEvent {
    pub key: String,
    pub kind: EventKind,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub old_source: Option<String>,
    pub new_source: Option<String>,
    /// 产生事件的 registry 所在主机
    pub host: String,
    /// 仅 `Rejected` 事件携带
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConfigEvent {
    pub(crate) fn from_change(change: &KeyChange, host: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            key: change.key.clone(),
            kind: change.change_type().into(),
            old_value: change.old.as_ref().map(|e| e.value.clone()),
            new_value: change.new.as_ref().map(|e| e.value.clone()),
            old_source: change.old.as_ref().map(|e| e.source.clone()),
            new_source: change.new.as_ref().map(|e| e.source.clone()),
            host: host.to_string(),
            reason: None,
            timestamp,
        }
    }

    pub(crate) fn rejected(
        change: &KeyChange,
        host: &str,
        reason: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: EventKind::Rejected,
            reason: Some(reason),
            ..Self::from_change(change, host, timestamp)
        }
    }

    /// 产生新值的配置源，删除事件取旧值的来源
    pub fn source_name(&self) -> Option<&str> {
        self.new_source
            .as_deref()
            .or(self.old_source.as_deref())
    }
}

impl fmt::Display for ConfigEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {:?} -> {:?} (source: {})",
            self.host,
            self.kind,
            self.key,
            self.old_value,
            self.new_value,
            self.source_name().unwrap_or("-")
        )?;
        if let Some(reason) = &self.reason {
            write!(f, ", reason: {}", reason)?;
        }
        Ok(())
    }
}

/// 固定容量的最近事件记录，满了以后淘汰最早的事件
#[derive(Debug)]
pub struct AuditTrail {
    capacity: usize,
    events: Mutex<VecDeque<ConfigEvent>>,
}

impl AuditTrail {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, event: ConfigEvent) {
        if self.capacity == 0 {
            return;
        }
        let mut events = self.lock();
        while events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// 按时间顺序返回保留的事件
    pub fn recent(&self) -> Vec<ConfigEvent> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ConfigEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 事件监听器
pub type Listener = Arc<dyn Fn(&ConfigEvent) -> anyhow::Result<()> + Send + Sync>;

/// 通过 `log::info!` 输出每个事件
pub fn logging_listener() -> Listener {
    Arc::new(|event: &ConfigEvent| {
        log::info!(target: "livecfg::events", "{}", event);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::SnapshotEntry;

    fn event(key: &str) -> ConfigEvent {
        let change = KeyChange {
            key: key.to_string(),
            old: None,
            new: Some(SnapshotEntry {
                value: "v".to_string(),
                source: "memory".to_string(),
            }),
        };
        ConfigEvent::from_change(&change, "host-1", Utc::now())
    }

    #[test]
    fn test_event_from_change() {
        let e = event("a");
        assert_eq!(e.kind, EventKind::Added);
        assert_eq!(e.new_value.as_deref(), Some("v"));
        assert_eq!(e.source_name(), Some("memory"));
        assert_eq!(e.host, "host-1");
        assert!(e.to_string().contains("added a"));
    }

    #[test]
    fn test_rejected_event() {
        let change = KeyChange {
            key: "port".to_string(),
            old: Some(SnapshotEntry {
                value: "80".to_string(),
                source: "file".to_string(),
            }),
            new: Some(SnapshotEntry {
                value: "abc".to_string(),
                source: "file".to_string(),
            }),
        };
        let e = ConfigEvent::rejected(&change, "h", "not a number".to_string(), Utc::now());
        assert_eq!(e.kind, EventKind::Rejected);
        assert_eq!(e.reason.as_deref(), Some("not a number"));
        assert_eq!(e.old_value.as_deref(), Some("80"));
    }

    #[test]
    fn test_trail_evicts_oldest() {
        let trail = AuditTrail::new(3);
        for key in ["a", "b", "c", "d", "e"] {
            trail.push(event(key));
            assert!(trail.len() <= trail.capacity());
        }
        let keys: Vec<_> = trail.recent().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["c", "d", "e"]);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let trail = AuditTrail::new(0);
        trail.push(event("a"));
        assert!(trail.is_empty());
    }

    #[test]
    fn test_event_serialize() {
        let json = serde_json::to_value(event("a")).unwrap();
        assert_eq!(json["kind"], "added");
        assert_eq!(json["key"], "a");
    }

    #[test]
    fn test_logging_listener() {
        assert!(logging_listener()(&event("a")).is_ok());
    }
}
