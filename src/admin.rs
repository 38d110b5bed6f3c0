//! 只读的管理接口
//!
//! 通过 HTTP 暴露注册中心的当前状态，不提供任何写操作：
//!
//! | 路径 | 内容 |
//! |---|---|
//! | `GET /` | 注册中心概要 |
//! | `GET /configs` | 所有 key 的值和来源 |
//! | `GET /configs/{key}` | 单个 key |
//! | `GET /events` | 最近的变更事件 |
//! | `GET /status` | reload 状态 |

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;

use crate::audit::ConfigEvent;
use crate::merge::SnapshotEntry;
use crate::registry::{ConfigRegistry, ReloadStatus};

type SharedRegistry = Arc<ConfigRegistry>;

#[derive(Debug, Serialize)]
struct RegistryInfo {
    name: String,
    host: String,
    sources: Vec<String>,
    /// 关闭周期 reload 时为 `null`
    reload_interval_sec: Option<u64>,
    recent_events_capacity: usize,
    keys: usize,
    properties: usize,
}

async fn info(State(registry): State<SharedRegistry>) -> Json<RegistryInfo> {
    let settings = registry.settings();
    Json(RegistryInfo {
        name: settings.management_name().to_string(),
        host: settings.host().to_string(),
        sources: registry.sources().into_iter().map(str::to_string).collect(),
        reload_interval_sec: settings.reload_interval().map(|d| d.as_secs()),
        recent_events_capacity: settings.recent_config_events_num(),
        keys: registry.snapshot().len(),
        properties: registry.materialized_count(),
    })
}

async fn configs(State(registry): State<SharedRegistry>) -> Json<BTreeMap<String, SnapshotEntry>> {
    let snapshot = registry.snapshot();
    Json(
        snapshot
            .iter()
            .map(|(key, entry)| (key.to_string(), entry.clone()))
            .collect(),
    )
}

async fn config(
    State(registry): State<SharedRegistry>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    match registry.snapshot().entry(&key) {
        Some(entry) => (
            StatusCode::OK,
            Json(json!({ "key": key, "value": entry.value, "source": entry.source })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("key '{}' not found", key) })),
        ),
    }
}

async fn events(State(registry): State<SharedRegistry>) -> Json<Vec<ConfigEvent>> {
    Json(registry.recent_events())
}

async fn status(State(registry): State<SharedRegistry>) -> Json<ReloadStatus> {
    Json(registry.reload_status())
}

/// 管理接口路由，不考虑 `management_enabled`
pub fn router(registry: SharedRegistry) -> Router {
    Router::new()
        .route("/", get(info))
        .route("/configs", get(configs))
        .route("/configs/{key}", get(config))
        .route("/events", get(events))
        .route("/status", get(status))
        .with_state(registry)
}

/// 管理接口关闭时返回 `None`
pub fn management_router(registry: SharedRegistry) -> Option<Router> {
    if registry.settings().is_management_enabled() {
        Some(router(registry))
    } else {
        None
    }
}

/// 在 `addr` 上启动管理接口，直到服务退出
///
/// # 示例
/// ```no_run
/// use std::sync::Arc;
/// use livecfg::{admin, ConfigRegistry, ConfigRegistrySettings, EnvSource};
///
/// # async fn run() -> anyhow::Result<()> {
/// let registry = Arc::new(ConfigRegistry::create(
///     ConfigRegistrySettings::builder()
///         .add_last_source("env", EnvSource::default())
///         .build()?,
/// )?);
/// admin::serve(registry, "127.0.0.1:9900").await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(registry: SharedRegistry, addr: &str) -> Result<()> {
    let name = registry.settings().management_name().to_string();
    let app = match management_router(registry) {
        Some(app) => app,
        None => {
            log::info!("management exposure disabled for {}", name);
            return Ok(());
        }
    };

    let listener = TcpListener::bind(addr).await?;
    log::info!("{} listening on http://{}", name, listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ConfigRegistrySettings;
    use crate::source::InMemorySource;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value as JsonValue;
    use tower::ServiceExt;

    fn registry(source: InMemorySource, management_enabled: bool) -> SharedRegistry {
        let settings = ConfigRegistrySettings::builder()
            .add_last_source("memory", source)
            .no_reload()
            .management_enabled(management_enabled)
            .host("admin-host")
            .build()
            .unwrap();
        Arc::new(ConfigRegistry::create(settings).unwrap())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, JsonValue) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_info_and_configs() {
        let app = router(registry(InMemorySource::from([("a", "1"), ("b", "2")]), true));

        let (status, body) = get_json(app.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "livecfg:name=ConfigRegistry");
        assert_eq!(body["host"], "admin-host");
        assert_eq!(body["keys"], 2);
        assert!(body["reload_interval_sec"].is_null());

        let (_, body) = get_json(app.clone(), "/configs").await;
        assert_eq!(body["a"]["value"], "1");
        assert_eq!(body["b"]["source"], "memory");

        let (status, body) = get_json(app.clone(), "/configs/a").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["value"], "1");

        let (status, _) = get_json(app, "/configs/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_events_and_status() {
        let source = InMemorySource::default();
        let registry = registry(source.clone(), true);
        source.set("k", "v");
        registry.reload().unwrap();

        let app = router(registry);
        let (_, body) = get_json(app.clone(), "/events").await;
        assert_eq!(body[0]["key"], "k");
        assert_eq!(body[0]["kind"], "added");

        let (_, body) = get_json(app, "/status").await;
        assert_eq!(body["cycles"], 2);
        assert_eq!(body["failures"], 0);
    }

    #[test]
    fn test_management_disabled() {
        assert!(management_router(registry(InMemorySource::default(), false)).is_none());
        assert!(management_router(registry(InMemorySource::default(), true)).is_some());
    }
}
