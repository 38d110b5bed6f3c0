//! Vault secret 配置源
//!
//! 读取一个 secret 路径下的全部键值，支持 KV v1 和 KV v2 两种返回格式

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use smart_default::SmartDefault;

use super::ConfigSource;
use crate::binder::duration::{serde_as, HumanDur};
use crate::error::{SourceNotAvailable, Unavailability};

pub const VAULT_ADDR_ENV: &str = "VAULT_ADDR";
pub const VAULT_TOKEN_ENV: &str = "VAULT_TOKEN";
pub const VAULT_SECRETS_PATH_ENV: &str = "VAULT_SECRETS_PATH";

/// Vault 配置源的配置
///
/// `address`、`token`、`secrets_path` 为空时分别读取 `VAULT_ADDR`、`VAULT_TOKEN`、
/// `VAULT_SECRETS_PATH` 环境变量
#[serde_as]
#[derive(Debug, Clone, Deserialize, Serialize, SmartDefault)]
#[serde(default)]
pub struct VaultSourceConfig {
    /// 如 "http://127.0.0.1:8200"
    pub address: String,
    pub token: String,
    /// 如 "secret/application/tenant1"
    pub secrets_path: String,

    /// 单次请求超时
    #[serde_as(as = "HumanDur")]
    #[default(Duration::from_secs(5))]
    pub timeout: Duration,

    /// 读取前检查 Vault 是否已初始化、是否已密封
    #[default = true]
    pub check_health: bool,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    initialized: bool,
    sealed: bool,
}

#[derive(Debug, Deserialize)]
struct SecretResponse {
    data: serde_json::Map<String, JsonValue>,
}

/// Vault 配置源
///
/// # 示例
/// ```no_run
/// use livecfg::{ConfigSource, VaultSource, VaultSourceConfig};
///
/// let source = VaultSource::new(VaultSourceConfig {
///     address: "http://127.0.0.1:8200".to_string(),
///     token: "my-root-token".to_string(),
///     secrets_path: "secret/application/tenant1".to_string(),
///     ..Default::default()
/// }).unwrap();
///
/// let secrets = source.load_config().unwrap();
/// ```
pub struct VaultSource {
    address: String,
    token: String,
    secrets_path: String,
    check_health: bool,
    client: reqwest::blocking::Client,
}

fn or_env(value: String, name: &str) -> Result<String> {
    if !value.is_empty() {
        return Ok(value);
    }
    std::env::var(name).map_err(|_| anyhow!("未配置且环境变量 {} 不存在", name))
}

impl VaultSource {
    /// 创建 Vault 配置源
    ///
    /// 缺少地址、token 或路径时返回错误，不会发出任何请求
    pub fn new(config: VaultSourceConfig) -> Result<Self> {
        let address = or_env(config.address, VAULT_ADDR_ENV)?;
        let token = or_env(config.token, VAULT_TOKEN_ENV)?;
        let secrets_path = or_env(config.secrets_path, VAULT_SECRETS_PATH_ENV)?;

        Ok(Self {
            address: address.trim_end_matches('/').to_string(),
            token,
            secrets_path: secrets_path.trim_matches('/').to_string(),
            check_health: config.check_health,
            client: reqwest::blocking::Client::builder()
                .timeout(config.timeout)
                .build()?,
        })
    }

    pub fn secrets_path(&self) -> &str {
        &self.secrets_path
    }

    fn request_error(&self, e: reqwest::Error) -> SourceNotAvailable {
        let reason = if e.is_connect() || e.is_timeout() {
            Unavailability::Unreachable
        } else {
            Unavailability::Malformed
        };
        SourceNotAvailable::with_cause(
            reason,
            format!("request to vault at '{}' failed", self.address),
            e,
        )
    }

    fn check_health(&self) -> Result<(), SourceNotAvailable> {
        let url = format!("{}/v1/sys/health", self.address);
        let resp = self.client.get(&url).send().map_err(|e| self.request_error(e))?;
        let status = resp.status();

        let health = match resp.json::<HealthResponse>() {
            Ok(health) => health,
            Err(e) => {
                let reason = match status.as_u16() {
                    501 => Unavailability::Uninitialized,
                    503 => Unavailability::Sealed,
                    _ => Unavailability::Malformed,
                };
                return Err(SourceNotAvailable::with_cause(
                    reason,
                    format!("unexpected vault health response ({})", status),
                    e,
                ));
            }
        };

        if !health.initialized {
            return Err(SourceNotAvailable::with_cause(
                Unavailability::Uninitialized,
                "vault is not initialized",
                format!("health check returned {}", status),
            ));
        }
        if health.sealed {
            return Err(SourceNotAvailable::with_cause(
                Unavailability::Sealed,
                "vault is sealed",
                format!("health check returned {}", status),
            ));
        }
        Ok(())
    }

    fn read_secrets(&self) -> Result<HashMap<String, String>, SourceNotAvailable> {
        let url = format!("{}/v1/{}", self.address, self.secrets_path);
        let resp = self
            .client
            .get(&url)
            .header("X-Vault-Token", &self.token)
            .send()
            .map_err(|e| self.request_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let reason = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Unavailability::Unauthorized,
                StatusCode::NOT_FOUND => Unavailability::NotFound,
                StatusCode::NOT_IMPLEMENTED => Unavailability::Uninitialized,
                StatusCode::SERVICE_UNAVAILABLE => Unavailability::Sealed,
                _ => Unavailability::Unreachable,
            };
            let body = resp.text().unwrap_or_default();
            let cause = if body.trim().is_empty() {
                format!("status {}", status)
            } else {
                format!("status {}: {}", status, body.trim())
            };
            return Err(SourceNotAvailable::with_cause(
                reason,
                format!("read '{}' returned {}", self.secrets_path, status),
                cause,
            ));
        }

        let body = resp.json::<SecretResponse>().map_err(|e| {
            SourceNotAvailable::with_cause(
                Unavailability::Malformed,
                format!("invalid secret payload at '{}'", self.secrets_path),
                e,
            )
        })?;
        Ok(flatten_secret(body.data))
    }
}

/// KV v2 的数据在 `data.data` 中，同时带有 `metadata`
fn flatten_secret(mut data: serde_json::Map<String, JsonValue>) -> HashMap<String, String> {
    if data.contains_key("metadata") {
        if let Some(JsonValue::Object(inner)) = data.remove("data") {
            data = inner;
        }
    }

    data.into_iter()
        .map(|(key, value)| {
            let value = match value {
                JsonValue::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

impl ConfigSource for VaultSource {
    fn load_config(&self) -> Result<HashMap<String, String>, SourceNotAvailable> {
        if self.check_health {
            self.check_health()?;
        }
        self.read_secrets()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEALTHY: &str = r#"{"initialized": true, "sealed": false, "standby": false}"#;

    fn source(address: String, path: &str) -> VaultSource {
        VaultSource::new(VaultSourceConfig {
            address,
            token: "my-root-token".to_string(),
            secrets_path: path.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config: VaultSourceConfig = serde_json::from_str(r#"{"timeout": "2s"}"#).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert!(config.check_health);
        assert!(config.address.is_empty());
    }

    #[test]
    fn test_read_kv_v1() {
        let mut server = mockito::Server::new();
        let health = server
            .mock("GET", "/v1/sys/health")
            .with_status(200)
            .with_body(HEALTHY)
            .create();
        let secret = server
            .mock("GET", "/v1/secret/application/tenant1")
            .match_header("X-Vault-Token", "my-root-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": {"top_secret": "password1", "db_password": "dbpassword1", "pool": 8}}"#)
            .create();

        let config = source(server.url(), "secret/application/tenant1")
            .load_config()
            .unwrap();

        health.assert();
        secret.assert();
        assert_eq!(config["top_secret"], "password1");
        assert_eq!(config["db_password"], "dbpassword1");
        assert_eq!(config["pool"], "8");
    }

    #[test]
    fn test_read_kv_v2() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/v1/sys/health")
            .with_status(200)
            .with_body(HEALTHY)
            .create();
        server
            .mock("GET", "/v1/secret/data/app")
            .with_status(200)
            .with_body(
                r#"{"data": {"data": {"password": "123456"}, "metadata": {"version": 3}}}"#,
            )
            .create();

        let config = source(server.url(), "/secret/data/app/").load_config().unwrap();
        assert_eq!(config.len(), 1);
        assert_eq!(config["password"], "123456");
    }

    #[test]
    fn test_sealed_and_uninitialized() {
        let mut server = mockito::Server::new();
        let sealed = server
            .mock("GET", "/v1/sys/health")
            .with_status(503)
            .with_body(r#"{"initialized": true, "sealed": true}"#)
            .create();
        let err = source(server.url(), "secret/app").load_config().unwrap_err();
        assert_eq!(err.reason, Unavailability::Sealed);
        assert!(std::error::Error::source(&err).is_some());
        sealed.remove();

        server
            .mock("GET", "/v1/sys/health")
            .with_status(501)
            .with_body("not json")
            .create();
        let err = source(server.url(), "secret/app").load_config().unwrap_err();
        assert_eq!(err.reason, Unavailability::Uninitialized);
    }

    #[test]
    fn test_status_classification() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/v1/sys/health")
            .with_status(200)
            .with_body(HEALTHY)
            .create();
        server
            .mock("GET", "/v1/secret/forbidden")
            .with_status(403)
            .with_body(r#"{"errors": ["permission denied"]}"#)
            .create();
        server
            .mock("GET", "/v1/secrets/unknown/path")
            .with_status(404)
            .with_body(r#"{"errors": []}"#)
            .create();

        let err = source(server.url(), "secret/forbidden").load_config().unwrap_err();
        assert_eq!(err.reason, Unavailability::Unauthorized);
        let cause = std::error::Error::source(&err).unwrap().to_string();
        assert!(cause.contains("403"), "{}", cause);
        assert!(cause.contains("permission denied"), "{}", cause);

        let err = source(server.url(), "secrets/unknown/path").load_config().unwrap_err();
        assert_eq!(err.reason, Unavailability::NotFound);
    }

    #[test]
    fn test_unreachable() {
        let source = VaultSource::new(VaultSourceConfig {
            address: "http://127.0.0.1:1".to_string(),
            token: "t".to_string(),
            secrets_path: "secret/app".to_string(),
            timeout: Duration::from_millis(500),
            check_health: false,
        })
        .unwrap();

        let err = source.load_config().unwrap_err();
        assert_eq!(err.reason, Unavailability::Unreachable);
        assert!(std::error::Error::source(&err).is_some());
    }
}
