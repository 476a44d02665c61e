//! Transport through a trusted local backend.
//!
//! The backend owns the conversation with the remote license service, so
//! parameters travel in the clear over the local hop:
//!
//! - `POST {base_url}/verify_card_key` `{cardKey, deviceCode, timestamp}`
//! - `POST {base_url}/unbind_card_key` `{cardKey, deviceCode, timestamp}`
//! - `GET  {base_url}/get_card_notice`
//!
//! Every reply is `{success, message, expire_time?, vip_expire_time?, content?}`.

use super::{
    malformed, parse_expire_time, LicenseTransport, LoginGrant, LoginRequest, ServiceReply,
    UnbindRequest, DEFAULT_TIMEOUT_SECS,
};
use crate::error::LicenseResult;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Configuration for the local backend proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Base URL of the backend, e.g. `http://127.0.0.1:17530`.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:17530".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CardKeyBody<'a> {
    card_key: &'a str,
    device_code: &'a str,
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct ProxyReply {
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    expire_time: Option<String>,
    #[serde(default)]
    vip_expire_time: Option<i64>,
    #[serde(default)]
    content: Option<String>,
}

/// Talks to the local backend proxy.
#[derive(Debug)]
pub struct ProxyTransport {
    config: ProxyConfig,
    client: Client,
}

impl ProxyTransport {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(config: ProxyConfig) -> LicenseResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    #[must_use]
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    fn url(&self, command: &str) -> String {
        format!("{}/{command}", self.config.base_url.trim_end_matches('/'))
    }

    async fn read_reply(response: Response) -> LicenseResult<ProxyReply> {
        let status = response.status();
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| malformed(format!("{status}: {e}")))
    }

    async fn post(&self, command: &str, body: &CardKeyBody<'_>) -> LicenseResult<ProxyReply> {
        debug!("proxy {command} -> {}", self.config.base_url);
        let response = self.client.post(self.url(command)).json(body).send().await?;
        Self::read_reply(response).await
    }
}

#[async_trait]
impl LicenseTransport for ProxyTransport {
    fn name(&self) -> &'static str {
        "proxy"
    }

    async fn login(&self, request: &LoginRequest) -> LicenseResult<ServiceReply<LoginGrant>> {
        let reply = self
            .post(
                "verify_card_key",
                &CardKeyBody {
                    card_key: &request.license_key,
                    device_code: &request.device_code,
                    timestamp: request.timestamp,
                },
            )
            .await?;

        if !reply.success {
            return Ok(ServiceReply::denied(reply.message));
        }

        let vip_expire_time = reply
            .vip_expire_time
            .or_else(|| reply.expire_time.as_deref().and_then(parse_expire_time))
            .ok_or_else(|| malformed("login succeeded without a usable expiry"))?;

        Ok(ServiceReply::Granted(LoginGrant {
            vip_expire_time,
            message: reply.message,
            expire_time: reply.expire_time,
        }))
    }

    async fn unbind(&self, request: &UnbindRequest) -> LicenseResult<ServiceReply<String>> {
        let reply = self
            .post(
                "unbind_card_key",
                &CardKeyBody {
                    card_key: &request.license_key,
                    device_code: &request.device_code,
                    timestamp: request.timestamp,
                },
            )
            .await?;

        Ok(if reply.success {
            ServiceReply::Granted(reply.message)
        } else {
            ServiceReply::denied(reply.message)
        })
    }

    async fn notice(&self) -> LicenseResult<ServiceReply<String>> {
        debug!("proxy get_card_notice -> {}", self.config.base_url);
        let response = self.client.get(self.url("get_card_notice")).send().await?;
        let reply = Self::read_reply(response).await?;

        Ok(if reply.success {
            ServiceReply::Granted(reply.content.unwrap_or_default())
        } else {
            ServiceReply::denied(reply.message)
        })
    }
}
