//! Direct transport to the legacy card-key server.
//!
//! Requests are `GET {api_base}?api=<action>&app=<app_id>&…`. With
//! obfuscation on, the per-call parameters are form-encoded, RC4-encrypted
//! under the pre-shared key and sent hex-encoded as a single `data`
//! parameter. Replies are `{code, msg, time, check}` where `msg` is an object
//! on success and a plain string on failure; a reply body that is not JSON is
//! taken to be RC4-hex and decrypted first.
//!
//! Login and unbind calls are signed with the app key:
//!
//! - `sign = md5("kami=<key>&markcode=<device>&t=<t>&" + app_key)`
//! - `value = md5(t + app_key + device)`
//!
//! A reply carrying both `time` and `check` must satisfy
//! `check == md5(time + app_key + value)`, otherwise it is rejected as
//! [`LicenseError::Tampered`]. An empty `app_key` turns signing off.

use super::{
    malformed, LicenseTransport, LoginGrant, LoginRequest, ServiceReply, UnbindRequest,
    DEFAULT_TIMEOUT_SECS,
};
use crate::error::{LicenseError, LicenseResult};
use async_trait::async_trait;
use kami_crypto::{CipherKey, ParamCodec, PassthroughCodec, Rc4HexCodec, LEGACY_CIPHER_KEY};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Success code used by the legacy server.
const CODE_OK: i64 = 200;

/// App key the legacy server signs with. Ships with every client.
pub const LEGACY_APP_KEY: &str = "DxhTVxT08L0AD3Dx";

/// Configuration for the legacy endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyApiConfig {
    /// Full endpoint URL, e.g. `https://example.com/api.php`.
    pub api_base: String,
    /// Application id registered with the server.
    pub app_id: String,
    /// Pre-shared RC4 key. Ships with every client; not a secret.
    pub cipher_key: String,
    /// Key for request signatures and reply checks. Empty disables both.
    pub app_key: String,
    /// Send parameters RC4-obfuscated in a single `data` field.
    pub obfuscate_params: bool,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LegacyApiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://zh.xphdfs.me/api.php".to_string(),
            app_id: "10002".to_string(),
            cipher_key: LEGACY_CIPHER_KEY.to_string(),
            app_key: LEGACY_APP_KEY.to_string(),
            obfuscate_params: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    msg: Msg<T>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Msg<T> {
    Payload(T),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct TextEnvelope {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    vip: Flexible,
}

/// Integrity fields of a reply. Older servers omit them.
#[derive(Debug, Deserialize)]
struct Stamp {
    #[serde(default)]
    time: Option<Flexible>,
    #[serde(default)]
    check: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NoticePayload {
    #[serde(default)]
    app_gg: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flexible {
    Int(i64),
    Text(String),
}

impl Flexible {
    fn as_secs(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    fn render(&self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

/// Talks to the legacy server over plain HTTP(S).
pub struct LegacyHttpTransport {
    config: LegacyApiConfig,
    client: Client,
    codec: Arc<dyn ParamCodec>,
}

impl LegacyHttpTransport {
    /// Creates a transport, choosing the codec from `obfuscate_params`.
    ///
    /// # Errors
    ///
    /// Fails on an unusable cipher key or if the HTTP client cannot be built.
    pub fn new(config: LegacyApiConfig) -> LicenseResult<Self> {
        let codec: Arc<dyn ParamCodec> = if config.obfuscate_params {
            let key: CipherKey = config
                .cipher_key
                .parse()
                .map_err(|e| LicenseError::Validation(format!("cipher key: {e}")))?;
            Arc::new(Rc4HexCodec::new(key))
        } else {
            Arc::new(PassthroughCodec)
        };
        Self::with_codec(config, codec)
    }

    /// Creates a transport with an explicit codec.
    pub fn with_codec(config: LegacyApiConfig, codec: Arc<dyn ParamCodec>) -> LicenseResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            client,
            codec,
        })
    }

    #[must_use]
    pub fn config(&self) -> &LegacyApiConfig {
        &self.config
    }

    fn signs_requests(&self) -> bool {
        !self.config.app_key.is_empty()
    }

    /// Parameters of a call tied to a key and device, plus the nonce the
    /// reply's `check` is computed over when signing is on.
    fn device_params(
        &self,
        license_key: &str,
        device_code: &str,
        timestamp: i64,
    ) -> (Vec<(&'static str, String)>, Option<String>) {
        let mut params = vec![
            ("kami", license_key.to_string()),
            ("markcode", device_code.to_string()),
            ("t", timestamp.to_string()),
        ];
        if !self.signs_requests() {
            return (params, None);
        }

        let app_key = &self.config.app_key;
        let sign = md5_hex(&format!(
            "kami={license_key}&markcode={device_code}&t={timestamp}&{app_key}"
        ));
        let nonce = md5_hex(&format!("{timestamp}{app_key}{device_code}"));
        params.push(("sign", sign));
        params.push(("value", nonce.clone()));
        (params, Some(nonce))
    }

    /// Rejects a reply whose `check` does not answer `nonce`.
    fn verify_stamp(&self, body: &str, nonce: Option<&str>) -> LicenseResult<()> {
        let Some(nonce) = nonce else {
            return Ok(());
        };
        let stamp: Stamp = serde_json::from_str(body).map_err(malformed)?;
        let (Some(time), Some(check)) = (stamp.time, stamp.check) else {
            return Ok(());
        };

        let expected = md5_hex(&format!("{}{}{nonce}", time.render(), self.config.app_key));
        if expected.eq_ignore_ascii_case(check.trim()) {
            Ok(())
        } else {
            warn!("legacy reply failed its integrity check (time {})", time.render());
            Err(LicenseError::Tampered)
        }
    }

    fn build_query(&self, api: &str, params: &[(&str, String)]) -> Vec<(String, String)> {
        let mut query = vec![
            ("api".to_string(), api.to_string()),
            ("app".to_string(), self.config.app_id.clone()),
        ];
        if params.is_empty() {
            return query;
        }
        if self.codec.is_obfuscating() {
            let inner = params
                .iter()
                .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            query.push(("data".to_string(), self.codec.encode(&inner)));
        } else {
            query.extend(params.iter().map(|(k, v)| (k.to_string(), v.clone())));
        }
        query
    }

    async fn call(&self, api: &str, params: &[(&str, String)]) -> LicenseResult<String> {
        let query = self.build_query(api, params);
        debug!(
            "legacy {api} -> {} (obfuscated: {})",
            self.config.api_base,
            self.codec.is_obfuscating()
        );

        let body = self
            .client
            .get(&self.config.api_base)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        self.decode_body(&body)
    }

    fn decode_body(&self, body: &str) -> LicenseResult<String> {
        let trimmed = body.trim();
        if trimmed.starts_with('{') {
            return Ok(trimmed.to_string());
        }
        if self.codec.is_obfuscating() {
            return Ok(self.codec.decode(trimmed)?);
        }
        Err(malformed("body is not JSON"))
    }
}

impl std::fmt::Debug for LegacyHttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyHttpTransport")
            .field("api_base", &self.config.api_base)
            .field("app_id", &self.config.app_id)
            .field("obfuscating", &self.codec.is_obfuscating())
            .field("signing", &self.signs_requests())
            .finish()
    }
}

#[async_trait]
impl LicenseTransport for LegacyHttpTransport {
    fn name(&self) -> &'static str {
        "legacy"
    }

    async fn login(&self, request: &LoginRequest) -> LicenseResult<ServiceReply<LoginGrant>> {
        let (params, nonce) =
            self.device_params(&request.license_key, &request.device_code, request.timestamp);
        let body = self.call("kmlogon", &params).await?;
        self.verify_stamp(&body, nonce.as_deref())?;
        parse_login(&body)
    }

    async fn unbind(&self, request: &UnbindRequest) -> LicenseResult<ServiceReply<String>> {
        let (params, nonce) =
            self.device_params(&request.license_key, &request.device_code, request.timestamp);
        let body = self.call("kmunmachine", &params).await?;
        self.verify_stamp(&body, nonce.as_deref())?;
        parse_unbind(&body)
    }

    async fn notice(&self) -> LicenseResult<ServiceReply<String>> {
        let body = self.call("notice", &[]).await?;
        parse_notice(&body)
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

fn parse_login(body: &str) -> LicenseResult<ServiceReply<LoginGrant>> {
    let envelope: Envelope<LoginPayload> = serde_json::from_str(body).map_err(malformed)?;
    match (envelope.code == CODE_OK, envelope.msg) {
        (true, Msg::Payload(payload)) => {
            let vip_expire_time = payload
                .vip
                .as_secs()
                .ok_or_else(|| malformed(format!("vip is not a timestamp: {}", payload.vip.render())))?;
            Ok(ServiceReply::Granted(LoginGrant {
                vip_expire_time,
                message: "验证成功".to_string(),
                expire_time: Some(payload.vip.render()),
            }))
        }
        (_, Msg::Text(message)) => Ok(ServiceReply::denied(message)),
        (false, Msg::Payload(_)) => Ok(ServiceReply::denied("验证失败")),
    }
}

fn parse_unbind(body: &str) -> LicenseResult<ServiceReply<String>> {
    let envelope: TextEnvelope = serde_json::from_str(body).map_err(malformed)?;
    let msg = envelope.msg.filter(|m| !m.is_empty());
    if envelope.code == CODE_OK {
        Ok(ServiceReply::Granted(msg.unwrap_or_else(|| "解绑成功".to_string())))
    } else {
        Ok(ServiceReply::denied(msg.unwrap_or_else(|| "解绑失败".to_string())))
    }
}

fn parse_notice(body: &str) -> LicenseResult<ServiceReply<String>> {
    let envelope: Envelope<NoticePayload> = serde_json::from_str(body).map_err(malformed)?;
    match (envelope.code == CODE_OK, envelope.msg) {
        (true, Msg::Payload(payload)) => Ok(ServiceReply::Granted(payload.app_gg)),
        (_, Msg::Text(message)) => Ok(ServiceReply::denied(message)),
        (false, Msg::Payload(_)) => Ok(ServiceReply::denied("获取公告失败")),
    }
}
