//! End-to-end flows over the real transports and the file store.

#![cfg(feature = "online")]

use kami_license::{
    FileStore, LegacyApiConfig, LegacyHttpTransport, LicenseError, LicenseSession, ManualClock,
    ProxyConfig, ProxyTransport, SessionState,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOW: i64 = 1_700_000_000;

fn legacy_session(server: &MockServer, store: Arc<FileStore>, clock: Arc<ManualClock>) -> LicenseSession {
    let transport = LegacyHttpTransport::new(LegacyApiConfig {
        api_base: format!("{}/api.php", server.uri()),
        ..Default::default()
    })
    .unwrap();
    LicenseSession::with_clock(store, Arc::new(transport), clock)
}

#[tokio::test]
async fn tampered_login_reply_caches_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("api", "kmlogon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "msg": {"kami": "ABC123", "vip": (NOW + 86_400 * 365).to_string()},
            "time": NOW,
            "check": "ffffffffffffffffffffffffffffffff"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path().join("storage.json")).unwrap());
    let mut session = legacy_session(&server, store, Arc::new(ManualClock::at_secs(NOW)));

    let err = session.login("ABC123").await.unwrap_err();
    assert!(matches!(err, LicenseError::Tampered));
    assert_eq!(session.state(), &SessionState::Unverified);
    assert_eq!(session.check_local_verify().unwrap(), None);
    assert_eq!(session.saved_license_key().unwrap(), None);
}

#[tokio::test]
async fn login_survives_restart_then_expires() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("api", "kmlogon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "msg": {"kami": "ABC123", "vip": (NOW + 86_400).to_string()},
            "time": NOW
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");
    let clock = Arc::new(ManualClock::at_secs(NOW));

    let device = {
        let mut session = legacy_session(&server, Arc::new(FileStore::open(&path).unwrap()), clock.clone());
        session.login("ABC123").await.unwrap();
        session.device_code().unwrap()
    };

    let mut session = legacy_session(&server, Arc::new(FileStore::open(&path).unwrap()), clock.clone());
    assert_eq!(session.device_code().unwrap(), device);
    let info = session.check_local_verify().unwrap().unwrap();
    assert_eq!(info.license_key, "ABC123");
    assert_eq!(session.remaining_time(info.vip_expire_time).to_string(), "1天0小时");

    clock.advance_secs(86_400);
    assert_eq!(session.check_local_verify().unwrap(), None);
    assert_eq!(session.state(), &SessionState::Unverified);
}

#[tokio::test]
async fn legacy_unbind_flow() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("api", "kmlogon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "msg": {"kami": "ABC123", "vip": NOW + 3_600}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("api", "kmunmachine"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "msg": "解绑成功"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path().join("storage.json")).unwrap());
    let mut session = legacy_session(&server, store, Arc::new(ManualClock::at_secs(NOW)));

    session.login("ABC123").await.unwrap();
    assert_eq!(session.unbind().await.unwrap(), "解绑成功");
    assert_eq!(session.check_local_verify().unwrap(), None);
    assert!(matches!(
        session.unbind().await,
        Err(LicenseError::Validation(_))
    ));
}

#[tokio::test]
async fn proxy_login_flow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify_card_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "登录成功",
            "vip_expire_time": NOW + 600
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path().join("storage.json")).unwrap());
    let transport = ProxyTransport::new(ProxyConfig {
        base_url: server.uri(),
        ..Default::default()
    })
    .unwrap();
    let mut session =
        LicenseSession::with_clock(store, Arc::new(transport), Arc::new(ManualClock::at_secs(NOW)));

    let info = session.login("ABC123").await.unwrap();
    assert_eq!(session.remaining_time(info.vip_expire_time).to_string(), "10分钟");
    assert_eq!(session.last_auth_result().unwrap().message, "登录成功");
    assert_eq!(session.transport_name(), "proxy");
}
