//! Shared test helpers for license tests.

#![allow(dead_code)]

use async_trait::async_trait;
use kami_license::{
    KeyValueStore, LicenseError, LicenseResult, LicenseSession, LicenseTransport, LoginGrant,
    LoginRequest, ManualClock, MemoryStore, ServiceReply, UnbindRequest,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Fixed "now" used across session tests (2023-11-14T22:13:20Z).
pub const NOW: i64 = 1_700_000_000;

/// How the mock answers a call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Grant; for login the payload is the expiry, otherwise the message.
    Grant(String),
    /// Service-level refusal with this message.
    Deny(String),
    /// Transport failure.
    Fail,
}

/// Scripted in-process transport that records what it was asked.
pub struct MockTransport {
    login: Mutex<Script>,
    unbind: Mutex<Script>,
    notice: Mutex<Script>,
    pub login_calls: AtomicUsize,
    pub unbind_calls: AtomicUsize,
    pub notice_calls: AtomicUsize,
    pub last_login: Mutex<Option<LoginRequest>>,
    pub last_unbind: Mutex<Option<UnbindRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            login: Mutex::new(Script::Grant((NOW + 86_400).to_string())),
            unbind: Mutex::new(Script::Grant("解绑成功".to_string())),
            notice: Mutex::new(Script::Grant("欢迎使用".to_string())),
            login_calls: AtomicUsize::new(0),
            unbind_calls: AtomicUsize::new(0),
            notice_calls: AtomicUsize::new(0),
            last_login: Mutex::new(None),
            last_unbind: Mutex::new(None),
        }
    }

    pub fn script_login(&self, script: Script) {
        *self.login.lock().unwrap() = script;
    }

    pub fn script_unbind(&self, script: Script) {
        *self.unbind.lock().unwrap() = script;
    }

    pub fn script_notice(&self, script: Script) {
        *self.notice.lock().unwrap() = script;
    }

    pub fn login_count(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn unbind_count(&self) -> usize {
        self.unbind_calls.load(Ordering::SeqCst)
    }

    pub fn notice_count(&self) -> usize {
        self.notice_calls.load(Ordering::SeqCst)
    }

    fn text_reply(script: &Script) -> LicenseResult<ServiceReply<String>> {
        match script {
            Script::Grant(msg) => Ok(ServiceReply::Granted(msg.clone())),
            Script::Deny(msg) => Ok(ServiceReply::denied(msg.clone())),
            Script::Fail => Err(LicenseError::Network("connection refused".to_string())),
        }
    }
}

#[async_trait]
impl LicenseTransport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn login(&self, request: &LoginRequest) -> LicenseResult<ServiceReply<LoginGrant>> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_login.lock().unwrap() = Some(request.clone());
        let script = self.login.lock().unwrap().clone();
        match script {
            Script::Grant(vip) => Ok(ServiceReply::Granted(LoginGrant {
                vip_expire_time: vip.parse().unwrap(),
                message: "验证成功".to_string(),
                expire_time: Some(vip),
            })),
            Script::Deny(msg) => Ok(ServiceReply::denied(msg)),
            Script::Fail => Err(LicenseError::Network("connection refused".to_string())),
        }
    }

    async fn unbind(&self, request: &UnbindRequest) -> LicenseResult<ServiceReply<String>> {
        self.unbind_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_unbind.lock().unwrap() = Some(request.clone());
        let script = self.unbind.lock().unwrap().clone();
        Self::text_reply(&script)
    }

    async fn notice(&self) -> LicenseResult<ServiceReply<String>> {
        self.notice_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.notice.lock().unwrap().clone();
        Self::text_reply(&script)
    }
}

/// Everything a session test needs to poke at.
pub struct Harness {
    pub session: LicenseSession,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub transport: Arc<MockTransport>,
}

/// A session over a memory store, a mock transport and a clock frozen at [`NOW`].
pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at_secs(NOW));
    let transport = Arc::new(MockTransport::new());
    let session = LicenseSession::with_clock(store.clone(), transport.clone(), clock.clone());
    Harness {
        session,
        store,
        clock,
        transport,
    }
}

/// Memory store whose writes to one key fail, like a full disk.
pub struct FailingStore {
    inner: MemoryStore,
    failing_key: &'static str,
}

impl FailingStore {
    pub fn failing_on(failing_key: &'static str) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing_key,
        }
    }
}

impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> LicenseResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> LicenseResult<()> {
        if key == self.failing_key {
            return Err(LicenseError::Storage("disk full".to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> LicenseResult<()> {
        self.inner.remove(key)
    }
}

/// A session over `store` with a default mock transport at [`NOW`].
pub fn session_over(store: Arc<FailingStore>) -> (LicenseSession, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    let clock = Arc::new(ManualClock::at_secs(NOW));
    let session = LicenseSession::with_clock(store, transport.clone(), clock);
    (session, transport)
}
