use kami_license::{
    device_code, DeviceIdentity, KeyValueStore, LicenseError, LicenseResult, ManualClock,
    MemoryStore, DEVICE_CODE_KEY,
};

#[test]
fn device_code_is_created_and_persisted() {
    let store = MemoryStore::new();
    let clock = ManualClock::at_secs(1_700_000_000);
    let code = device_code(&store, &clock).unwrap();
    assert!(code.starts_with("DEV_"));
    assert_eq!(store.get(DEVICE_CODE_KEY).unwrap(), Some(code));
}

#[test]
fn device_code_is_idempotent() {
    let store = MemoryStore::new();
    let clock = ManualClock::at_secs(1_700_000_000);
    let first = device_code(&store, &clock).unwrap();
    clock.advance_secs(3600);
    let second = device_code(&store, &clock).unwrap();
    assert_eq!(first, second);
}

#[test]
fn device_code_changes_after_clearing_storage() {
    let store = MemoryStore::new();
    let clock = ManualClock::at_secs(1_700_000_000);
    let first = device_code(&store, &clock).unwrap();
    store.clear().unwrap();
    let second = device_code(&store, &clock).unwrap();
    assert_ne!(first, second);
}

#[test]
fn existing_code_is_used_verbatim() {
    let store = MemoryStore::new();
    store.set(DEVICE_CODE_KEY, "machine-from-old-client").unwrap();
    let clock = ManualClock::at_secs(0);
    let identity = DeviceIdentity::load_or_create(&store, &clock).unwrap();
    assert_eq!(identity.device_code(), "machine-from-old-client");
    assert!(!identity.is_well_formed());
}

#[test]
fn empty_stored_code_is_replaced() {
    let store = MemoryStore::new();
    store.set(DEVICE_CODE_KEY, "").unwrap();
    let clock = ManualClock::at_secs(1_700_000_000);
    let identity = DeviceIdentity::load_or_create(&store, &clock).unwrap();
    assert!(identity.is_well_formed());
}

#[test]
fn generated_codes_are_distinct() {
    let a = DeviceIdentity::generate(1_700_000_000_000);
    let b = DeviceIdentity::generate(1_700_000_000_000);
    assert_ne!(a, b);
}

#[test]
fn identity_display_and_serde() {
    let identity = DeviceIdentity::generate(42);
    assert_eq!(identity.to_string(), identity.device_code());
    let json = serde_json::to_string(&identity).unwrap();
    let parsed: DeviceIdentity = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, identity);
}

struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get(&self, _key: &str) -> LicenseResult<Option<String>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> LicenseResult<()> {
        Err(LicenseError::Storage("read-only filesystem".into()))
    }

    fn remove(&self, _key: &str) -> LicenseResult<()> {
        Ok(())
    }
}

#[test]
fn storage_failure_propagates() {
    let clock = ManualClock::at_secs(0);
    let err = device_code(&BrokenStore, &clock).unwrap_err();
    assert!(matches!(err, LicenseError::Storage(_)));
}
