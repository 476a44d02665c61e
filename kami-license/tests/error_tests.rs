use kami_crypto::CryptoError;
use kami_license::{LicenseError, VerificationError};

#[test]
fn error_display_validation() {
    let err = LicenseError::Validation("license key is empty".into());
    assert!(format!("{err}").contains("license key is empty"));
}

#[test]
fn error_display_network() {
    let err = LicenseError::Network("timeout".into());
    assert!(format!("{err}").contains("network"));
}

#[test]
fn error_display_service_is_verbatim() {
    let err = LicenseError::Service("卡密不存在".into());
    assert_eq!(format!("{err}"), "卡密不存在");
}

#[test]
fn error_display_storage() {
    let err = LicenseError::Storage("disk full".into());
    assert!(format!("{err}").contains("storage"));
}

#[test]
fn error_from_crypto() {
    let err: LicenseError = CryptoError::Decode("odd length".into()).into();
    assert!(matches!(err, LicenseError::Decode(_)));
    assert!(format!("{err}").contains("decode"));
}

#[test]
fn error_from_serde_json() {
    let serde_err: Result<serde_json::Value, _> = serde_json::from_str("not json");
    let err: LicenseError = serde_err.unwrap_err().into();
    assert!(format!("{err}").contains("serialization"));
}

#[test]
fn error_from_io() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: LicenseError = io.into();
    assert!(matches!(err, LicenseError::Storage(_)));
}

#[test]
fn user_message_hides_internals() {
    let decode: VerificationError = CryptoError::Decode("bad hex at 7".into()).into();
    assert!(!decode.user_message().contains("hex"));

    let storage = LicenseError::Storage("/home/u/.local/share".into());
    assert!(!storage.user_message().contains("/home"));

    assert_eq!(LicenseError::Network("dns".into()).user_message(), "network error");
    assert_eq!(LicenseError::Service("卡密已过期".into()).user_message(), "卡密已过期");
}

#[test]
fn only_network_is_transient() {
    assert!(LicenseError::Network("x".into()).is_transient());
    assert!(!LicenseError::Service("x".into()).is_transient());
    assert!(!LicenseError::Validation("x".into()).is_transient());
    assert!(!LicenseError::Tampered.is_transient());
}

#[test]
fn tampered_reply_has_its_own_message() {
    let err = LicenseError::Tampered;
    assert!(format!("{err}").contains("integrity"));
    assert_eq!(err.user_message(), "数据被修改，验证失败");
}
