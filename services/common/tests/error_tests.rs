//! Mapping backend failures to user-facing errors

use pretty_assertions::assert_eq;
use rstest::*;
use services_common::ServiceError;

#[rstest]
#[case(401, "", true)]
#[case(403, r#"{"message":"Forbidden"}"#, true)]
#[case(400, r#"{"message":"Insufficient margin","status":400}"#, false)]
#[case(502, "<html>bad gateway</html>", false)]
fn test_auth_failures(#[case] status: u16, #[case] body: &str, #[case] auth: bool) {
    assert_eq!(ServiceError::from_status(status, body).is_auth_failure(), auth);
}

#[rstest]
#[test]
fn test_user_message_prefers_backend_text() {
    let backend = ServiceError::from_status(400, r#"{"message":"Insufficient margin"}"#);
    assert_eq!(backend.user_message("Unknown error"), "Insufficient margin");

    let network = ServiceError::from_status(502, "");
    assert_eq!(network.user_message("Unknown error"), "Unknown error");
}

#[rstest]
#[test]
fn test_blank_backend_message_is_ignored() {
    let err = ServiceError::from_status(500, r#"{"message":"  "}"#);
    assert!(matches!(err, ServiceError::ConnectionFailed(_)));
}
