use super::*;

#[test]
fn normalize_code_accepts_six_digits() {
    assert_eq!(normalize_code("482913"), Some("482913".to_owned()));
    assert_eq!(normalize_code("  482913  "), Some("482913".to_owned()));
}

#[test]
fn normalize_code_rejects_bad_shapes() {
    assert_eq!(normalize_code("48291"), None);
    assert_eq!(normalize_code("4829131"), None);
    assert_eq!(normalize_code("48a913"), None);
    assert_eq!(normalize_code(""), None);
}

#[test]
fn generate_code_shape() {
    for _ in 0..32 {
        let code = generate_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_ne!(code.as_bytes()[0], b'0');
    }
}

#[test]
fn hash_code_is_stable() {
    let a = hash_code("482913");
    let b = hash_code("482913");
    let c = hash_code("482914");
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn purpose_strings_match_schema() {
    assert_eq!(OtpPurpose::VerifyEmail.as_str(), "verify_email");
    assert_eq!(OtpPurpose::ResetPassword.as_str(), "reset_password");
}

#[test]
fn reset_codes_expire_faster_than_verify_codes() {
    assert_eq!(OtpPurpose::VerifyEmail.ttl(), "24 hours");
    assert_eq!(OtpPurpose::ResetPassword.ttl(), "15 minutes");
}
