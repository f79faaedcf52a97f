use super::*;

// =============================================================================
// normalize_email
// =============================================================================

#[test]
fn normalize_email_accepts_basic_address() {
    assert_eq!(normalize_email("  USER@Example.com "), Some("user@example.com".to_owned()));
}

#[test]
fn normalize_email_rejects_invalid_values() {
    assert_eq!(normalize_email(""), None);
    assert_eq!(normalize_email("user"), None);
    assert_eq!(normalize_email("@example.com"), None);
    assert_eq!(normalize_email("user@"), None);
    assert_eq!(normalize_email("a@b@c"), None);
    assert_eq!(normalize_email("user@localhost"), None);
}

#[test]
fn normalize_email_rejects_overlong_address() {
    let local = "a".repeat(250);
    assert_eq!(normalize_email(&format!("{local}@example.com")), None);
}

// =============================================================================
// disposable domains
// =============================================================================

#[test]
fn disposable_domains_are_flagged() {
    assert!(is_disposable("user@mailinator.com"));
    assert!(is_disposable("user@yopmail.com"));
    assert!(!is_disposable("user@example.com"));
}

#[test]
fn validate_email_rejects_disposable() {
    assert!(matches!(validate_email("user@mailinator.com"), Err(AuthError::DisposableEmail)));
    assert!(matches!(validate_email("not-an-email"), Err(AuthError::InvalidEmail)));
    assert_eq!(validate_email("User@Example.com").unwrap(), "user@example.com");
}

// =============================================================================
// passwords
// =============================================================================

#[test]
fn hash_then_verify_round_trips() {
    let hash = hash_password("correct horse battery").expect("hash");
    assert!(verify_password("correct horse battery", &hash).is_ok());
    assert!(verify_password("wrong password", &hash).is_err());
}

#[test]
fn hashes_are_salted() {
    let a = hash_password("correct horse battery").expect("hash");
    let b = hash_password("correct horse battery").expect("hash");
    assert_ne!(a, b);
}

#[test]
fn validate_password_enforces_minimum() {
    assert!(matches!(validate_password("short"), Err(AuthError::WeakPassword)));
    assert!(validate_password("longenough").is_ok());
}

#[test]
fn verify_password_rejects_garbage_hash() {
    assert!(matches!(
        verify_password("anything", "not-a-phc-string"),
        Err(AuthError::InvalidCredentials)
    ));
}

// =============================================================================
// GoogleConfig
// =============================================================================

#[test]
fn authorize_url_carries_state_and_client() {
    let config = GoogleConfig {
        client_id: "client-123".into(),
        client_secret: "secret".into(),
        redirect_uri: "https://app.example.com/auth/google/callback".into(),
    };
    let url = config.authorize_url("csrf-state-token");
    assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
    assert!(url.contains("client_id=client-123"));
    assert!(url.contains("state=csrf-state-token"));
    assert!(url.contains("scope=openid%20email%20profile"));
}

#[test]
fn google_user_deserializes_userinfo_payload() {
    let json = r#"{
        "sub": "1094823",
        "name": "Asha Rao",
        "email": "asha@example.com",
        "picture": "https://lh3.example.com/a.png"
    }"#;
    let user: GoogleUser = serde_json::from_str(json).expect("deserialize");
    assert_eq!(user.sub, "1094823");
    assert_eq!(user.email, "asha@example.com");
    assert_eq!(user.name.as_deref(), Some("Asha Rao"));
}

#[test]
fn google_user_tolerates_missing_optional_fields() {
    let json = r#"{"sub": "1094823", "email": "asha@example.com"}"#;
    let user: GoogleUser = serde_json::from_str(json).expect("deserialize");
    assert!(user.name.is_none());
    assert!(user.picture.is_none());
}
