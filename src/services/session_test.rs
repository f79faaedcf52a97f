use super::*;

// =============================================================================
// bytes_to_hex
// =============================================================================

#[test]
fn bytes_to_hex_empty() {
    assert_eq!(bytes_to_hex(&[]), "");
}

#[test]
fn bytes_to_hex_single_byte() {
    assert_eq!(bytes_to_hex(&[0xff]), "ff");
}

#[test]
fn bytes_to_hex_leading_zero() {
    assert_eq!(bytes_to_hex(&[0x0a]), "0a");
}

#[test]
fn bytes_to_hex_multi_byte() {
    assert_eq!(bytes_to_hex(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
}

// =============================================================================
// generate_token / generate_ws_ticket
// =============================================================================

#[test]
fn generate_token_is_64_hex_chars() {
    let token = generate_token();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn generate_token_two_calls_differ() {
    assert_ne!(generate_token(), generate_token());
}

#[test]
fn generate_ws_ticket_is_32_hex_chars() {
    let ticket = generate_ws_ticket();
    assert_eq!(ticket.len(), 32);
    assert!(ticket.chars().all(|c| c.is_ascii_hexdigit()));
}

// =============================================================================
// SessionUser
// =============================================================================

#[test]
fn is_admin_checks_role() {
    let mut user = SessionUser {
        id: Uuid::new_v4(),
        name: "Asha".into(),
        email: "asha@example.com".into(),
        role: "traveler".into(),
        verified: true,
        avatar_url: None,
    };
    assert!(!user.is_admin());

    user.role = "admin".into();
    assert!(user.is_admin());
}

#[test]
fn session_user_serializes_without_secrets() {
    let user = SessionUser {
        id: Uuid::new_v4(),
        name: "Asha".into(),
        email: "asha@example.com".into(),
        role: "guide".into(),
        verified: false,
        avatar_url: Some("https://example.com/a.png".into()),
    };
    let json = serde_json::to_value(&user).expect("serialize");
    assert_eq!(json["role"], "guide");
    assert_eq!(json["verified"], false);
    assert!(json.get("password_hash").is_none());
}
