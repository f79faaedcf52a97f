use super::*;

#[test]
fn chat_allows_up_to_limit() {
    let rl = RateLimiter::new();
    let user = Uuid::new_v4();
    let now = Instant::now();

    for i in 0..DEFAULT_CHAT_LIMIT {
        assert!(rl.check_chat_send_at(user, now).is_ok(), "send {i} should succeed");
    }
    assert!(matches!(
        rl.check_chat_send_at(user, now),
        Err(RateLimitError::ChatExceeded { .. })
    ));
}

#[test]
fn otp_allows_up_to_limit() {
    let rl = RateLimiter::new();
    let now = Instant::now();

    for i in 0..DEFAULT_OTP_LIMIT {
        assert!(rl.check_otp_send_at("user@example.com", now).is_ok(), "mail {i} should succeed");
    }
    assert!(matches!(
        rl.check_otp_send_at("user@example.com", now),
        Err(RateLimitError::OtpExceeded { .. })
    ));
}

#[test]
fn window_expiry_allows_new_sends() {
    let rl = RateLimiter::new();
    let user = Uuid::new_v4();
    let start = Instant::now();

    for _ in 0..DEFAULT_CHAT_LIMIT {
        rl.check_chat_send_at(user, start).unwrap();
    }
    assert!(rl.check_chat_send_at(user, start).is_err());

    let after_window = start + Duration::from_secs(DEFAULT_CHAT_WINDOW_SECS) + Duration::from_millis(1);
    assert!(rl.check_chat_send_at(user, after_window).is_ok());
}

#[test]
fn distinct_users_do_not_interfere() {
    let rl = RateLimiter::new();
    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();
    let now = Instant::now();

    for _ in 0..DEFAULT_CHAT_LIMIT {
        rl.check_chat_send_at(user_a, now).unwrap();
    }
    assert!(rl.check_chat_send_at(user_a, now).is_err());
    assert!(rl.check_chat_send_at(user_b, now).is_ok());
}

#[test]
fn distinct_emails_do_not_interfere() {
    let rl = RateLimiter::new();
    let now = Instant::now();

    for _ in 0..DEFAULT_OTP_LIMIT {
        rl.check_otp_send_at("a@example.com", now).unwrap();
    }
    assert!(rl.check_otp_send_at("a@example.com", now).is_err());
    assert!(rl.check_otp_send_at("b@example.com", now).is_ok());
}

#[test]
fn chat_and_otp_limits_are_independent() {
    let rl = RateLimiter::new();
    let user = Uuid::new_v4();
    let now = Instant::now();

    for _ in 0..DEFAULT_CHAT_LIMIT {
        rl.check_chat_send_at(user, now).unwrap();
    }
    assert!(rl.check_chat_send_at(user, now).is_err());
    assert!(rl.check_otp_send_at("user@example.com", now).is_ok());
}
