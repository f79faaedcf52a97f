//! In-memory rate limiting for chat sends and OTP mails.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<key, VecDeque<Instant>>`.
//! Two limits enforced:
//! - Per-user chat sends: 30 messages/min
//! - Per-email OTP mails: 5 sends/hour
//!
//! TRADE-OFFS
//! ==========
//! Counters live in process memory, so limits reset on restart and are
//! per-instance. That matches the presence tracker's scope and is enough
//! to stop a single client from flooding the room or a mailbox.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

const DEFAULT_CHAT_LIMIT: usize = 30;
const DEFAULT_CHAT_WINDOW_SECS: u64 = 60;

const DEFAULT_OTP_LIMIT: usize = 5;
const DEFAULT_OTP_WINDOW_SECS: u64 = 3600;

#[derive(Clone, Copy)]
struct RateLimitConfig {
    chat_limit: usize,
    chat_window: Duration,
    otp_limit: usize,
    otp_window: Duration,
}

impl RateLimitConfig {
    fn from_env() -> Self {
        let chat_window_secs = env_parse("RATE_LIMIT_CHAT_WINDOW_SECS", DEFAULT_CHAT_WINDOW_SECS);
        let otp_window_secs = env_parse("RATE_LIMIT_OTP_WINDOW_SECS", DEFAULT_OTP_WINDOW_SECS);

        Self {
            chat_limit: env_parse("RATE_LIMIT_CHAT", DEFAULT_CHAT_LIMIT),
            chat_window: Duration::from_secs(chat_window_secs),
            otp_limit: env_parse("RATE_LIMIT_OTP", DEFAULT_OTP_LIMIT),
            otp_window: Duration::from_secs(otp_window_secs),
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("chat rate limit exceeded (max {limit} messages/{window_secs}s)")]
    ChatExceeded { limit: usize, window_secs: u64 },
    #[error("too many code requests (max {limit} mails/{window_secs}s)")]
    OtpExceeded { limit: usize, window_secs: u64 },
}

impl crate::frame::ErrorCode for RateLimitError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ChatExceeded { .. } => "E_RATE_LIMIT_CHAT",
            Self::OtpExceeded { .. } => "E_RATE_LIMIT_OTP",
        }
    }

    fn retryable(&self) -> bool {
        true
    }
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Clone)]
pub struct RateLimiter {
    inner: std::sync::Arc<Mutex<RateLimiterInner>>,
    config: RateLimitConfig,
}

struct RateLimiterInner {
    /// Per-user chat send timestamps.
    chat_sends: HashMap<Uuid, VecDeque<Instant>>,
    /// Per-email OTP mail timestamps.
    otp_sends: HashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: std::sync::Arc::new(Mutex::new(RateLimiterInner {
                chat_sends: HashMap::new(),
                otp_sends: HashMap::new(),
            })),
            config: RateLimitConfig::from_env(),
        }
    }

    /// Check the per-user chat limit, then record the send.
    pub fn check_chat_send(&self, user_id: Uuid) -> Result<(), RateLimitError> {
        self.check_chat_send_at(user_id, Instant::now())
    }

    /// Internal: check + record with explicit timestamp (for testing).
    fn check_chat_send_at(&self, user_id: Uuid, now: Instant) -> Result<(), RateLimitError> {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let cfg = self.config;

        let deque = inner.chat_sends.entry(user_id).or_default();
        prune_window(deque, now, cfg.chat_window);
        if deque.len() >= cfg.chat_limit {
            return Err(RateLimitError::ChatExceeded {
                limit: cfg.chat_limit,
                window_secs: cfg.chat_window.as_secs(),
            });
        }

        deque.push_back(now);
        Ok(())
    }

    /// Check the per-email OTP mail limit, then record the send.
    pub fn check_otp_send(&self, email: &str) -> Result<(), RateLimitError> {
        self.check_otp_send_at(email, Instant::now())
    }

    fn check_otp_send_at(&self, email: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let cfg = self.config;

        let deque = inner.otp_sends.entry(email.to_owned()).or_default();
        prune_window(deque, now, cfg.otp_window);
        if deque.len() >= cfg.otp_limit {
            return Err(RateLimitError::OtpExceeded {
                limit: cfg.otp_limit,
                window_secs: cfg.otp_window.as_secs(),
            });
        }

        deque.push_back(now);
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
