//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation and auth plumbing.

pub mod auth;
pub mod chat;
pub mod guide;
pub mod mail;
pub mod otp;
pub mod presence;
pub mod session;
pub mod tour;
