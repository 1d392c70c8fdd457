//! tokenwarden core - client-side authentication session lifecycle.
//!
//! This crate provides:
//! - `SessionManager`: owns the in-memory access token, renews it on a timer
//!   and tears it down on logout, renewal failure or expiry
//! - `HttpBackend`: the REST/JSON implementation of the auth backend contract
//! - `ApiClient`: bearer-authenticated JSON calls that expire the session on 401
//! - `Config`: on-disk configuration with environment overrides

pub mod api;
pub mod auth;
pub mod config;
pub mod utils;

pub use api::{ApiClient, ApiError, HttpBackend};
pub use auth::{
    AuthBackend, AuthFailure, LoginCredentials, RenewalPolicy, SessionEvent, SessionManager,
    SessionState, SessionStatus, TokenGrant,
};
pub use config::Config;
