//! REST API layer.
//!
//! This module provides:
//! - `HttpBackend`: the `/login`, `/refresh` and `/logout` calls behind
//!   `SessionManager`, with a cookie store carrying the renewal credential
//! - `ApiClient`: bearer-authenticated JSON calls for the rest of the
//!   application; a 401 from any of them ends the session
//! - `ApiError`: HTTP-level failures, classified by status

pub mod auth;
pub mod client;
pub mod error;

pub use auth::HttpBackend;
pub use client::ApiClient;
pub use error::ApiError;
