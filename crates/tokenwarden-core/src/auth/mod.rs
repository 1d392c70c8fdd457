//! Authentication module for managing the client session.
//!
//! This module provides:
//! - `SessionManager`: login, silent restore, timed renewal and logout
//! - `AuthBackend`: the contract the manager expects from the auth server
//! - `AuthFailure`: the typed failures the application sees
//!
//! The access token is held in memory only. The long-lived renewal
//! credential is an HTTP-only cookie that never reaches this code.

pub mod backend;
pub mod credentials;
pub mod error;
pub mod manager;
pub mod policy;
pub mod state;
mod session;
mod timer;

pub use backend::{AuthBackend, TokenGrant};
pub use credentials::LoginCredentials;
pub use error::AuthFailure;
pub use manager::SessionManager;
pub use policy::RenewalPolicy;
pub use state::{SessionEvent, SessionState, SessionStatus};
