//! fitcore: multi-tenant fitness-studio management backend.
//!
//! The auth subsystem is the core: company registration, login with account
//! lockout, two-secret JWT access/refresh tokens, refresh-token rotation,
//! and per-user multi-device session tracking.

pub mod api;
pub mod cli;
pub mod domain;
pub mod error;
pub mod password;
pub mod store;
pub mod tokens;
