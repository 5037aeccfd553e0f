//! Request-level middleware.

pub mod auth;
